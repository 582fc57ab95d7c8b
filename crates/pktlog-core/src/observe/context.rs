//! Per-direction observation context
//!
//! Shared state between a relay loop and its reporter: the direction, the
//! hidden counter, the cadence subscription, the classifier and the log sink.

use crate::observe::cadence::Cadence;
use crate::observe::classifier::{render, Classification, Classifier};
use crate::observe::counter::HiddenCounter;
use crate::observe::sink::{LogEvent, LogSink};
use crate::packet::{Direction, Packet};
use std::sync::Arc;
use tokio::sync::watch;

/// Observation state for one direction of one relayed session
pub struct DirectionContext {
    direction: Direction,
    counter: HiddenCounter,
    cadence: watch::Receiver<Cadence>,
    classifier: Classifier,
    sink: Arc<dyn LogSink>,
}

impl DirectionContext {
    /// Create a context with a fresh counter
    ///
    /// `cadence` is the direction's subscription to its cadence controller.
    pub fn new(
        direction: Direction,
        classifier: Classifier,
        cadence: watch::Receiver<Cadence>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            direction,
            counter: HiddenCounter::new(),
            cadence,
            classifier,
            sink,
        }
    }

    /// Direction of this context
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Hidden packet counter of this direction
    pub fn counter(&self) -> &HiddenCounter {
        &self.counter
    }

    /// Cadence currently in force for this direction
    pub fn cadence(&self) -> Cadence {
        *self.cadence.borrow()
    }

    /// A receiver of this direction's cadence changes, for its reporter
    pub fn subscribe_cadence(&self) -> watch::Receiver<Cadence> {
        self.cadence.clone()
    }

    /// Classify one packet and act on the outcome
    ///
    /// Suppressed packets cost one atomic increment. Observed packets are
    /// rendered and emitted; a render failure is emitted as an error event
    /// instead of being dropped.
    pub fn observe<P: Packet>(&self, packet: &P) -> Classification {
        let packet_type = packet.type_name();
        let classification = self.classifier.classify(packet_type);

        match &classification {
            Classification::Suppress => self.counter.increment(),
            Classification::Observe { entry } => {
                let event = match render(packet) {
                    Ok(body) => LogEvent::Observed {
                        direction: self.direction,
                        packet_type: packet_type.to_string(),
                        matched: entry.clone(),
                        body,
                    },
                    Err(e) => LogEvent::RenderFailed {
                        direction: self.direction,
                        packet_type: packet_type.to_string(),
                        error: e.to_string(),
                    },
                };
                self.sink.emit(event);
            }
        }

        classification
    }

    /// Drain the counter and emit a report if anything was hidden
    ///
    /// Returns the drained count.
    pub fn report(&self) -> u64 {
        let count = self.counter.drain();
        if count > 0 {
            self.sink.emit(LogEvent::Hidden {
                direction: self.direction,
                count,
            });
        }
        count
    }
}

impl std::fmt::Debug for DirectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionContext")
            .field("direction", &self.direction)
            .field("hidden", &self.counter.peek())
            .field("cadence", &self.cadence())
            .finish_non_exhaustive()
    }
}
