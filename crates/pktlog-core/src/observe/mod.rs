//! Packet observation layer
//!
//! [`PacketLogger`] holds the process-wide pieces (filter, cadence
//! controllers, sink). Every relayed connection pair gets its own
//! [`Session`] with one [`DirectionContext`] and one [`Reporter`] per
//! direction, so hidden counts never mix across sessions.

mod cadence;
mod classifier;
mod context;
mod counter;
mod sink;

pub use cadence::{Cadence, CadenceController, CadenceControllers, Reporter};
pub use classifier::{classify, render, Classification, Classifier};
pub use context::DirectionContext;
pub use counter::HiddenCounter;
pub use sink::{LogEvent, LogSink, TracingSink, BLOCK_MARKER};

use crate::config::ObservationSettings;
use crate::filter::FilterState;
use crate::packet::Direction;
use crate::reload::ReloadTargets;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Process-wide observation state
pub struct PacketLogger {
    filter: Arc<FilterState>,
    cadences: Arc<CadenceControllers>,
    sink: Arc<dyn LogSink>,
}

impl PacketLogger {
    /// Create from an initial configuration snapshot
    pub fn new(settings: &ObservationSettings, sink: Arc<dyn LogSink>) -> Self {
        Self {
            filter: Arc::new(FilterState::new(settings.filter_entries.clone())),
            cadences: Arc::new(CadenceControllers::new(
                settings.send_cadence,
                settings.receive_cadence,
            )),
            sink,
        }
    }

    /// Live filter
    pub fn filter(&self) -> &Arc<FilterState> {
        &self.filter
    }

    /// Live cadence controllers
    pub fn cadences(&self) -> &Arc<CadenceControllers> {
        &self.cadences
    }

    /// Subscribers a reload publishes to
    pub fn reload_targets(&self) -> ReloadTargets {
        ReloadTargets::new(self.filter.clone(), self.cadences.clone())
    }

    /// Apply a configuration snapshot to the filter and both cadences
    pub fn apply(&self, settings: &ObservationSettings) {
        self.reload_targets().apply(settings);
    }

    /// Start observing a new relayed session
    ///
    /// Spawns the two reporters, so it must be called inside a Tokio runtime.
    pub fn session(&self) -> Session {
        let classifier = Classifier::new(self.filter.clone());
        let (send, send_stop, send_reporter) = self.start_direction(Direction::Send, &classifier);
        let (receive, receive_stop, receive_reporter) =
            self.start_direction(Direction::Receive, &classifier);

        Session {
            send,
            receive,
            shutdown: vec![send_stop, receive_stop],
            reporters: vec![send_reporter, receive_reporter],
        }
    }

    fn start_direction(
        &self,
        direction: Direction,
        classifier: &Classifier,
    ) -> (Arc<DirectionContext>, oneshot::Sender<()>, JoinHandle<()>) {
        let ctx = Arc::new(DirectionContext::new(
            direction,
            classifier.clone(),
            self.cadences.get(direction).subscribe(),
            self.sink.clone(),
        ));
        let (tx, rx) = oneshot::channel();
        let reporter = Reporter::new(ctx.clone(), rx);
        (ctx, tx, reporter.spawn())
    }
}

/// Observation state of one relayed connection pair
pub struct Session {
    send: Arc<DirectionContext>,
    receive: Arc<DirectionContext>,
    shutdown: Vec<oneshot::Sender<()>>,
    reporters: Vec<JoinHandle<()>>,
}

impl Session {
    /// Context of one direction
    pub fn context(&self, direction: Direction) -> &Arc<DirectionContext> {
        match direction {
            Direction::Send => &self.send,
            Direction::Receive => &self.receive,
        }
    }

    /// Stop both reporters after a final drain and wait for them
    pub async fn finish(self) {
        for tx in self.shutdown {
            // A reporter that already stopped has dropped its receiver.
            let _ = tx.send(());
        }
        for reporter in self.reporters {
            if let Err(e) = reporter.await {
                debug!(error = %e, "Reporter task ended abnormally");
            }
        }
    }
}
