//! Log sink abstraction
//!
//! The observation layer never formats to a writer directly. It emits
//! [`LogEvent`]s to a [`LogSink`]; the default sink forwards them to
//! `tracing`.

use crate::packet::Direction;
use tracing::{error, info};

/// Delimiter placed around a rendered packet body
pub const BLOCK_MARKER: &str = "==========";

/// Something worth logging from the observation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A packet matched the filter and was rendered
    Observed {
        /// Flow the packet travelled
        direction: Direction,
        /// Packet type name
        packet_type: String,
        /// Filter entry that matched
        matched: String,
        /// Rendered packet body (without markers)
        body: String,
    },
    /// A packet matched the filter but could not be rendered
    RenderFailed {
        /// Flow the packet travelled
        direction: Direction,
        /// Packet type name
        packet_type: String,
        /// Serializer error
        error: String,
    },
    /// Suppressed packets drained at a report tick
    Hidden {
        /// Flow the packets travelled
        direction: Direction,
        /// Number of packets hidden since the previous report
        count: u64,
    },
}

impl LogEvent {
    /// Direction this event belongs to
    pub fn direction(&self) -> Direction {
        match self {
            LogEvent::Observed { direction, .. }
            | LogEvent::RenderFailed { direction, .. }
            | LogEvent::Hidden { direction, .. } => *direction,
        }
    }

    /// Human-readable text, prefixed with the direction
    pub fn to_text(&self) -> String {
        let mut text = String::from(self.direction().prefix());
        match self {
            LogEvent::Observed {
                packet_type, body, ..
            } => {
                text.push_str(packet_type);
                text.push('\n');
                text.push_str(&format!("{BLOCK_MARKER} BEGIN PACKET {BLOCK_MARKER}\n"));
                text.push_str(body);
                if !body.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&format!("{BLOCK_MARKER} END PACKET {BLOCK_MARKER}"));
            }
            LogEvent::RenderFailed {
                packet_type, error, ..
            } => {
                text.push_str(packet_type);
                text.push('\n');
                text.push_str(error);
            }
            LogEvent::Hidden { count, .. } => {
                text.push_str(&format!("{count} hidden packets."));
            }
        }
        text
    }
}

/// Destination for observation log events
///
/// Implementations must not block for long: observed packets are emitted
/// from the relay loop.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync + 'static {
    /// Emit one event
    fn emit(&self, event: LogEvent);
}

/// Sink that writes events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let direction = event.direction().as_str();
        match &event {
            LogEvent::Observed { matched, .. } => {
                info!(direction, matched = %matched, "{}", event.to_text());
            }
            LogEvent::RenderFailed { .. } => {
                error!(direction, "{}", event.to_text());
            }
            LogEvent::Hidden { count, .. } => {
                info!(direction, count = *count, "{}", event.to_text());
            }
        }
    }
}
