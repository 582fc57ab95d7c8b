//! Runtime-reloadable configuration snapshot

use crate::observe::Cadence;
use crate::packet::Direction;

/// The part of the configuration that can change while relaying
///
/// Produced from a parsed [`Config`](super::Config) on startup and on every
/// successful reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSettings {
    /// Packet type substrings to observe
    pub filter_entries: Vec<String>,
    /// Report cadence for packets from the remote endpoint
    pub receive_cadence: Cadence,
    /// Report cadence for packets from the client
    pub send_cadence: Cadence,
    /// Whether the config file keeps being watched
    pub auto_reload: bool,
}

impl ObservationSettings {
    /// Cadence of one direction
    pub fn cadence(&self, direction: Direction) -> Cadence {
        match direction {
            Direction::Send => self.send_cadence,
            Direction::Receive => self.receive_cadence,
        }
    }
}

impl Default for ObservationSettings {
    fn default() -> Self {
        super::Config::default().observation()
    }
}
