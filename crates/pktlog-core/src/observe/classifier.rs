//! Packet classification
//!
//! Decides per packet whether it is observed (rendered into the log) or
//! suppressed (only counted).

use crate::error::{Error, Result};
use crate::filter::FilterState;
use crate::packet::Packet;
use std::sync::Arc;

/// Outcome of classifying one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Render and log the packet; `entry` is the filter entry that matched
    Observe {
        /// First matching filter entry
        entry: String,
    },
    /// Do not log; count it as hidden
    Suppress,
}

impl Classification {
    /// Whether this packet is logged
    pub fn is_observe(&self) -> bool {
        matches!(self, Classification::Observe { .. })
    }
}

/// Classify a packet type name against one filter snapshot
///
/// Case-sensitive substring containment; the first matching entry wins.
pub fn classify(packet_type: &str, entries: &[String]) -> Classification {
    entries
        .iter()
        .find(|entry| packet_type.contains(entry.as_str()))
        .map_or(Classification::Suppress, |entry| Classification::Observe {
            entry: entry.clone(),
        })
}

/// Render a packet's structured content for the log
pub fn render<P: Packet>(packet: &P) -> Result<String> {
    toml::to_string_pretty(packet).map_err(|e| Error::Render {
        packet_type: packet.type_name().to_string(),
        message: e.to_string(),
    })
}

/// Classifier bound to the live filter
#[derive(Debug, Clone)]
pub struct Classifier {
    filter: Arc<FilterState>,
}

impl Classifier {
    /// Create a classifier reading from `filter`
    pub fn new(filter: Arc<FilterState>) -> Self {
        Self { filter }
    }

    /// Classify against the current filter snapshot
    ///
    /// Each call uses exactly one complete snapshot.
    #[inline]
    pub fn classify(&self, packet_type: &str) -> Classification {
        let entries = self.filter.load();
        classify(packet_type, entries.as_slice())
    }

    /// Filter this classifier reads from
    pub fn filter(&self) -> &Arc<FilterState> {
        &self.filter
    }
}
