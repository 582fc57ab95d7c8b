//! Configuration hot reload
//!
//! A trigger source ([`FileWatcher`], or anything feeding an `mpsc` channel)
//! wakes the [`ConfigReloadWatcher`], which re-reads the file and publishes
//! the new snapshot to its two subscribers through [`ReloadTargets`].

mod trigger;
mod watcher;

pub use trigger::FileWatcher;
pub use watcher::{ConfigReloadWatcher, ReloadOutcome, DEFAULT_SETTLE};

use crate::config::ObservationSettings;
use crate::filter::FilterState;
use crate::observe::CadenceControllers;
use crate::packet::Direction;
use std::path::PathBuf;
use std::sync::Arc;

/// What asked for a reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// The config file at this path was written
    FileChanged(PathBuf),
    /// SIGHUP was received
    Signal,
}

/// The live state a reload publishes to
#[derive(Debug, Clone)]
pub struct ReloadTargets {
    filter: Arc<FilterState>,
    cadences: Arc<CadenceControllers>,
}

impl ReloadTargets {
    /// Bundle the filter and the cadence controllers
    pub fn new(filter: Arc<FilterState>, cadences: Arc<CadenceControllers>) -> Self {
        Self { filter, cadences }
    }

    /// Publish a snapshot
    ///
    /// The filter is replaced as a whole; each cadence controller only wakes
    /// its reporters if its value actually changed.
    pub fn apply(&self, settings: &ObservationSettings) {
        self.filter.store(settings.filter_entries.clone());
        for direction in Direction::ALL {
            self.cadences
                .get(direction)
                .set(settings.cadence(direction));
        }
    }
}
