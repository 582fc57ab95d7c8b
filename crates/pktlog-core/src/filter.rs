//! Packet type filter
//!
//! Holds the allow-list of packet type substrings. Packet-processing tasks
//! read it on every packet; the reload watcher replaces it wholesale.

use arc_swap::{ArcSwap, Guard};
use std::sync::Arc;
use tracing::info;

/// Snapshot of the filter entries
pub type FilterEntries = Arc<Vec<String>>;

/// Current filter allow-list
///
/// Uses ArcSwap for lock-free atomic updates. Readers get a complete
/// snapshot without blocking; a store swaps the whole list in one pointer
/// exchange, so a reader sees either the old list or the new one.
#[derive(Debug)]
pub struct FilterState {
    entries: ArcSwap<Vec<String>>,
}

impl FilterState {
    /// Create a filter with the given entries
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(entries),
        }
    }

    /// Borrow the current snapshot
    ///
    /// Cheap enough for the per-packet hot path.
    pub fn load(&self) -> Guard<FilterEntries> {
        self.entries.load()
    }

    /// Get an owned handle to the current snapshot
    pub fn snapshot(&self) -> FilterEntries {
        self.entries.load_full()
    }

    /// Replace the entries atomically
    ///
    /// An empty list is valid and suppresses every packet.
    pub fn store(&self, entries: Vec<String>) {
        let count = entries.len();
        self.entries.store(Arc::new(entries));
        info!(entry_count = count, "Packet filter updated");
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_initial_entries() {
        let filter = FilterState::new(vec!["ActorEvent".into(), "Text".into()]);
        let entries = filter.load();
        assert_eq!(entries.as_slice(), ["ActorEvent", "Text"]);
    }

    #[test]
    fn test_store_replaces_whole_list() {
        let filter = FilterState::new(vec!["A".into(), "B".into(), "C".into()]);
        filter.store(vec!["D".into()]);
        assert_eq!(filter.snapshot().as_slice(), ["D"]);
    }

    #[test]
    fn test_old_snapshot_survives_store() {
        let filter = FilterState::new(vec!["Old".into()]);
        let before = filter.snapshot();
        filter.store(vec!["New".into()]);

        assert_eq!(before.as_slice(), ["Old"]);
        assert_eq!(filter.snapshot().as_slice(), ["New"]);
    }

    #[test]
    fn test_empty_filter() {
        let filter = FilterState::default();
        assert!(filter.load().is_empty());
    }
}
