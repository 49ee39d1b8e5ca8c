//! Closed-tab undo ring.
//!
//! One ring per window, most recently closed first, bounded by the configured
//! undo capacity.

use crate::types::session::ClosedTabSummary;
use crate::types::tab::{TabId, TabSnapshot};

/// Bounded, most-recent-first list of closed tabs for one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosedTabRing {
    entries: Vec<TabSnapshot>,
    capacity: usize,
}

impl ClosedTabRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, dropping the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.entries.truncate(capacity);
    }

    /// Prepends a closed tab. Returns `false` (and records nothing) when undo
    /// is disabled or the snapshot could not be reopened.
    pub fn record_close(&mut self, snapshot: TabSnapshot) -> bool {
        if self.capacity == 0 || !reopenable(&snapshot) {
            return false;
        }
        self.entries.insert(0, snapshot);
        self.entries.truncate(self.capacity);
        true
    }

    /// Removes every entry whose tab id is in `ids`. Returns how many were
    /// removed; the remaining entries keep their order.
    pub fn remove_by_ids(&mut self, ids: &[TabId]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|tab| !tab.tab_id.is_valid() || !ids.contains(&tab.tab_id));
        before - self.entries.len()
    }

    /// Drops every private entry.
    pub fn purge_private(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|tab| !tab.is_private);
        before - self.entries.len()
    }

    /// Removes and returns the entry at `index` (0 is the most recent).
    pub fn undo(&mut self, index: usize) -> Option<TabSnapshot> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces the contents with the reopenable given entries, keeping at
    /// most `capacity` of them.
    pub fn replace(&mut self, entries: Vec<TabSnapshot>) {
        self.entries = entries
            .into_iter()
            .filter(reopenable)
            .take(self.capacity)
            .collect();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TabSnapshot] {
        &self.entries
    }

    /// Undo-list rows for the entries matching the given privacy mode.
    pub fn summaries(&self, is_private: bool) -> Vec<ClosedTabSummary> {
        self.entries
            .iter()
            .filter(|t| t.is_private == is_private)
            .filter_map(ClosedTabSummary::from_snapshot)
            .collect()
    }
}

fn reopenable(snapshot: &TabSnapshot) -> bool {
    !snapshot.is_empty() && snapshot.is_valid()
}
