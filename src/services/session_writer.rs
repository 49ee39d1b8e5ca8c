//! Session writer.
//!
//! Splits a collected aggregate into the part that may reach the disk and the
//! private part that only ever travels to the host in memory, and decides
//! when the durable file is due for a backup copy.

use tracing::debug;

use crate::managers::save_scheduler::WriteTicket;
use crate::types::errors::WriteError;
use crate::types::session::{SessionAggregate, SessionState, WindowData};

/// A serialized session waiting to be written atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteJob {
    pub ticket: WriteTicket,
    pub bytes: Vec<u8>,
}

/// The two halves of one save cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    /// Non-private tabs and normal closed tabs; written to disk.
    pub normal: SessionState,
    /// Private tabs only, one window per tracked window.
    pub private: SessionState,
}

impl Partitioned {
    /// JSON for the host handoff, or `None` when no private tab exists.
    pub fn private_payload(&self) -> Option<String> {
        let has_private_tabs = self.private.windows.iter().any(|w| !w.tabs.is_empty());
        if !has_private_tabs {
            return None;
        }
        serde_json::to_string(&self.private).ok()
    }

    pub fn normal_tab_count(&self) -> usize {
        self.normal.windows.iter().map(|w| w.tabs.len()).sum()
    }
}

/// Routes every tab into the normal or private partition by its flag and
/// converts the selected tab id into a 1-based index within the partition
/// that received it. Private closed tabs are dropped.
pub fn partition(aggregate: &SessionAggregate) -> Partitioned {
    let mut out = Partitioned::default();

    for window in aggregate.windows.values() {
        let mut normal = WindowData {
            closed_tabs: window
                .closed_tabs
                .iter()
                .filter(|t| !t.is_private)
                .cloned()
                .collect(),
            ..WindowData::default()
        };
        let mut private = WindowData::default();

        for tab in &window.tabs {
            let dest = if tab.is_private { &mut private } else { &mut normal };
            dest.tabs.push(tab.clone());
            if window.selected_tab_id == Some(tab.tab_id) {
                dest.selected = Some(dest.tabs.len());
            }
        }

        out.normal.windows.push(normal);
        out.private.windows.push(private);
    }
    out
}

pub fn serialize(state: &SessionState) -> Result<Vec<u8>, WriteError> {
    serde_json::to_vec(state).map_err(|e| WriteError::Serialization(e.to_string()))
}

/// Backup bookkeeping for the durable file.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    backup_interval_ms: u64,
    last_backup_ms: u64,
    /// Set once a durable write has succeeded; backups only copy known-good
    /// files.
    data_is_good: bool,
}

impl SessionWriter {
    pub fn new(backup_interval_ms: u64) -> Self {
        Self {
            backup_interval_ms,
            last_backup_ms: 0,
            data_is_good: false,
        }
    }

    pub fn set_backup_interval(&mut self, backup_interval_ms: u64) {
        self.backup_interval_ms = backup_interval_ms;
    }

    pub fn data_is_good(&self) -> bool {
        self.data_is_good
    }

    /// Whether the current durable file should be copied to the backup
    /// before it is replaced.
    pub fn backup_due(&self, now_ms: u64, write_in_flight: bool, file_exists: bool) -> bool {
        !write_in_flight
            && self.data_is_good
            && file_exists
            && now_ms.saturating_sub(self.last_backup_ms) >= self.backup_interval_ms
    }

    pub fn mark_backed_up(&mut self, now_ms: u64) {
        debug!(now_ms, "session file backed up");
        self.last_backup_ms = now_ms;
    }

    pub fn mark_good(&mut self) {
        self.data_is_good = true;
    }

    /// Forgets that any file on disk is good (after the files were removed).
    pub fn invalidate(&mut self) {
        self.data_is_good = false;
        self.last_backup_ms = 0;
    }
}
