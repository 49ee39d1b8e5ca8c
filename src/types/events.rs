use serde::{Deserialize, Serialize};

use super::session::{ClosedTabSummary, WindowId};
use super::tab::TabId;

/// Which part of a tab's snapshot a capture refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    History,
    FormData,
    Scroll,
}

/// Everything the engine tells the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// A capture finished; fired whether or not anything changed on disk.
    DataUpdated { tab_id: TabId, kind: CaptureKind },
    /// A closed tab has been recorded in its window's undo ring.
    TabCloseProcessed { tab_id: TabId },
    /// Private partition of the latest save cycle. `None` means there is no
    /// private data at all.
    PrivateData { session: Option<String> },
    /// A flush found nothing pending, so the previous private data still holds.
    PrivateDataUnchanged,
    WriteStarted,
    WriteCompleted,
    WriteFailed { message: String },
    SessionRestored { error: Option<String> },
    ClosedTabs { window: WindowId, tabs: Vec<ClosedTabSummary> },
    PurgeComplete,
}

/// Parameters for a tab the engine asks the host to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTabRequest {
    pub url: String,
    pub title: Option<String>,
    pub selected: bool,
    /// Create the tab without content; it restores on first selection.
    pub delay_load: bool,
    /// Position in the tab strip, when the original one is known.
    pub index: Option<usize>,
    pub is_private: bool,
    pub desktop_mode: bool,
    pub parent_id: Option<TabId>,
}

/// Properties the host reports when a tab is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TabInit {
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub parent_id: Option<TabId>,
    #[serde(default)]
    pub desktop_mode: bool,
    /// The host created the tab as a delay-loaded placeholder.
    #[serde(default)]
    pub pending: bool,
}
