use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::tab::{TabId, TabSnapshot};

/// Engine-assigned handle of a tracked top-level window. Handles increase in
/// creation order, so iterating a `BTreeMap<WindowId, _>` visits the oldest
/// window first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window{}", self.0)
    }
}

/// The JSON document written to the session file (and handed to the host for
/// the private partition).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    #[serde(default)]
    pub windows: Vec<WindowData>,
}

impl SessionState {
    /// A session is restorable when its first window has at least one tab.
    pub fn first_window_tabs(&self) -> Option<&[TabSnapshot]> {
        self.windows
            .first()
            .map(|w| w.tabs.as_slice())
            .filter(|tabs| !tabs.is_empty())
    }
}

/// One window of the persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowData {
    #[serde(default)]
    pub tabs: Vec<TabSnapshot>,
    /// 1-based index of the selected tab within `tabs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
    #[serde(default)]
    pub closed_tabs: Vec<TabSnapshot>,
}

impl WindowData {
    pub fn selected_tab(&self) -> Option<&TabSnapshot> {
        self.selected
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.tabs.get(i))
    }
}

/// Live state of one window at the moment a save cycle collects it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowState {
    pub tabs: Vec<TabSnapshot>,
    pub selected_tab_id: Option<TabId>,
    /// Most recent first.
    pub closed_tabs: Vec<TabSnapshot>,
}

/// Transient projection of every tracked window, rebuilt on each save cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAggregate {
    pub windows: BTreeMap<WindowId, WindowState>,
}

/// What the undo list shows for one closed tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedTabSummary {
    pub url: String,
    pub title: String,
    /// The full snapshot as JSON, handed back verbatim for reopening.
    pub data: String,
}

impl ClosedTabSummary {
    /// Builds the summary from the snapshot's active entry. Returns `None`
    /// for snapshots without a valid active entry.
    pub fn from_snapshot(snapshot: &TabSnapshot) -> Option<Self> {
        let entry = snapshot.active_entry()?;
        let data = serde_json::to_string(snapshot).ok()?;
        Some(Self {
            url: entry.url.clone(),
            title: entry.title.clone().unwrap_or_default(),
            data,
        })
    }
}
