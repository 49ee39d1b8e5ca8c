//! Snapshot capture.
//!
//! Reads raw state from the content layer, filters it, and merges it into a
//! tab's snapshot without disturbing the fields that are not being updated.

use tracing::{debug, warn};

use crate::managers::tab_manager::TrackedTab;
use crate::types::settings::PrivacyLevel;
use crate::types::tab::{
    DisplaySize, FrameFormData, FrameScroll, HistoryEntry, ScrollData, ScrollPosition,
    TabAttributes, TabId, TabSnapshot, Zoom,
};

/// Serialized navigation history as produced by the history codec.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCapture {
    pub entries: Vec<HistoryEntry>,
    /// 1-based; zero means the codec could not collect anything usable.
    pub index: usize,
}

/// Primitives the content layer exposes for one tab.
pub trait ContentProvider {
    fn collect_history(&self, tab: TabId) -> Option<HistoryCapture>;
    fn collect_form_data(&self, tab: TabId) -> Option<FrameFormData>;
    fn collect_scroll(&self, tab: TabId) -> Option<FrameScroll>;
    fn resolution(&self, tab: TabId) -> f64;
    fn viewer_size(&self, tab: TabId) -> DisplaySize;
    fn current_url(&self, tab: TabId) -> Option<String>;
    fn can_go_back(&self, tab: TabId) -> bool;
    fn favicon(&self, tab: TabId) -> Option<String>;

    /// Replays serialized history into the tab's session history.
    fn restore_history(&self, tab: TabId, snapshot: &TabSnapshot);
    fn reload_current_entry(&self, tab: TabId);
    fn restore_zoom(&self, tab: TabId, zoom: &Zoom);
    /// URL of the document loaded in the frame at `path` (empty path is the
    /// top-level document).
    fn frame_url(&self, tab: TabId, path: &[usize]) -> Option<String>;
    fn restore_form_frame(&self, tab: TabId, path: &[usize], data: &FrameFormData);
    fn restore_scroll_frame(&self, tab: TabId, path: &[usize], position: ScrollPosition);
}

/// Result of a single capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured,
    /// Nothing usable was collected; the snapshot is unchanged.
    Skipped,
}

fn frame_allowed(url: &str, level: PrivacyLevel) -> bool {
    match level {
        PrivacyLevel::Full => true,
        PrivacyLevel::UnencryptedOnly => !url.starts_with("https:"),
        PrivacyLevel::None => false,
    }
}

/// Drops form data the privacy level forbids persisting. A rejected frame
/// takes its descendants with it. Returns `None` when nothing remains.
pub fn filter_form_data(data: FrameFormData, level: PrivacyLevel) -> Option<FrameFormData> {
    if level == PrivacyLevel::None {
        return None;
    }
    if let Some(url) = &data.url {
        if !frame_allowed(url, level) {
            return None;
        }
    }
    let children = data
        .children
        .into_iter()
        .map(|child| child.and_then(|c| filter_form_data(c, level)))
        .collect();
    let filtered = FrameFormData { children, ..data };
    if filtered.is_empty() {
        None
    } else {
        Some(filtered)
    }
}

/// Replaces the tab's history with what the content layer reports, keeping
/// the form data and scroll positions already recorded.
pub fn capture_history(
    tab_id: TabId,
    tab: &mut TrackedTab,
    content: &dyn ContentProvider,
) -> CaptureOutcome {
    // A fresh tab briefly shows about:blank before its first real load.
    if !content.can_go_back(tab_id)
        && content.current_url(tab_id).as_deref() == Some("about:blank")
    {
        debug!(%tab_id, "ignoring transient about:blank");
        return CaptureOutcome::Skipped;
    }

    let history = match content.collect_history(tab_id) {
        Some(h) if h.index > 0 && !h.entries.is_empty() => h,
        _ => return CaptureOutcome::Skipped,
    };

    let (form_data, scroll_data) = match tab.snapshot.take() {
        Some(old) => (old.form_data, old.scroll_data),
        None => (None, None),
    };

    tab.snapshot = Some(TabSnapshot {
        index: history.index.min(history.entries.len()),
        entries: history.entries,
        attributes: TabAttributes {
            image: content.favicon(tab_id),
        },
        form_data,
        scroll_data,
        is_private: tab.is_private,
        tab_id,
        parent_id: tab.parent_id,
        ext_data: Default::default(),
        desktop_mode: tab.desktop_mode,
    });
    CaptureOutcome::Captured
}

/// Records the tab's current form field values.
pub fn capture_form_data(
    tab_id: TabId,
    tab: &mut TrackedTab,
    content: &dyn ContentProvider,
    level: PrivacyLevel,
) -> CaptureOutcome {
    let Some(snapshot) = tab.snapshot.as_mut().filter(|s| !s.entries.is_empty()) else {
        return CaptureOutcome::Skipped;
    };
    match content
        .collect_form_data(tab_id)
        .and_then(|raw| filter_form_data(raw, level))
    {
        Some(data) => {
            snapshot.form_data = Some(data);
            CaptureOutcome::Captured
        }
        None => CaptureOutcome::Skipped,
    }
}

/// Records the tab's scroll positions and document resolution.
pub fn capture_scroll(
    tab_id: TabId,
    tab: &mut TrackedTab,
    content: &dyn ContentProvider,
) -> CaptureOutcome {
    // Not before the saved positions have been replayed.
    if tab.restore.is_restoring_content() {
        return CaptureOutcome::Skipped;
    }
    let Some(snapshot) = tab.snapshot.as_mut().filter(|s| !s.entries.is_empty()) else {
        return CaptureOutcome::Skipped;
    };

    let frames = content.collect_scroll(tab_id).unwrap_or_default();
    let resolution = content.resolution(tab_id);
    // JSON has no encoding for NaN or infinity; keep the last usable zoom.
    let zoom = if resolution.is_finite() {
        Some(Zoom {
            resolution,
            display_size: content.viewer_size(tab_id),
        })
    } else {
        warn!(%tab_id, resolution, "non-finite resolution not captured");
        snapshot.scroll_data.as_ref().and_then(|d| d.zoom)
    };
    debug!(%tab_id, "scroll captured");
    snapshot.scroll_data = Some(ScrollData { frames, zoom });
    CaptureOutcome::Captured
}
