//! Restore procedures.
//!
//! Parsing of serialized sessions and the handlers that drive a tab through
//! its deferred restore stages as the content layer reports progress.

use tracing::{debug, error};

use crate::managers::tab_manager::TrackedTab;
use crate::services::capture::ContentProvider;
use crate::types::errors::RestoreError;
use crate::types::restore::RestoreState;
use crate::types::session::SessionState;
use crate::types::tab::{FrameFormData, FrameScroll, TabId, TabSnapshot};

/// Parses session text. A session is only accepted when its first window has
/// at least one tab.
pub fn parse_session(text: &str) -> Result<SessionState, RestoreError> {
    let state: SessionState =
        serde_json::from_str(text).map_err(|e| RestoreError::InvalidJson(e.to_string()))?;
    if state.windows.is_empty() {
        return Err(RestoreError::NoWindows);
    }
    if state.first_window_tabs().is_none() {
        return Err(RestoreError::NoTabs);
    }
    Ok(state)
}

/// Checks that a snapshot has history and a 1-based index inside it.
pub fn validate_snapshot(tab_id: TabId, snapshot: &TabSnapshot) -> Result<(), RestoreError> {
    if snapshot.entries.is_empty() {
        return Err(RestoreError::EmptyTab(tab_id));
    }
    if !snapshot.is_valid() {
        return Err(RestoreError::InvalidIndex {
            tab: tab_id,
            index: snapshot.index,
            len: snapshot.entries.len(),
        });
    }
    Ok(())
}

/// Replays history into the content layer, asks for a reload of the active
/// entry and arms the three content stages.
pub fn begin_restore(
    tab_id: TabId,
    tab: &mut TrackedTab,
    snapshot: TabSnapshot,
    content: &dyn ContentProvider,
) -> Result<(), RestoreError> {
    validate_snapshot(tab_id, &snapshot)?;
    content.restore_history(tab_id, &snapshot);
    content.reload_current_entry(tab_id);

    tab.ext_data = snapshot.ext_data.clone();
    if snapshot.parent_id.is_some() {
        tab.parent_id = snapshot.parent_id;
    }
    tab.snapshot = Some(snapshot);
    tab.restore.arm();
    debug!(%tab_id, "restore armed");
    Ok(())
}

/// Restores a delay-loaded tab from the snapshot it was given. Returns whether
/// anything was restored. The tab leaves the pending state either way.
pub fn restore_zombie(tab_id: TabId, tab: &mut TrackedTab, content: &dyn ContentProvider) -> bool {
    if tab.restore != RestoreState::PendingFull {
        return false;
    }
    tab.restore = RestoreState::Done;
    let Some(snapshot) = tab.snapshot.clone() else {
        error!(%tab_id, "pending tab has no snapshot to restore");
        return false;
    };
    match begin_restore(tab_id, tab, snapshot, content) {
        Ok(()) => {
            debug!(%tab_id, "restored zombie tab");
            true
        }
        Err(e) => {
            error!(%tab_id, error = %e, "tab restore skipped");
            false
        }
    }
}

/// Location change: lifts the reload guard once startup restore is over and
/// applies the saved zoom before first paint.
pub fn on_location_change(
    tab_id: TabId,
    tab: &mut TrackedTab,
    content: &dyn ContentProvider,
    startup_restore_finished: bool,
) {
    if tab.reload_pending && startup_restore_finished {
        tab.reload_pending = false;
        debug!(%tab_id, "reload guard lifted");
    }
    if !tab.restore.on_location_change().zoom {
        return;
    }
    let zoom = tab
        .snapshot
        .as_ref()
        .and_then(|s| s.scroll_data.as_ref())
        .and_then(|d| d.zoom);
    if let Some(zoom) = zoom {
        debug!(%tab_id, resolution = zoom.resolution, "restoring zoom");
        content.restore_zoom(tab_id, &zoom);
    }
}

/// Load completed: replays form data into the frame tree.
pub fn on_load(tab_id: TabId, tab: &mut TrackedTab, content: &dyn ContentProvider) {
    if !tab.restore.on_load().form_data {
        return;
    }
    if let Some(data) = tab.snapshot.as_ref().and_then(|s| s.form_data.as_ref()) {
        debug!(%tab_id, "restoring form data");
        replay_form_data(tab_id, data, &mut Vec::new(), content);
    }
}

/// What a page-shown event turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShow {
    ScrollRestored,
    /// Not restoring; the current scroll position is the new baseline.
    CaptureBaseline,
}

pub fn on_page_show(tab_id: TabId, tab: &mut TrackedTab, content: &dyn ContentProvider) -> PageShow {
    if !tab.restore.on_page_show().scroll {
        return PageShow::CaptureBaseline;
    }
    if let Some(data) = tab.snapshot.as_ref().and_then(|s| s.scroll_data.as_ref()) {
        debug!(%tab_id, "restoring scroll positions");
        replay_scroll(tab_id, &data.frames, &mut Vec::new(), content);
    }
    PageShow::ScrollRestored
}

/// Restores each frame's values. A frame whose loaded URL differs from the
/// recorded one is skipped together with its descendants.
fn replay_form_data(
    tab_id: TabId,
    data: &FrameFormData,
    path: &mut Vec<usize>,
    content: &dyn ContentProvider,
) {
    if let Some(expected) = &data.url {
        if content.frame_url(tab_id, path).as_deref() != Some(expected.as_str()) {
            debug!(%tab_id, ?path, "frame url changed, skipping form data");
            return;
        }
    }
    if !data.id.is_empty() || !data.xpath.is_empty() {
        let frame = FrameFormData {
            children: Vec::new(),
            ..data.clone()
        };
        content.restore_form_frame(tab_id, path, &frame);
    }
    for (i, child) in data.children.iter().enumerate() {
        if let Some(child) = child {
            path.push(i);
            replay_form_data(tab_id, child, path, content);
            path.pop();
        }
    }
}

fn replay_scroll(
    tab_id: TabId,
    frames: &FrameScroll,
    path: &mut Vec<usize>,
    content: &dyn ContentProvider,
) {
    if let Some(position) = frames.scroll {
        content.restore_scroll_frame(tab_id, path, position);
    }
    for (i, child) in frames.children.iter().enumerate() {
        if let Some(child) = child {
            path.push(i);
            replay_scroll(tab_id, child, path, content);
            path.pop();
        }
    }
}
