//! Session restore, deferred tab restore and startup recovery.

#[path = "../common/mod.rs"]
mod common;

use common::{ContentCall, FakeStorage, Harness};
use serde_json::json;
use tabstore::managers::tab_manager::TabManagerTrait;
use tabstore::services::crash_recovery::{CrashRecovery, CrashRecoveryTrait};
use tabstore::services::session_files::SessionFileKind;
use tabstore::types::errors::RestoreError;
use tabstore::types::events::{Notification, TabInit};
use tabstore::types::restore::RestoreState;
use tabstore::types::session::WindowId;
use tabstore::types::settings::SessionSettings;
use tabstore::types::tab::{ScrollPosition, TabId};

const TWO_A: &str = "https://two.example/a";
const TWO_B: &str = "https://two.example/b";

fn three_tab_session() -> String {
    json!({
        "windows": [{
            "tabs": [
                {"entries": [{"url": "https://one.example", "title": "One"}], "index": 1, "tabId": 1},
                {
                    "entries": [{"url": TWO_A}, {"url": TWO_B}],
                    "index": 2,
                    "tabId": 2,
                    "formData": {"url": TWO_B, "id": {"q": "rust"}},
                    "scrollData": {
                        "scroll": {"x": 0.0, "y": 420.0},
                        "zoom": {"resolution": 1.5, "displaySize": {"width": 1280, "height": 800}}
                    }
                },
                {"entries": [{"url": "https://three.example"}], "index": 1, "tabId": 3}
            ],
            "selected": 2,
            "closedTabs": [{"entries": [{"url": "https://closed.example"}], "index": 1, "tabId": 9}]
        }]
    })
    .to_string()
}

/// A window holding live tabs 1, 2 and 3, before startup restore.
fn live_window(h: &mut Harness) -> WindowId {
    let w = h.engine.window_opened().unwrap();
    for id in 1..=3 {
        h.engine
            .tab_added(w, TabId(id), TabInit::default(), None)
            .unwrap();
    }
    w
}

fn restored() -> (Harness, WindowId) {
    let mut h = Harness::new();
    let w = live_window(&mut h);
    h.engine.restore_session(&three_tab_session()).unwrap();
    (h, w)
}

#[test]
fn test_selected_tab_restores_first_others_wait() {
    let mut h = Harness::new();
    let w = live_window(&mut h);

    let summary = h.engine.restore_session(&three_tab_session()).unwrap();
    assert_eq!(summary.restored, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.selected, Some(TabId(2)));
    assert_eq!(summary.closed_tabs, 1);

    assert_eq!(
        h.content.calls(),
        vec![
            ContentCall::RestoreHistory {
                tab: TabId(2),
                entries: 2,
                index: 2
            },
            ContentCall::Reload(TabId(2)),
        ]
    );
    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::PendingFull));
    assert_eq!(h.engine.restore_state(TabId(2)), Some(RestoreState::HistoryArmed));
    assert_eq!(h.engine.restore_state(TabId(3)), Some(RestoreState::PendingFull));
    assert_eq!(
        h.engine.tab_manager().get_window(w).unwrap().selected,
        Some(TabId(2))
    );
    assert!(h.engine.startup_restore_finished());
    assert!(h
        .host
        .notifications()
        .contains(&Notification::SessionRestored { error: None }));
}

#[test]
fn test_content_stages_replay_once_in_order() {
    let (mut h, _w) = restored();
    let tab = TabId(2);
    h.content.set_page(tab, &[TWO_A, TWO_B], 2);
    h.content.clear_calls();

    h.engine.location_changed(tab).unwrap();
    h.engine.content_loaded(tab).unwrap();
    h.engine.page_shown(tab, true).unwrap();
    assert_eq!(
        h.content.calls(),
        vec![
            ContentCall::Zoom(tab, 1.5),
            ContentCall::Form(tab, vec![]),
            ContentCall::Scroll(tab, vec![], ScrollPosition { x: 0.0, y: 420.0 }),
        ]
    );
    assert_eq!(h.engine.restore_state(tab), Some(RestoreState::Done));

    h.content.clear_calls();
    h.engine.location_changed(tab).unwrap();
    h.engine.content_loaded(tab).unwrap();
    assert!(h.content.calls().is_empty());
}

#[test]
fn test_late_load_skips_zoom() {
    let (mut h, _w) = restored();
    let tab = TabId(2);
    h.content.set_page(tab, &[TWO_A, TWO_B], 2);
    h.content.clear_calls();

    h.engine.content_loaded(tab).unwrap();
    h.engine.location_changed(tab).unwrap();
    assert_eq!(h.content.calls(), vec![ContentCall::Form(tab, vec![])]);
}

#[test]
fn test_form_data_skipped_when_frame_url_changed() {
    let (mut h, _w) = restored();
    let tab = TabId(2);
    h.content.set_page(tab, &[TWO_A, "https://two.example/elsewhere"], 2);
    h.content.clear_calls();

    h.engine.location_changed(tab).unwrap();
    h.engine.content_loaded(tab).unwrap();
    assert_eq!(h.content.calls(), vec![ContentCall::Zoom(tab, 1.5)]);
    assert_eq!(h.engine.restore_state(tab), Some(RestoreState::ShowReady));
}

#[test]
fn test_reader_view_waits_until_ready() {
    let (mut h, _w) = restored();
    let tab = TabId(2);
    h.content.set_page(tab, &[TWO_A, TWO_B], 2);
    h.engine.location_changed(tab).unwrap();
    h.engine.content_loaded(tab).unwrap();
    h.content
        .0
        .borrow_mut()
        .urls
        .insert(tab, "about:reader?url=https://two.example/b".to_string());
    h.content.clear_calls();

    h.engine.page_shown(tab, false).unwrap();
    assert!(h.content.calls().is_empty());
    assert_eq!(h.engine.restore_state(tab), Some(RestoreState::ShowReady));

    h.engine.page_shown(tab, true).unwrap();
    assert_eq!(h.content.calls().len(), 1);
}

#[test]
fn test_no_capture_until_reload_starts() {
    let (mut h, _w) = restored();
    let tab = TabId(2);
    h.content.set_page(tab, &["https://other.example"], 1);

    h.engine.history_changed(tab).unwrap();
    assert_eq!(h.engine.snapshot(tab).unwrap().entries.len(), 2);

    h.engine.location_changed(tab).unwrap();
    h.engine.history_changed(tab).unwrap();
    assert_eq!(h.engine.snapshot(tab).unwrap().entries.len(), 1);
}

#[test]
fn test_selecting_pending_tab_restores_it() {
    let (mut h, _w) = restored();
    h.content.clear_calls();

    h.engine.tab_selected(TabId(1)).unwrap();
    assert_eq!(
        h.content.calls(),
        vec![
            ContentCall::RestoreHistory {
                tab: TabId(1),
                entries: 1,
                index: 1
            },
            ContentCall::Reload(TabId(1)),
        ]
    );
    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::HistoryArmed));
}

#[test]
fn test_pending_tab_is_saved_with_its_snapshot() {
    let (mut h, _w) = restored();
    h.engine.flush_now();
    let saved = h.storage.current().unwrap();
    let urls: Vec<&str> = saved.windows[0]
        .tabs
        .iter()
        .map(|t| t.active_entry().unwrap().url.as_str())
        .collect();
    assert_eq!(urls, vec!["https://one.example", TWO_B, "https://three.example"]);
    assert_eq!(saved.windows[0].selected, Some(2));
    assert_eq!(saved.windows[0].closed_tabs.len(), 1);
}

#[test]
fn test_keep_as_zombie_applies_to_one_selection() {
    let (mut h, _w) = restored();
    h.content.clear_calls();

    h.engine.keep_as_zombie(TabId(1));
    h.engine.tab_selected(TabId(1)).unwrap();
    assert!(h.content.calls().is_empty());
    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::PendingFull));

    h.engine.tab_selected(TabId(3)).unwrap();
    h.engine.tab_selected(TabId(1)).unwrap();
    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::HistoryArmed));
}

#[test]
fn test_foreground_restores_skipped_selection() {
    let (mut h, _w) = restored();
    h.engine.keep_as_zombie(TabId(3));
    h.engine.tab_selected(TabId(3)).unwrap();
    assert_eq!(h.engine.restore_state(TabId(3)), Some(RestoreState::PendingFull));

    h.engine.application_foregrounded();
    assert_eq!(h.engine.restore_state(TabId(3)), Some(RestoreState::HistoryArmed));
}

#[test]
fn test_tabs_closed_before_restore_are_skipped() {
    let mut h = Harness::new();
    live_window(&mut h);
    h.engine.tab_closed(TabId(3)).unwrap();
    let summary = h.engine.restore_session(&three_tab_session()).unwrap();
    assert_eq!(summary.restored, 2);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn test_zero_capacity_ignores_saved_closed_tabs() {
    let mut settings = SessionSettings::default();
    settings.undo.max_tabs = 0;
    let mut h = Harness::with_settings(&settings);
    let w = live_window(&mut h);
    let summary = h.engine.restore_session(&three_tab_session()).unwrap();
    assert_eq!(summary.closed_tabs, 0);
    assert_eq!(h.engine.closed_tab_count(w).unwrap(), 0);
}

#[test]
fn test_failed_restore_opens_home_tab() {
    let mut h = Harness::new();
    let w = h.engine.window_opened().unwrap();

    let err = h.engine.restore_session("{not json").unwrap_err();
    assert!(matches!(err, RestoreError::InvalidJson(_)));
    assert!(h.engine.startup_restore_finished());

    let opened = h.host.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].0, w);
    assert_eq!(opened[0].1.url, "about:home");
    assert_eq!(h.engine.tab_manager().tab_count(), 1);
    assert!(h.host.notifications().iter().any(|n| matches!(
        n,
        Notification::SessionRestored { error: Some(_) }
    )));
}

#[test]
fn test_restore_without_window_fails() {
    let mut h = Harness::new();
    let err = h.engine.restore_session(&three_tab_session()).unwrap_err();
    assert!(matches!(err, RestoreError::NoTargetWindow));
    assert!(h.host.opened().is_empty());
}

#[test]
fn test_session_without_tabs_is_rejected() {
    let mut h = Harness::new();
    live_window(&mut h);
    let err = h
        .engine
        .restore_session(r#"{"windows":[{"tabs":[]}]}"#)
        .unwrap_err();
    assert!(matches!(err, RestoreError::NoTabs));
    // The window already has tabs, so no home tab is needed.
    assert!(h.host.opened().is_empty());
}

/// Tab 1 is sound, tab 2 points past its only entry, tab 3 has no history.
fn damaged_session(selected: usize) -> String {
    json!({
        "windows": [{
            "tabs": [
                {"entries": [{"url": "https://one.example"}], "index": 1, "tabId": 1},
                {"entries": [{"url": TWO_A}], "index": 5, "tabId": 2},
                {"entries": [], "index": 0, "tabId": 3}
            ],
            "selected": selected,
            "closedTabs": [
                {"entries": [], "index": 0, "tabId": 10},
                {"entries": [{"url": "https://closed.example"}], "index": 1, "tabId": 9},
                {"entries": [{"url": "https://gone.example"}], "index": 0, "tabId": 11}
            ]
        }]
    })
    .to_string()
}

#[test]
fn test_foreground_tab_with_bad_index_is_skipped() {
    let mut h = Harness::new();
    let w = live_window(&mut h);

    let summary = h.engine.restore_session(&damaged_session(2)).unwrap();
    assert_eq!(summary.restored, 1);
    assert_eq!(summary.invalid, vec![TabId(2), TabId(3)]);
    assert_eq!(summary.selected, None);
    assert!(h.content.calls().is_empty());

    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::PendingFull));
    for id in [2, 3] {
        assert_eq!(h.engine.restore_state(TabId(id)), Some(RestoreState::Done));
        assert!(h.engine.snapshot(TabId(id)).is_none());
    }
    assert_eq!(h.engine.closed_tab_count(w).unwrap(), 1);

    h.engine.flush_now();
    let saved = h.storage.current().unwrap();
    let ids: Vec<TabId> = saved.windows[0].tabs.iter().map(|t| t.tab_id).collect();
    assert_eq!(ids, vec![TabId(1)]);
    assert_eq!(saved.windows[0].closed_tabs.len(), 1);
    assert_eq!(saved.windows[0].closed_tabs[0].tab_id, TabId(9));
}

#[test]
fn test_empty_foreground_tab_does_not_block_others() {
    let mut h = Harness::new();
    live_window(&mut h);

    let summary = h.engine.restore_session(&damaged_session(3)).unwrap();
    assert_eq!(summary.restored, 1);
    assert_eq!(summary.invalid, vec![TabId(2), TabId(3)]);
    assert_eq!(summary.selected, None);
    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::PendingFull));
    assert!(!h.engine.tab_manager().get_tab(TabId(3)).unwrap().reload_pending);
    assert!(h.engine.startup_restore_finished());
}

#[test]
fn test_damaged_background_tabs_leave_foreground_restore_intact() {
    let mut h = Harness::new();
    live_window(&mut h);

    let summary = h.engine.restore_session(&damaged_session(1)).unwrap();
    assert_eq!(summary.restored, 1);
    assert_eq!(summary.invalid, vec![TabId(2), TabId(3)]);
    assert_eq!(summary.selected, Some(TabId(1)));
    assert_eq!(
        h.content.calls(),
        vec![
            ContentCall::RestoreHistory {
                tab: TabId(1),
                entries: 1,
                index: 1
            },
            ContentCall::Reload(TabId(1)),
        ]
    );
    assert_eq!(h.engine.restore_state(TabId(1)), Some(RestoreState::HistoryArmed));

    // Selecting a tab that was never given a snapshot restores nothing.
    h.content.clear_calls();
    h.engine.tab_selected(TabId(2)).unwrap();
    assert!(h.content.calls().is_empty());
}

#[test]
fn test_non_finite_resolution_keeps_session_readable() {
    let mut h = Harness::new();
    let w = h.start();
    let tab = h.open_tab(w, 1, &["https://a.example"]);
    h.content.set_scroll(tab, 0.0, 50.0);
    h.content.0.borrow_mut().resolution = f64::NAN;
    h.engine.scrolled(tab).unwrap();
    h.engine.flush_now();
    let text = h.storage.state().current.clone().unwrap();

    let mut next = Harness::new();
    let nw = next.engine.window_opened().unwrap();
    next.engine
        .tab_added(nw, TabId(1), TabInit::default(), None)
        .unwrap();
    let summary = next.engine.restore_session(&text).unwrap();
    assert_eq!(summary.restored, 1);
    let data = next.engine.snapshot(TabId(1)).unwrap().scroll_data.clone().unwrap();
    assert_eq!(data.zoom, None);
    assert_eq!(data.frames.scroll, Some(ScrollPosition { x: 0.0, y: 50.0 }));

    // A later unusable resolution keeps the last good zoom.
    h.content.0.borrow_mut().resolution = 2.0;
    h.engine.scrolled(tab).unwrap();
    h.content.0.borrow_mut().resolution = f64::INFINITY;
    h.engine.scrolled(tab).unwrap();
    let zoom = h.engine.snapshot(tab).unwrap().scroll_data.as_ref().unwrap().zoom;
    assert_eq!(zoom.map(|z| z.resolution), Some(2.0));
}

// ─── Crash recovery ───

#[test]
fn test_recovery_prefers_current_file() {
    let storage = FakeStorage::default();
    storage.state().current = Some(three_tab_session());
    storage.state().backup = Some(three_tab_session());
    let recovered = CrashRecovery::new(&storage).load_last_session().unwrap();
    assert_eq!(recovered.source, SessionFileKind::Current);
}

#[test]
fn test_recovery_falls_back_to_backup_then_previous() {
    let storage = FakeStorage::default();
    storage.state().current = Some("{truncated".to_string());
    storage.state().backup = Some(three_tab_session());
    let recovered = CrashRecovery::new(&storage).load_last_session().unwrap();
    assert_eq!(recovered.source, SessionFileKind::Backup);

    storage.state().backup = Some(r#"{"windows":[]}"#.to_string());
    storage.state().previous = Some(three_tab_session());
    let recovered = CrashRecovery::new(&storage).load_last_session().unwrap();
    assert_eq!(recovered.source, SessionFileKind::Previous);
    assert_eq!(recovered.text, three_tab_session());
}

#[test]
fn test_recovery_reports_every_failure() {
    let storage = FakeStorage::default();
    storage.state().current = Some("{truncated".to_string());
    let err = CrashRecovery::new(&storage).load_last_session().unwrap_err();
    let message = match err {
        RestoreError::Unavailable(message) => message,
        other => panic!("expected Unavailable, got {other:?}"),
    };
    assert!(message.contains("Current"));
    assert!(message.contains("Backup"));
    assert!(message.contains("Previous"));
}
