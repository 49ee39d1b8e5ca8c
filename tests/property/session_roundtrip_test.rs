//! Property-based tests for session save-restore round-trip.
//!
//! These tests verify that any session the engine writes can be parsed back,
//! and that restoring it hands every live tab the snapshot that was saved.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;

use common::Harness;
use proptest::prelude::*;
use tabstore::services::restore::parse_session;
use tabstore::services::session_writer::serialize;
use tabstore::types::session::{SessionState, WindowData};
use tabstore::types::tab::{HistoryEntry, TabId, TabSnapshot};

// --- Arbitrary strategies for session types ---

fn arb_entry() -> impl Strategy<Value = HistoryEntry> {
    (
        "https?://[a-z]{3,15}\\.[a-z]{2,5}/[a-z0-9/_-]{0,30}",
        proptest::option::of("[A-Za-z0-9 ]{1,30}"),
    )
        .prop_map(|(url, title)| HistoryEntry::new(&url, title.as_deref()))
}

fn arb_snapshot(tab_id: i64) -> impl Strategy<Value = TabSnapshot> {
    (
        proptest::collection::vec(arb_entry(), 1..5),
        any::<bool>(),
        proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..3),
    )
        .prop_flat_map(move |(entries, desktop_mode, ext_data)| {
            let len = entries.len();
            (Just(entries), 1..=len, Just(desktop_mode), Just(ext_data))
        })
        .prop_map(move |(entries, index, desktop_mode, ext_data)| {
            let mut snap = TabSnapshot::new(TabId(tab_id), false);
            snap.entries = entries;
            snap.index = index;
            snap.desktop_mode = desktop_mode;
            snap.ext_data = ext_data.into_iter().collect::<BTreeMap<_, _>>();
            snap
        })
}

fn arb_window() -> impl Strategy<Value = WindowData> {
    (1usize..5)
        .prop_flat_map(|count| {
            let tabs: Vec<_> = (1..=count as i64).map(arb_snapshot).collect();
            let closed = proptest::collection::vec(arb_snapshot(-1), 0..3);
            (tabs, proptest::option::of(1..=count), closed)
        })
        .prop_map(|(tabs, selected, closed_tabs)| WindowData {
            tabs,
            selected,
            closed_tabs,
        })
}

fn arb_session() -> impl Strategy<Value = SessionState> {
    proptest::collection::vec(arb_window(), 1..3).prop_map(|windows| SessionState { windows })
}

/// Page history for one live tab: its URLs and the 1-based active index.
fn arb_page() -> impl Strategy<Value = (Vec<String>, usize)> {
    proptest::collection::vec("https://[a-z]{3,10}\\.example/[a-z]{0,8}", 1..5).prop_flat_map(
        |urls| {
            let len = urls.len();
            (Just(urls), 1..=len)
        },
    )
}

// *For any* session document, serializing and parsing it SHALL give back an
// equal document.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn session_document_roundtrip(session in arb_session()) {
        let bytes = serialize(&session).expect("serialize should succeed");
        let text = String::from_utf8(bytes).expect("session JSON is UTF-8");
        let parsed = parse_session(&text).expect("written session should parse");
        prop_assert_eq!(parsed, session);
    }
}

// *For any* set of open tabs, writing the session and restoring it into a
// fresh engine with the same tabs SHALL give each tab the snapshot saved for
// it.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn session_save_restore_roundtrip(pages in proptest::collection::vec(arb_page(), 1..5)) {
        let mut saver = Harness::new();
        let window = saver.start();
        for (i, (urls, index)) in pages.iter().enumerate() {
            let tab = TabId(i as i64 + 1);
            saver.engine.tab_added(window, tab, Default::default(), None).unwrap();
            let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
            saver.content.set_page(tab, &urls, *index);
            saver.engine.history_changed(tab).unwrap();
        }
        prop_assert!(saver.engine.flush_now());
        let saved = saver.storage.current().expect("session file written");
        let text = saver.storage.state().current.clone().unwrap_or_default();

        let mut restorer = Harness::new();
        let window = restorer.engine.window_opened().unwrap();
        for i in 0..pages.len() {
            restorer
                .engine
                .tab_added(window, TabId(i as i64 + 1), Default::default(), None)
                .unwrap();
        }
        let summary = restorer.engine.restore_session(&text).expect("restore should succeed");
        prop_assert_eq!(summary.restored, pages.len());
        prop_assert_eq!(summary.skipped, 0);

        for written in &saved.windows[0].tabs {
            let restored = restorer.engine.snapshot(written.tab_id);
            prop_assert_eq!(restored, Some(written));
        }
        for (i, (urls, index)) in pages.iter().enumerate() {
            let snap = restorer.engine.snapshot(TabId(i as i64 + 1)).unwrap();
            prop_assert_eq!(snap.index, *index);
            let restored_urls: Vec<&str> = snap.entries.iter().map(|e| e.url.as_str()).collect();
            prop_assert_eq!(restored_urls, urls.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
