//! RPC method handler for the tabstore host bridge.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches one request to the session engine owned by a
//! [`Bridge`]. The bridge also stands in for the engine's collaborators: it
//! serves content state the host pushed with its requests, and queues the
//! notifications and commands the engine produces until the server writes
//! them out.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::clock::Clock;
use crate::engine::{PurgeKind, SessionEngine, SessionHost};
use crate::managers::tab_manager::TabManagerTrait;
use crate::services::capture::{ContentProvider, HistoryCapture};
use crate::services::crash_recovery::{CrashRecovery, CrashRecoveryTrait};
use crate::services::session_files::SessionStorage;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::events::{Notification, OpenTabRequest, TabInit};
use crate::types::session::WindowId;
use crate::types::tab::{
    DisplaySize, FrameFormData, FrameScroll, HistoryEntry, ScrollPosition, TabId, TabSnapshot,
    Zoom,
};

/// First id handed out for tabs the engine opens itself. Host-assigned ids
/// must stay below it.
pub const ENGINE_TAB_ID_BASE: i64 = 1 << 32;

/// Lines waiting to be written to stdout, in the order they were produced.
#[derive(Debug, Clone, Default)]
pub struct Outbox(Rc<RefCell<Vec<Value>>>);

impl Outbox {
    fn push(&self, line: Value) {
        self.0.borrow_mut().push(line);
    }

    pub fn drain(&self) -> Vec<Value> {
        self.0.borrow_mut().drain(..).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PushedHistory {
    entries: Vec<HistoryEntry>,
    index: usize,
}

/// Content state for one tab as last reported by the host. Every field is
/// optional in a request; absent fields keep their previous value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PushedContent {
    history: Option<PushedHistory>,
    form_data: Option<FrameFormData>,
    scroll: Option<FrameScroll>,
    resolution: Option<f64>,
    viewer_size: Option<DisplaySize>,
    url: Option<String>,
    can_go_back: Option<bool>,
    favicon: Option<String>,
    /// Document URL per frame, keyed by the child-index path joined with `/`
    /// (the empty key is the top-level document).
    frame_urls: Option<BTreeMap<String, String>>,
}

impl PushedContent {
    fn merge(&mut self, update: PushedContent) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if update.$field.is_some() {
                    self.$field = update.$field;
                })*
            };
        }
        take!(
            history,
            form_data,
            scroll,
            resolution,
            viewer_size,
            url,
            can_go_back,
            favicon,
            frame_urls
        );
    }
}

type ContentCache = Rc<RefCell<HashMap<TabId, PushedContent>>>;

fn frame_key(path: &[usize]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Content provider backed by the state the host pushes. Restore primitives
/// become `{"command": ...}` lines for the host to carry out.
pub struct HostContent {
    tabs: ContentCache,
    outbox: Outbox,
}

impl HostContent {
    fn read<T>(&self, tab: TabId, f: impl FnOnce(&PushedContent) -> Option<T>) -> Option<T> {
        self.tabs.borrow().get(&tab).and_then(f)
    }

    fn command(&self, name: &str, tab: TabId, mut body: Value) {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("command".to_string(), json!(name));
            obj.insert("tab_id".to_string(), json!(tab));
        }
        self.outbox.push(body);
    }
}

impl ContentProvider for HostContent {
    fn collect_history(&self, tab: TabId) -> Option<HistoryCapture> {
        self.read(tab, |c| {
            c.history.as_ref().map(|h| HistoryCapture {
                entries: h.entries.clone(),
                index: h.index,
            })
        })
    }

    fn collect_form_data(&self, tab: TabId) -> Option<FrameFormData> {
        self.read(tab, |c| c.form_data.clone())
    }

    fn collect_scroll(&self, tab: TabId) -> Option<FrameScroll> {
        self.read(tab, |c| c.scroll.clone())
    }

    fn resolution(&self, tab: TabId) -> f64 {
        self.read(tab, |c| c.resolution).unwrap_or(1.0)
    }

    fn viewer_size(&self, tab: TabId) -> DisplaySize {
        self.read(tab, |c| c.viewer_size).unwrap_or_default()
    }

    fn current_url(&self, tab: TabId) -> Option<String> {
        self.read(tab, |c| c.url.clone())
    }

    fn can_go_back(&self, tab: TabId) -> bool {
        self.read(tab, |c| c.can_go_back).unwrap_or(false)
    }

    fn favicon(&self, tab: TabId) -> Option<String> {
        self.read(tab, |c| c.favicon.clone())
    }

    fn restore_history(&self, tab: TabId, snapshot: &TabSnapshot) {
        self.command(
            "restore_history",
            tab,
            json!({"entries": snapshot.entries, "index": snapshot.index}),
        );
    }

    fn reload_current_entry(&self, tab: TabId) {
        self.command("reload", tab, json!({}));
    }

    fn restore_zoom(&self, tab: TabId, zoom: &Zoom) {
        self.command("restore_zoom", tab, json!({"zoom": zoom}));
    }

    fn frame_url(&self, tab: TabId, path: &[usize]) -> Option<String> {
        let key = frame_key(path);
        self.read(tab, |c| {
            let pushed = c.frame_urls.as_ref().and_then(|urls| urls.get(&key).cloned());
            // Without a frame map the top-level URL stands in for the root frame.
            if pushed.is_none() && path.is_empty() {
                c.url.clone()
            } else {
                pushed
            }
        })
    }

    fn restore_form_frame(&self, tab: TabId, path: &[usize], data: &FrameFormData) {
        self.command("restore_form", tab, json!({"path": path, "data": data}));
    }

    fn restore_scroll_frame(&self, tab: TabId, path: &[usize], position: ScrollPosition) {
        self.command("restore_scroll", tab, json!({"path": path, "scroll": position}));
    }
}

/// Host shell on the other side of the pipe. Tabs the engine opens get ids
/// from [`ENGINE_TAB_ID_BASE`] upwards; the host must create them with the id
/// given in the `open_tab` command.
pub struct RpcHost {
    outbox: Outbox,
    next_tab_id: Cell<i64>,
}

impl SessionHost for RpcHost {
    fn notify(&self, notification: Notification) {
        match serde_json::to_value(&notification) {
            Ok(line) => self.outbox.push(line),
            Err(e) => warn!(error = %e, "dropping notification that failed to serialize"),
        }
    }

    fn open_tab(&self, window: WindowId, request: OpenTabRequest) -> Option<TabId> {
        let id = self.next_tab_id.get();
        self.next_tab_id.set(id + 1);
        self.outbox.push(json!({
            "command": "open_tab",
            "window": window,
            "tab_id": id,
            "request": request,
        }));
        Some(TabId(id))
    }
}

/// Everything one host connection drives.
pub struct Bridge {
    pub engine: SessionEngine,
    pub settings: SettingsEngine,
    storage: Arc<dyn SessionStorage>,
    content: ContentCache,
    outbox: Outbox,
}

impl Bridge {
    pub fn new(
        settings: SettingsEngine,
        storage: Arc<dyn SessionStorage>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let content = ContentCache::default();
        let outbox = Outbox::default();
        let provider = HostContent {
            tabs: content.clone(),
            outbox: outbox.clone(),
        };
        let host = RpcHost {
            outbox: outbox.clone(),
            next_tab_id: Cell::new(ENGINE_TAB_ID_BASE),
        };
        let engine = SessionEngine::new(
            settings.get_settings(),
            Box::new(provider),
            storage.clone(),
            Box::new(host),
            clock,
        );
        Self {
            engine,
            settings,
            storage,
            content,
            outbox,
        }
    }

    pub fn storage(&self) -> Arc<dyn SessionStorage> {
        self.storage.clone()
    }

    /// Notifications and commands produced since the last drain.
    pub fn drain_outbox(&self) -> Vec<Value> {
        self.outbox.drain()
    }

    /// Caches the `state` object of a request, if it has one.
    fn push_state(&self, tab_id: TabId, params: &Value) -> Result<(), String> {
        let Some(state) = params.get("state") else {
            return Ok(());
        };
        let update: PushedContent =
            serde_json::from_value(state.clone()).map_err(|e| format!("invalid state: {}", e))?;
        self.content
            .borrow_mut()
            .entry(tab_id)
            .or_default()
            .merge(update);
        Ok(())
    }

    fn forget_content(&self, ids: &[TabId]) {
        let mut cache = self.content.borrow_mut();
        for id in ids {
            cache.remove(id);
        }
    }
}

fn param_tab(params: &Value) -> Result<TabId, String> {
    params
        .get("tab_id")
        .and_then(|v| v.as_i64())
        .map(TabId)
        .ok_or_else(|| "missing tab_id".to_string())
}

fn param_window(params: &Value) -> Result<WindowId, String> {
    params
        .get("window")
        .and_then(|v| v.as_u64())
        .map(WindowId)
        .ok_or_else(|| "missing window".to_string())
}

fn param_index(params: &Value, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.as_u64()).map(|i| i as usize)
}

/// Accepts either snapshot objects or the JSON strings handed out as
/// `ClosedTabSummary::data`.
fn parse_snapshots(list: &[Value]) -> Result<Vec<TabSnapshot>, String> {
    list.iter()
        .map(|item| match item {
            Value::String(text) => serde_json::from_str(text),
            other => serde_json::from_value(other.clone()),
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid tab data: {}", e))
}

/// Dispatch a request to the appropriate engine operation.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub fn handle_method(bridge: &mut Bridge, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Windows ───
        "window.open" => {
            let window = bridge.engine.window_opened().ok_or("shutting down")?;
            Ok(json!({"window": window}))
        }
        "window.close" => {
            let window = param_window(params)?;
            let tabs = bridge
                .engine
                .tab_manager()
                .get_window(window)
                .map(|w| w.tabs.clone())
                .unwrap_or_default();
            let known = bridge.engine.window_closed(window);
            if bridge.engine.tab_manager().get_window(window).is_none() {
                bridge.forget_content(&tabs);
            }
            Ok(json!({"ok": known}))
        }
        "window.remove" => {
            let window = param_window(params)?;
            let tabs = bridge
                .engine
                .tab_manager()
                .get_window(window)
                .map(|w| w.tabs.clone())
                .unwrap_or_default();
            let removed = bridge.engine.remove_window(window);
            bridge.forget_content(&tabs);
            Ok(json!({"ok": removed}))
        }

        // ─── Tabs ───
        "tab.add" => {
            let window = param_window(params)?;
            let tab_id = param_tab(params)?;
            if !tab_id.is_valid() || tab_id.0 >= ENGINE_TAB_ID_BASE {
                return Err(format!("invalid tab_id: {}", tab_id));
            }
            let mut init: TabInit = serde_json::from_value(params.clone())
                .map_err(|e| format!("invalid tab: {}", e))?;
            init.parent_id = init.parent_id.filter(|id| id.is_valid());
            bridge.push_state(tab_id, params)?;
            bridge
                .engine
                .tab_added(window, tab_id, init, param_index(params, "index"))
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab.close" => {
            let tab_id = param_tab(params)?;
            bridge.engine.tab_closed(tab_id).map_err(|e| e.to_string())?;
            bridge.forget_content(&[tab_id]);
            Ok(json!({"ok": true}))
        }
        "tab.select" => {
            let tab_id = param_tab(params)?;
            bridge.engine.tab_selected(tab_id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab.move" => {
            let tab_id = param_tab(params)?;
            let index = param_index(params, "index").ok_or("missing index")?;
            bridge.engine.tab_moved(tab_id, index).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab.keep_zombie" => {
            let tab_id = param_tab(params)?;
            bridge.engine.keep_as_zombie(tab_id);
            Ok(json!({"ok": true}))
        }
        "tab.get_value" => {
            let tab_id = param_tab(params)?;
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let value = bridge.engine.get_tab_value(tab_id, key).map_err(|e| e.to_string())?;
            Ok(json!({"value": value}))
        }
        "tab.set_value" => {
            let tab_id = param_tab(params)?;
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let value = params.get("value").and_then(|v| v.as_str()).ok_or("missing value")?;
            bridge
                .engine
                .set_tab_value(tab_id, key, value)
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tab.delete_value" => {
            let tab_id = param_tab(params)?;
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            bridge
                .engine
                .delete_tab_value(tab_id, key)
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tabs.open" => {
            let window = param_window(params)?;
            let urls: Vec<String> = params
                .get("urls")
                .and_then(|v| v.as_array())
                .ok_or("missing urls")?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let ids = bridge.engine.open_tabs(window, &urls).map_err(|e| e.to_string())?;
            Ok(json!({"tab_ids": ids}))
        }

        // ─── Content events ───
        "content.history" | "content.input" | "content.scroll" | "content.location"
        | "content.load" | "content.pageshow" => {
            let tab_id = param_tab(params)?;
            bridge.push_state(tab_id, params)?;
            let engine = &mut bridge.engine;
            let result = match method {
                "content.history" => engine.history_changed(tab_id),
                "content.input" => engine.form_input(tab_id),
                "content.scroll" => engine.scrolled(tab_id),
                "content.location" => engine.location_changed(tab_id),
                "content.load" => engine.content_loaded(tab_id),
                _ => {
                    let reader_ready = params
                        .get("reader_ready")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(true);
                    engine.page_shown(tab_id, reader_ready)
                }
            };
            result.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "app.foreground" => {
            bridge.engine.application_foregrounded();
            Ok(json!({"ok": true}))
        }

        // ─── Session ───
        "session.flush" => {
            let background = params
                .get("background")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if background {
                bridge.engine.flush_tabs();
                Ok(json!({"ok": true}))
            } else {
                Ok(json!({"flushed": bridge.engine.flush_now()}))
            }
        }
        "session.purge" => {
            let kind = match params.get("kind").and_then(|v| v.as_str()) {
                None | Some("session_history") => PurgeKind::SessionHistory,
                Some("session_tabs") => PurgeKind::SessionTabs,
                Some(other) => return Err(format!("invalid purge kind: {}", other)),
            };
            bridge.engine.purge_history(kind);
            Ok(json!({"ok": true}))
        }
        "session.restore" => {
            let data = params.get("data").and_then(|v| v.as_str()).ok_or("missing data")?;
            let summary = bridge.engine.restore_session(data).map_err(|e| e.to_string())?;
            serde_json::to_value(summary).map_err(|e| e.to_string())
        }
        "session.recover" => {
            let recovered = CrashRecovery::new(bridge.storage.as_ref()).load_last_session();
            match recovered {
                Ok(session) => {
                    let summary = bridge
                        .engine
                        .restore_session(&session.text)
                        .map_err(|e| e.to_string())?;
                    Ok(json!({"restored": true, "source": session.source, "summary": summary}))
                }
                Err(e) => {
                    bridge.engine.skip_startup_restore();
                    Ok(json!({"restored": false, "reason": e.to_string()}))
                }
            }
        }
        "session.quit" => {
            match params.get("stage").and_then(|v| v.as_str()) {
                Some("proceeding") => bridge.engine.quit_proceeding(),
                None | Some("flush") => bridge.engine.quit(),
                Some(other) => return Err(format!("invalid quit stage: {}", other)),
            }
            Ok(json!({"state": bridge.engine.load_state()}))
        }
        "private.exited" => {
            bridge.engine.private_browsing_exited();
            Ok(json!({"ok": true}))
        }

        // ─── Closed tabs ───
        "closed_tabs.list" => {
            let window = param_window(params)?;
            let tabs = bridge.engine.closed_tabs(window).map_err(|e| e.to_string())?;
            Ok(json!(tabs))
        }
        "closed_tabs.count" => {
            let window = param_window(params)?;
            let count = bridge.engine.closed_tab_count(window).map_err(|e| e.to_string())?;
            Ok(json!({"count": count}))
        }
        "closed_tabs.undo" => {
            let window = param_window(params)?;
            let index = param_index(params, "index").unwrap_or(0);
            let tab_id = bridge
                .engine
                .undo_close_tab(window, index)
                .map_err(|e| e.to_string())?;
            Ok(json!({"tab_id": tab_id}))
        }
        "closed_tabs.restore" => {
            let window = param_window(params)?;
            let list = params.get("tabs").and_then(|v| v.as_array()).ok_or("missing tabs")?;
            let snapshots = parse_snapshots(list)?;
            let ids = bridge
                .engine
                .restore_tabs(window, snapshots)
                .map_err(|e| e.to_string())?;
            Ok(json!({"tab_ids": ids}))
        }
        "closed_tabs.notifications" => {
            let enabled = params
                .get("enabled")
                .and_then(|v| v.as_bool())
                .ok_or("missing enabled")?;
            bridge.engine.set_closed_tab_notifications(enabled);
            Ok(json!({"ok": true}))
        }

        // ─── Settings ───
        "settings.get" => match params.get("key").and_then(|v| v.as_str()) {
            Some(key) => bridge.settings.get_value(key).map_err(|e| e.to_string()),
            None => serde_json::to_value(bridge.settings.get_settings()).map_err(|e| e.to_string()),
        },
        "settings.set" => {
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            bridge.settings.set_value(key, value).map_err(|e| e.to_string())?;
            bridge.engine.apply_settings(bridge.settings.get_settings());
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
