//! Session engine.
//!
//! One explicit instance owns the live tab arena, the save scheduler and the
//! writer bookkeeping. Everything it needs from the outside world (content
//! primitives, durable storage, the host shell, time) is injected, and every
//! method runs on the caller's single event-loop thread.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::managers::save_scheduler::{SaveDecision, SaveScheduler, SaveTimings, WriteTicket};
use crate::managers::tab_manager::{TabManager, TabManagerTrait, TrackedTab, TrackedWindow};
use crate::services::capture::{self, CaptureOutcome, ContentProvider};
use crate::services::restore::{self, PageShow};
use crate::services::session_files::SessionStorage;
use crate::services::session_writer::{self, SessionWriter, WriteJob};
use crate::types::errors::{RestoreError, TabError, UndoError, WriteError};
use crate::types::events::{CaptureKind, Notification, OpenTabRequest, TabInit};
use crate::types::restore::RestoreState;
use crate::types::session::{ClosedTabSummary, WindowId};
use crate::types::settings::{PrivacyLevel, SessionSettings};
use crate::types::tab::{TabId, TabSnapshot};

/// The shell that owns the real windows and tabs.
pub trait SessionHost {
    fn notify(&self, notification: Notification);
    /// Opens a tab on the engine's behalf and returns its id. The engine
    /// registers the tab itself; the host must not report it as added.
    fn open_tab(&self, window: WindowId, request: OpenTabRequest) -> Option<TabId>;
}

/// Lifecycle of the engine. Data is only collected while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Stopped,
    Running,
    /// Shutdown has begun; the session is frozen as it is.
    Quitting,
    /// The final synchronous flush has happened.
    QuittingFlushed,
}

impl LoadState {
    pub fn is_quitting(self) -> bool {
        matches!(self, LoadState::Quitting | LoadState::QuittingFlushed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeKind {
    /// Forget the files and closed tabs, and trim live history to the
    /// current page.
    SessionHistory,
    /// Forget the files and closed tabs only.
    SessionTabs,
}

/// Outcome of a successful session restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreSummary {
    /// Tabs that received their saved state.
    pub restored: usize,
    /// Saved tabs whose live tab no longer exists.
    pub skipped: usize,
    /// The tab restored in the foreground.
    pub selected: Option<TabId>,
    /// Saved tabs left untouched because their snapshot cannot be restored.
    pub invalid: Vec<TabId>,
    pub closed_tabs: usize,
}

pub struct SessionEngine {
    tabs: TabManager,
    scheduler: SaveScheduler,
    writer: SessionWriter,
    privacy: PrivacyLevel,
    load_state: LoadState,
    startup_restore_finished: bool,
    /// Position the most recently closed tab had in its window.
    last_closed_index: Option<usize>,
    notify_closed_tabs: bool,
    /// Valid for the next single selection only.
    keep_as_zombie: Option<TabId>,
    /// A write was due while another one was in flight.
    write_deferred: bool,
    queued_job: Option<WriteJob>,
    content: Box<dyn ContentProvider>,
    storage: Arc<dyn SessionStorage>,
    host: Box<dyn SessionHost>,
    clock: Box<dyn Clock>,
}

impl SessionEngine {
    pub fn new(
        settings: &SessionSettings,
        content: Box<dyn ContentProvider>,
        storage: Arc<dyn SessionStorage>,
        host: Box<dyn SessionHost>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            tabs: TabManager::new(settings.undo.max_tabs),
            scheduler: SaveScheduler::new(SaveTimings::from(&settings.saving)),
            writer: SessionWriter::new(settings.saving.backup_interval_ms),
            privacy: settings.privacy.level,
            load_state: LoadState::Stopped,
            startup_restore_finished: false,
            last_closed_index: None,
            notify_closed_tabs: false,
            keep_as_zombie: None,
            write_deferred: false,
            queued_job: None,
            content,
            storage,
            host,
            clock,
        }
    }

    /// Re-reads every tunable. A zero undo capacity empties all rings.
    pub fn apply_settings(&mut self, settings: &SessionSettings) {
        self.scheduler.set_timings(SaveTimings::from(&settings.saving));
        self.writer.set_backup_interval(settings.saving.backup_interval_ms);
        self.privacy = settings.privacy.level;
        self.tabs.set_undo_capacity(settings.undo.max_tabs);
        if settings.undo.max_tabs == 0 {
            self.forget_closed_tabs();
        }
    }

    // --- Accessors ---

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn tab_manager(&self) -> &TabManager {
        &self.tabs
    }

    pub fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    pub fn writer(&self) -> &SessionWriter {
        &self.writer
    }

    pub fn startup_restore_finished(&self) -> bool {
        self.startup_restore_finished
    }

    /// Marks startup restore as over without restoring anything.
    pub fn skip_startup_restore(&mut self) {
        self.startup_restore_finished = true;
        self.host.notify(Notification::SessionRestored { error: None });
    }

    pub fn restore_state(&self, tab_id: TabId) -> Option<RestoreState> {
        self.tabs.get_tab(tab_id).map(|t| t.restore)
    }

    pub fn snapshot(&self, tab_id: TabId) -> Option<&TabSnapshot> {
        self.tabs.get_tab(tab_id).and_then(|t| t.snapshot.as_ref())
    }

    pub fn can_undo_last_close(&self) -> bool {
        self.last_closed_index.is_some()
    }

    pub fn last_closed_index(&self) -> Option<usize> {
        self.last_closed_index
    }

    // --- Load state ---

    pub fn quit_proceeding(&mut self) {
        info!("quit proceeding, freezing session data");
        self.load_state = LoadState::Quitting;
    }

    /// Final synchronous flush before the process exits.
    pub fn quit(&mut self) {
        self.flush_now();
        self.load_state = LoadState::QuittingFlushed;
        info!("session flushed for quit");
    }

    // --- Windows ---

    /// Starts tracking a window. Windows opened during shutdown are ignored.
    pub fn window_opened(&mut self) -> Option<WindowId> {
        if self.load_state.is_quitting() {
            return None;
        }
        let window = self.tabs.open_window();
        if self.load_state == LoadState::Stopped {
            self.load_state = LoadState::Running;
            self.scheduler.mark_saved(self.clock.now_ms());
        }
        info!(%window, "window opened");
        Some(window)
    }

    /// Stops tracking a window. While quitting its data stays in the session.
    pub fn window_closed(&mut self, window: WindowId) -> bool {
        if self.tabs.get_window(window).is_none() {
            return false;
        }
        if self.load_state == LoadState::Running {
            self.tabs.close_window(window);
            self.request_save(false);
        }
        info!(%window, "window closed");
        true
    }

    /// Drops a window's data without a close.
    pub fn remove_window(&mut self, window: WindowId) -> bool {
        if self.tabs.close_window(window).is_none() {
            return false;
        }
        match self.load_state {
            LoadState::Running => self.save_immediately(false),
            LoadState::Quitting | LoadState::QuittingFlushed => self.request_save(false),
            LoadState::Stopped => {}
        }
        true
    }

    // --- Tabs ---

    pub fn tab_added(
        &mut self,
        window: WindowId,
        tab_id: TabId,
        init: TabInit,
        index: Option<usize>,
    ) -> Result<(), TabError> {
        self.tabs.add_tab(window, tab_id, init, index)?;
        debug!(%tab_id, %window, "tab added");
        self.request_save(false);
        Ok(())
    }

    /// Records the closed tab in its window's undo ring, then stops tracking it.
    pub fn tab_closed(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let removed = self.tabs.remove_tab(tab_id)?;
        let window = removed.tab.window;
        let is_private = removed.tab.is_private;

        let recorded = match (removed.tab.persisted(), self.tabs.get_window_mut(window)) {
            (Some(snapshot), Some(win)) => win.closed.record_close(snapshot),
            _ => false,
        };
        if recorded {
            self.last_closed_index = Some(removed.index);
            self.send_closed_tabs(window);
            self.host.notify(Notification::TabCloseProcessed { tab_id });
            debug!(%tab_id, index = removed.index, "closed tab recorded");
        } else {
            self.last_closed_index = None;
        }

        self.request_save(is_private);
        Ok(())
    }

    pub fn tab_selected(&mut self, tab_id: TabId) -> Result<(), TabError> {
        if self.load_state != LoadState::Running {
            return Ok(());
        }
        let window = self.tabs.select_tab(tab_id)?;

        if self.keep_as_zombie.take() == Some(tab_id) {
            debug!(%tab_id, "keeping as zombie tab");
        } else if let Some(tab) = self.tabs.get_tab_mut(tab_id) {
            restore::restore_zombie(tab_id, tab, self.content.as_ref());
        }

        self.request_save(false);
        // The selection may have switched between private and normal mode.
        self.send_closed_tabs(window);
        Ok(())
    }

    pub fn tab_moved(&mut self, tab_id: TabId, new_index: usize) -> Result<(), TabError> {
        if self.load_state != LoadState::Running {
            return Ok(());
        }
        self.tabs.move_tab(tab_id, new_index)?;
        self.last_closed_index = None;
        self.request_save(false);
        Ok(())
    }

    /// The next selection of `tab_id` will not restore it.
    pub fn keep_as_zombie(&mut self, tab_id: TabId) {
        if tab_id.is_valid() {
            self.keep_as_zombie = Some(tab_id);
        }
    }

    /// Restores the selected tab if it was skipped while in the background.
    pub fn application_foregrounded(&mut self) {
        let selected = self
            .tabs
            .most_recent_window()
            .and_then(|w| self.tabs.get_window(w))
            .and_then(|w| w.selected);
        if let Some(tab_id) = selected {
            if let Some(tab) = self.tabs.get_tab_mut(tab_id) {
                restore::restore_zombie(tab_id, tab, self.content.as_ref());
            }
        }
    }

    // --- Tab values ---

    pub fn get_tab_value(&self, tab_id: TabId, key: &str) -> Result<String, TabError> {
        let tab = self.tabs.get_tab(tab_id).ok_or(TabError::NotFound(tab_id))?;
        Ok(tab.ext_data.get(key).cloned().unwrap_or_default())
    }

    pub fn set_tab_value(&mut self, tab_id: TabId, key: &str, value: &str) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        tab.ext_data.insert(key.to_string(), value.to_string());
        self.request_save(false);
        Ok(())
    }

    pub fn delete_tab_value(&mut self, tab_id: TabId, key: &str) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        if tab.ext_data.remove(key).is_some() {
            self.request_save(false);
        }
        Ok(())
    }

    // --- Content events ---

    fn capture_allowed(startup_restore_finished: bool, tab: &TrackedTab) -> bool {
        startup_restore_finished && tab.restore != RestoreState::PendingFull && !tab.reload_pending
    }

    /// Navigation history changed (or a page finished loading its title).
    pub fn history_changed(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        if !Self::capture_allowed(self.startup_restore_finished, tab) {
            return Ok(());
        }
        let content = self.content.as_ref();
        if capture::capture_history(tab_id, tab, content) == CaptureOutcome::Skipped {
            return Ok(());
        }
        // Back/forward navigation restores form fields and scroll without
        // firing the events that would capture them.
        if !tab.restore.is_restoring_content() {
            capture::capture_form_data(tab_id, tab, content, self.privacy);
            capture::capture_scroll(tab_id, tab, content);
        }
        self.host.notify(Notification::DataUpdated {
            tab_id,
            kind: CaptureKind::History,
        });
        self.request_save(false);
        Ok(())
    }

    pub fn form_input(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        if !Self::capture_allowed(self.startup_restore_finished, tab) {
            return Ok(());
        }
        if capture::capture_form_data(tab_id, tab, self.content.as_ref(), self.privacy)
            == CaptureOutcome::Captured
        {
            self.host.notify(Notification::DataUpdated {
                tab_id,
                kind: CaptureKind::FormData,
            });
            self.request_save(false);
        }
        Ok(())
    }

    /// Scroll position or zoom changed.
    pub fn scrolled(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        if !Self::capture_allowed(self.startup_restore_finished, tab) {
            return Ok(());
        }
        if capture::capture_scroll(tab_id, tab, self.content.as_ref()) == CaptureOutcome::Captured {
            self.host.notify(Notification::DataUpdated {
                tab_id,
                kind: CaptureKind::Scroll,
            });
            self.request_save(false);
        }
        Ok(())
    }

    pub fn location_changed(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        restore::on_location_change(
            tab_id,
            tab,
            self.content.as_ref(),
            self.startup_restore_finished,
        );
        Ok(())
    }

    pub fn content_loaded(&mut self, tab_id: TabId) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        restore::on_load(tab_id, tab, self.content.as_ref());
        Ok(())
    }

    /// The top-level page was shown. `reader_ready` is false while a reader
    /// view has not finished rendering; such events are ignored.
    pub fn page_shown(&mut self, tab_id: TabId, reader_ready: bool) -> Result<(), TabError> {
        let tab = self
            .tabs
            .get_tab_mut(tab_id)
            .ok_or(TabError::NotFound(tab_id))?;
        let content = self.content.as_ref();
        let url = content.current_url(tab_id).unwrap_or_default();
        if url.starts_with("about:reader") && !reader_ready {
            return Ok(());
        }
        if url == "about:blank" && !content.can_go_back(tab_id) {
            return Ok(());
        }
        match restore::on_page_show(tab_id, tab, content) {
            PageShow::ScrollRestored => Ok(()),
            PageShow::CaptureBaseline => self.scrolled(tab_id),
        }
    }

    // --- Saving ---

    /// Debounced save request.
    pub fn request_save(&mut self, private_only: bool) {
        let now = self.clock.now_ms();
        if self.scheduler.request(private_only, now) == SaveDecision::WriteNow {
            self.save_state(true);
        }
    }

    /// Counts a request and writes without waiting.
    fn save_immediately(&mut self, private_only: bool) {
        self.scheduler.record(private_only);
        self.save_state(true);
    }

    /// Cancels the timer and writes synchronously if anything is pending.
    /// Returns whether a save cycle ran.
    pub fn flush_now(&mut self) -> bool {
        self.scheduler.cancel_timer();
        if self.scheduler.pending() == 0 {
            debug!("flush requested with nothing pending");
            return false;
        }
        self.save_state(false);
        true
    }

    /// Flush on the way to the background. Tells the host when its private
    /// data is still current.
    pub fn flush_tabs(&mut self) {
        if !self.flush_now() {
            self.host.notify(Notification::PrivateDataUnchanged);
        }
    }

    /// When the driver should call [`SessionEngine::on_timer`].
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.deadline_ms()
    }

    pub fn on_timer(&mut self) {
        let now = self.clock.now_ms();
        if !self.scheduler.on_timer(now) || self.load_state != LoadState::Running {
            return;
        }
        debug!(pending = self.scheduler.pending(), "save timer fired");
        self.save_state(true);
    }

    /// The serialized session the driver should write off the event loop.
    pub fn take_write_job(&mut self) -> Option<WriteJob> {
        self.queued_job.take()
    }

    /// Reports the outcome of a job taken with [`SessionEngine::take_write_job`].
    pub fn complete_write(&mut self, ticket: WriteTicket, result: Result<(), WriteError>) {
        let succeeded = result.is_ok();
        let reset = self.scheduler.finish_write(ticket, succeeded);
        match result {
            Ok(()) => {
                self.writer.mark_good();
                info!(generation = ticket.generation, reset, "session written");
                self.host.notify(Notification::WriteCompleted);
            }
            Err(e) => {
                error!(generation = ticket.generation, error = %e, "session write failed");
                self.host.notify(Notification::WriteFailed {
                    message: e.to_string(),
                });
            }
        }

        if self.write_deferred && !self.scheduler.write_in_flight() {
            self.write_deferred = false;
            if self.scheduler.pending() > 0 && self.load_state == LoadState::Running {
                self.save_state(true);
            }
        }
    }

    /// One save cycle: optional backup, partition, private handoff, durable
    /// write of the normal partition.
    fn save_state(&mut self, asynchronous: bool) {
        self.scheduler.cancel_timer();
        if asynchronous && self.scheduler.write_in_flight() {
            debug!("write in flight, deferring save");
            self.write_deferred = true;
            return;
        }

        let now = self.clock.now_ms();
        if self.writer.backup_due(
            now,
            self.scheduler.write_in_flight(),
            self.storage.exists(),
        ) {
            match self.storage.backup() {
                Ok(()) => self.writer.mark_backed_up(now),
                Err(e) => warn!(error = %e, "session backup failed"),
            }
        }

        let parts = session_writer::partition(&self.tabs.collect());
        self.host.notify(Notification::PrivateData {
            session: parts.private_payload(),
        });

        if self.scheduler.is_private_only() {
            debug!("only private tabs changed, skipping disk write");
            self.scheduler.reset();
            self.scheduler.mark_saved(now);
            return;
        }

        let bytes = match session_writer::serialize(&parts.normal) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "session serialization failed");
                self.host.notify(Notification::WriteFailed {
                    message: e.to_string(),
                });
                return;
            }
        };

        let ticket = self.scheduler.begin_write(now);
        info!(
            tabs = parts.normal_tab_count(),
            generation = ticket.generation,
            asynchronous,
            "writing session"
        );
        self.host.notify(Notification::WriteStarted);
        let job = WriteJob { ticket, bytes };
        if asynchronous {
            self.queued_job = Some(job);
        } else {
            let result = self.storage.write_atomic(&job).map_err(WriteError::from);
            self.complete_write(ticket, result);
        }
    }

    // --- Purge ---

    pub fn purge_history(&mut self, kind: PurgeKind) {
        info!(?kind, "purging session history");
        self.clear_disk();
        self.forget_closed_tabs();

        if kind == PurgeKind::SessionHistory {
            for tab in self.tabs.tabs_mut() {
                if let Some(snapshot) = tab.snapshot.as_mut() {
                    snapshot.truncate_to_active();
                }
            }
        }

        match self.load_state {
            LoadState::Running => self.save_immediately(false),
            LoadState::Quitting | LoadState::QuittingFlushed => {
                self.request_save(false);
                if self.load_state == LoadState::QuittingFlushed {
                    self.flush_now();
                }
            }
            LoadState::Stopped => {}
        }

        self.host.notify(Notification::PurgeComplete);
        if let Some(window) = self.tabs.most_recent_window() {
            self.send_closed_tabs(window);
        }
    }

    fn clear_disk(&mut self) {
        self.writer.invalidate();
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to remove session files");
        }
    }

    fn forget_closed_tabs(&mut self) {
        self.tabs.forget_closed_tabs();
        self.last_closed_index = None;
    }

    /// The last private browsing context went away.
    pub fn private_browsing_exited(&mut self) {
        let purged = self.tabs.purge_private_closed();
        debug!(purged, "private closed tabs forgotten");
        self.last_closed_index = None;
    }

    // --- Restore ---

    /// Restores a serialized session into the most recently opened window.
    /// Startup restore counts as finished afterwards, whatever the outcome;
    /// on failure an empty window gets a home tab.
    pub fn restore_session(&mut self, text: &str) -> Result<RestoreSummary, RestoreError> {
        let result = self.restore_window(text);
        self.startup_restore_finished = true;

        match &result {
            Ok(summary) => info!(
                restored = summary.restored,
                skipped = summary.skipped,
                "session restored"
            ),
            Err(e) => {
                error!(error = %e, "session restore failed");
                self.open_fallback_tab();
            }
        }
        self.host.notify(Notification::SessionRestored {
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    fn restore_window(&mut self, text: &str) -> Result<RestoreSummary, RestoreError> {
        let state = restore::parse_session(text)?;
        let window = self
            .tabs
            .most_recent_window()
            .ok_or(RestoreError::NoTargetWindow)?;
        let Some(data) = state.windows.into_iter().next() else {
            return Err(RestoreError::NoWindows);
        };

        let foreground = self
            .tabs
            .get_window(window)
            .and_then(|w| w.selected)
            .or_else(|| data.selected_tab().map(|t| t.tab_id));

        let mut summary = RestoreSummary::default();
        for snapshot in data.tabs {
            let tab_id = snapshot.tab_id;
            let Some(tab) = self.tabs.get_tab_mut(tab_id) else {
                debug!(%tab_id, "tab closed before restore, skipping");
                summary.skipped += 1;
                continue;
            };
            if let Err(e) = restore::validate_snapshot(tab_id, &snapshot) {
                error!(%tab_id, error = %e, "tab restore skipped");
                summary.invalid.push(tab_id);
                continue;
            }

            if foreground == Some(tab_id) {
                // Capture stays off until the reload has actually started.
                tab.reload_pending = true;
                let content = self.content.as_ref();
                if let Err(e) = restore::begin_restore(tab_id, tab, snapshot, content) {
                    error!(%tab_id, error = %e, "tab restore skipped");
                    tab.reload_pending = false;
                    summary.invalid.push(tab_id);
                    continue;
                }
                summary.selected = Some(tab_id);
            } else {
                tab.ext_data = snapshot.ext_data.clone();
                if snapshot.parent_id.is_some() {
                    tab.parent_id = snapshot.parent_id;
                }
                tab.snapshot = Some(snapshot);
                tab.restore = RestoreState::PendingFull;
            }
            summary.restored += 1;
        }

        if let Some(tab_id) = summary.selected {
            let _ = self.tabs.select_tab(tab_id);
        }

        if self.tabs.undo_capacity() > 0 {
            if let Some(win) = self.tabs.get_window_mut(window) {
                win.closed.replace(data.closed_tabs);
                summary.closed_tabs = win.closed.len();
            }
        }
        Ok(summary)
    }

    fn open_fallback_tab(&mut self) {
        let Some(window) = self.tabs.most_recent_window() else {
            return;
        };
        if self
            .tabs
            .get_window(window)
            .is_some_and(|w| !w.tabs.is_empty())
        {
            return;
        }
        let request = OpenTabRequest {
            url: "about:home".to_string(),
            title: None,
            selected: true,
            delay_load: false,
            index: None,
            is_private: false,
            desktop_mode: false,
            parent_id: None,
        };
        if let Some(tab_id) = self.host.open_tab(window, request) {
            if let Err(e) = self.register_opened_tab(window, tab_id, TabInit::default(), None) {
                warn!(%tab_id, error = %e, "fallback tab not tracked");
            }
        }
    }

    fn register_opened_tab(
        &mut self,
        window: WindowId,
        tab_id: TabId,
        init: TabInit,
        index: Option<usize>,
    ) -> Result<(), TabError> {
        self.tabs.add_tab(window, tab_id, init, index)?;
        self.request_save(false);
        Ok(())
    }

    // --- Closed tabs ---

    fn closed_window(&self, window: WindowId) -> Result<&TrackedWindow, UndoError> {
        self.tabs
            .get_window(window)
            .ok_or(UndoError::UnknownWindow(window))
    }

    pub fn closed_tab_count(&self, window: WindowId) -> Result<usize, UndoError> {
        Ok(self.closed_window(window)?.closed.len())
    }

    pub fn closed_tabs(&self, window: WindowId) -> Result<Vec<ClosedTabSummary>, UndoError> {
        Ok(self
            .closed_window(window)?
            .closed
            .entries()
            .iter()
            .filter_map(ClosedTabSummary::from_snapshot)
            .collect())
    }

    /// Reopens the closed tab at `index` (0 is the most recent) at the
    /// position the last closed tab had, and restores its state.
    pub fn undo_close_tab(&mut self, window: WindowId, index: usize) -> Result<TabId, UndoError> {
        let mut snapshot = self
            .closed_window(window)?
            .closed
            .entries()
            .get(index)
            .cloned()
            .ok_or(UndoError::NoSuchEntry(index))?;
        let url = snapshot
            .active_entry()
            .map(|e| e.url.clone())
            .ok_or(UndoError::EmptySnapshot(snapshot.tab_id))?;

        let request = OpenTabRequest {
            url,
            title: None,
            selected: true,
            delay_load: false,
            index: self.last_closed_index,
            is_private: snapshot.is_private,
            desktop_mode: snapshot.desktop_mode,
            parent_id: snapshot.parent_id,
        };
        let position = self.last_closed_index;
        let new_id = self
            .host
            .open_tab(window, request)
            .ok_or_else(|| UndoError::HostRefused(format!("undo of closed tab {}", index)))?;

        if let Some(win) = self.tabs.get_window_mut(window) {
            win.closed.undo(index);
        }
        let init = TabInit {
            is_private: snapshot.is_private,
            parent_id: snapshot.parent_id,
            desktop_mode: snapshot.desktop_mode,
            pending: false,
        };
        self.tabs
            .add_tab(window, new_id, init, position)
            .map_err(|e| UndoError::HostRefused(e.to_string()))?;
        snapshot.tab_id = new_id;
        if let Some(tab) = self.tabs.get_tab_mut(new_id) {
            if let Err(e) = restore::begin_restore(new_id, tab, snapshot, self.content.as_ref()) {
                error!(tab_id = %new_id, error = %e, "undo restore skipped");
            }
        }
        let _ = self.tabs.select_tab(new_id);
        self.last_closed_index = None;

        self.send_closed_tabs(window);
        self.request_save(false);
        info!(tab_id = %new_id, "closed tab reopened");
        Ok(new_id)
    }

    /// Opens each snapshot in a new tab. The last one is selected and
    /// restored; the others are delay-loaded. Reopened tabs leave the ring.
    pub fn restore_tabs(
        &mut self,
        window: WindowId,
        snapshots: Vec<TabSnapshot>,
    ) -> Result<Vec<TabId>, UndoError> {
        self.closed_window(window)?;
        let count = snapshots.len();
        let mut reopened_ids = Vec::new();
        let mut opened = Vec::new();

        for (i, mut snapshot) in snapshots.into_iter().enumerate() {
            let Some(entry) = snapshot.active_entry() else {
                warn!(tab_id = %snapshot.tab_id, "closed tab without active entry, skipping");
                continue;
            };
            let selected = i + 1 == count;
            let request = OpenTabRequest {
                url: entry.url.clone(),
                title: entry.title.clone(),
                selected,
                delay_load: !selected,
                index: None,
                is_private: snapshot.is_private,
                desktop_mode: snapshot.desktop_mode,
                parent_id: snapshot.parent_id,
            };
            if snapshot.tab_id.is_valid() {
                reopened_ids.push(snapshot.tab_id);
            }
            let Some(new_id) = self.host.open_tab(window, request) else {
                warn!("host refused to reopen tab");
                continue;
            };
            let init = TabInit {
                is_private: snapshot.is_private,
                parent_id: snapshot.parent_id,
                desktop_mode: snapshot.desktop_mode,
                pending: !selected,
            };
            if let Err(e) = self.tabs.add_tab(window, new_id, init, None) {
                warn!(tab_id = %new_id, error = %e, "reopened tab not tracked");
                continue;
            }
            snapshot.tab_id = new_id;
            if let Some(tab) = self.tabs.get_tab_mut(new_id) {
                if selected {
                    if let Err(e) =
                        restore::begin_restore(new_id, tab, snapshot, self.content.as_ref())
                    {
                        error!(tab_id = %new_id, error = %e, "tab restore skipped");
                    }
                } else {
                    tab.ext_data = snapshot.ext_data.clone();
                    tab.snapshot = Some(snapshot);
                }
            }
            if selected {
                let _ = self.tabs.select_tab(new_id);
            }
            opened.push(new_id);
        }

        self.remove_closed_tabs(window, &reopened_ids);
        if !opened.is_empty() {
            self.request_save(false);
        }
        Ok(opened)
    }

    /// Opens plain URLs; the last one is selected.
    pub fn open_tabs(&mut self, window: WindowId, urls: &[String]) -> Result<Vec<TabId>, UndoError> {
        self.closed_window(window)?;
        let mut opened = Vec::new();
        for (i, url) in urls.iter().enumerate() {
            let selected = i + 1 == urls.len();
            let request = OpenTabRequest {
                url: url.clone(),
                title: None,
                selected,
                delay_load: !selected,
                index: None,
                is_private: false,
                desktop_mode: false,
                parent_id: None,
            };
            let Some(tab_id) = self.host.open_tab(window, request) else {
                continue;
            };
            if let Err(e) = self.tabs.add_tab(window, tab_id, TabInit::default(), None) {
                warn!(%tab_id, error = %e, "opened tab not tracked");
                continue;
            }
            if selected {
                let _ = self.tabs.select_tab(tab_id);
            }
            opened.push(tab_id);
        }
        if !opened.is_empty() {
            self.request_save(false);
        }
        Ok(opened)
    }

    fn remove_closed_tabs(&mut self, window: WindowId, ids: &[TabId]) {
        if ids.is_empty() {
            return;
        }
        let removed = self
            .tabs
            .get_window_mut(window)
            .map(|w| w.closed.remove_by_ids(ids))
            .unwrap_or(0);
        if removed > 0 {
            self.send_closed_tabs(window);
        }
    }

    pub fn set_closed_tab_notifications(&mut self, enabled: bool) {
        self.notify_closed_tabs = enabled;
        if enabled {
            if let Some(window) = self.tabs.most_recent_window() {
                self.send_closed_tabs(window);
            }
        }
    }

    /// Sends the closed tabs whose privacy matches the selected tab's.
    fn send_closed_tabs(&self, window: WindowId) {
        if !self.notify_closed_tabs || self.load_state.is_quitting() {
            return;
        }
        let Some(win) = self.tabs.get_window(window) else {
            return;
        };
        let is_private = win
            .selected
            .and_then(|id| self.tabs.get_tab(id))
            .is_some_and(|t| t.is_private);
        let tabs = win.closed.summaries(is_private);
        debug!(%window, count = tabs.len(), "sending closed tabs");
        self.host.notify(Notification::ClosedTabs { window, tabs });
    }
}
