use std::collections::{BTreeMap, HashMap};

use crate::managers::closed_tabs::ClosedTabRing;
use crate::types::errors::TabError;
use crate::types::events::TabInit;
use crate::types::restore::RestoreState;
use crate::types::session::{SessionAggregate, WindowId, WindowState};
use crate::types::tab::{TabId, TabSnapshot};

/// Trait defining the live tab tracking interface.
pub trait TabManagerTrait {
    fn open_window(&mut self) -> WindowId;
    fn close_window(&mut self, window: WindowId) -> Option<TrackedWindow>;
    fn add_tab(
        &mut self,
        window: WindowId,
        tab_id: TabId,
        init: TabInit,
        index: Option<usize>,
    ) -> Result<(), TabError>;
    fn remove_tab(&mut self, tab_id: TabId) -> Result<RemovedTab, TabError>;
    fn select_tab(&mut self, tab_id: TabId) -> Result<WindowId, TabError>;
    fn move_tab(&mut self, tab_id: TabId, new_index: usize) -> Result<WindowId, TabError>;
    fn get_tab(&self, tab_id: TabId) -> Option<&TrackedTab>;
    fn get_tab_mut(&mut self, tab_id: TabId) -> Option<&mut TrackedTab>;
    fn get_window(&self, window: WindowId) -> Option<&TrackedWindow>;
    fn get_window_mut(&mut self, window: WindowId) -> Option<&mut TrackedWindow>;
    fn collect(&self) -> SessionAggregate;
}

/// Engine-side state of one live tab. The host keeps only the id.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTab {
    pub window: WindowId,
    pub is_private: bool,
    pub parent_id: Option<TabId>,
    pub desktop_mode: bool,
    /// `None` until the first successful history capture (or restore).
    pub snapshot: Option<TabSnapshot>,
    /// Persisted annotations set through the tab value API.
    pub ext_data: BTreeMap<String, String>,
    pub restore: RestoreState,
    /// Foreground tab whose restore reload has not been observed yet.
    pub reload_pending: bool,
}

impl TrackedTab {
    fn new(window: WindowId, init: TabInit) -> Self {
        Self {
            window,
            is_private: init.is_private,
            parent_id: init.parent_id,
            desktop_mode: init.desktop_mode,
            snapshot: None,
            ext_data: BTreeMap::new(),
            restore: if init.pending {
                RestoreState::PendingFull
            } else {
                RestoreState::Done
            },
            reload_pending: false,
        }
    }

    /// The snapshot as it should be persisted, with the current annotations.
    pub fn persisted(&self) -> Option<TabSnapshot> {
        self.snapshot.as_ref().map(|snap| {
            let mut snap = snap.clone();
            snap.ext_data = self.ext_data.clone();
            snap
        })
    }
}

/// Engine-side state of one tracked window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedWindow {
    /// Live tabs in tab-strip order.
    pub tabs: Vec<TabId>,
    pub selected: Option<TabId>,
    pub closed: ClosedTabRing,
}

/// A tab taken out of tracking, with its position at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedTab {
    pub tab: TrackedTab,
    pub index: usize,
}

/// Arena of live tabs keyed by host tab id, plus per-window ordering.
#[derive(Debug, Clone)]
pub struct TabManager {
    tabs: HashMap<TabId, TrackedTab>,
    windows: BTreeMap<WindowId, TrackedWindow>,
    next_window: u64,
    undo_capacity: usize,
}

impl TabManager {
    pub fn new(undo_capacity: usize) -> Self {
        Self {
            tabs: HashMap::new(),
            windows: BTreeMap::new(),
            next_window: 1,
            undo_capacity,
        }
    }

    pub fn undo_capacity(&self) -> usize {
        self.undo_capacity
    }

    /// Applies a new ring capacity to every window.
    pub fn set_undo_capacity(&mut self, capacity: usize) {
        self.undo_capacity = capacity;
        for window in self.windows.values_mut() {
            window.closed.set_capacity(capacity);
        }
    }

    pub fn forget_closed_tabs(&mut self) {
        for window in self.windows.values_mut() {
            window.closed.clear();
        }
    }

    /// Drops private entries from every ring. Returns how many were removed.
    pub fn purge_private_closed(&mut self) -> usize {
        self.windows
            .values_mut()
            .map(|w| w.closed.purge_private())
            .sum()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    /// The most recently opened window still tracked.
    pub fn most_recent_window(&self) -> Option<WindowId> {
        self.windows.keys().next_back().copied()
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.keys().copied().collect()
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn tabs_mut(&mut self) -> impl Iterator<Item = &mut TrackedTab> {
        self.tabs.values_mut()
    }

    pub fn window_for_tab(&self, tab_id: TabId) -> Result<WindowId, TabError> {
        self.tabs
            .get(&tab_id)
            .map(|t| t.window)
            .ok_or(TabError::NotFound(tab_id))
    }
}

impl TabManagerTrait for TabManager {
    fn open_window(&mut self) -> WindowId {
        let id = WindowId(self.next_window);
        self.next_window += 1;
        self.windows.insert(
            id,
            TrackedWindow {
                closed: ClosedTabRing::new(self.undo_capacity),
                ..TrackedWindow::default()
            },
        );
        id
    }

    /// Stops tracking a window and every tab in it.
    fn close_window(&mut self, window: WindowId) -> Option<TrackedWindow> {
        let removed = self.windows.remove(&window)?;
        self.tabs.retain(|_, tab| tab.window != window);
        Some(removed)
    }

    fn add_tab(
        &mut self,
        window: WindowId,
        tab_id: TabId,
        init: TabInit,
        index: Option<usize>,
    ) -> Result<(), TabError> {
        if self.tabs.contains_key(&tab_id) {
            return Err(TabError::AlreadyExists(tab_id));
        }
        let win = self
            .windows
            .get_mut(&window)
            .ok_or(TabError::UnknownWindow(window))?;
        let position = index.unwrap_or(win.tabs.len()).min(win.tabs.len());
        win.tabs.insert(position, tab_id);
        self.tabs.insert(tab_id, TrackedTab::new(window, init));
        Ok(())
    }

    fn remove_tab(&mut self, tab_id: TabId) -> Result<RemovedTab, TabError> {
        let tab = self.tabs.remove(&tab_id).ok_or(TabError::NotFound(tab_id))?;
        let mut index = 0;
        if let Some(win) = self.windows.get_mut(&tab.window) {
            if let Some(pos) = win.tabs.iter().position(|id| *id == tab_id) {
                win.tabs.remove(pos);
                index = pos;
            }
            if win.selected == Some(tab_id) {
                win.selected = None;
            }
        }
        Ok(RemovedTab { tab, index })
    }

    fn select_tab(&mut self, tab_id: TabId) -> Result<WindowId, TabError> {
        let window = self.window_for_tab(tab_id)?;
        let win = self
            .windows
            .get_mut(&window)
            .ok_or(TabError::UnknownWindow(window))?;
        win.selected = Some(tab_id);
        Ok(window)
    }

    /// Moves a tab within its window; out-of-range positions clamp to the end.
    fn move_tab(&mut self, tab_id: TabId, new_index: usize) -> Result<WindowId, TabError> {
        let window = self.window_for_tab(tab_id)?;
        let win = self
            .windows
            .get_mut(&window)
            .ok_or(TabError::UnknownWindow(window))?;
        if let Some(pos) = win.tabs.iter().position(|id| *id == tab_id) {
            let id = win.tabs.remove(pos);
            let target = new_index.min(win.tabs.len());
            win.tabs.insert(target, id);
        }
        Ok(window)
    }

    fn get_tab(&self, tab_id: TabId) -> Option<&TrackedTab> {
        self.tabs.get(&tab_id)
    }

    fn get_tab_mut(&mut self, tab_id: TabId) -> Option<&mut TrackedTab> {
        self.tabs.get_mut(&tab_id)
    }

    fn get_window(&self, window: WindowId) -> Option<&TrackedWindow> {
        self.windows.get(&window)
    }

    fn get_window_mut(&mut self, window: WindowId) -> Option<&mut TrackedWindow> {
        self.windows.get_mut(&window)
    }

    /// Projects the live state into a fresh aggregate. Tabs that have never
    /// been captured are left out.
    fn collect(&self) -> SessionAggregate {
        let windows = self
            .windows
            .iter()
            .map(|(id, win)| {
                let tabs = win
                    .tabs
                    .iter()
                    .filter_map(|tab_id| self.tabs.get(tab_id))
                    .filter_map(TrackedTab::persisted)
                    .collect();
                let state = WindowState {
                    tabs,
                    selected_tab_id: win.selected,
                    closed_tabs: win.closed.entries().to_vec(),
                };
                (*id, state)
            })
            .collect();
        SessionAggregate { windows }
    }
}

impl Default for TabManager {
    fn default() -> Self {
        Self::new(5)
    }
}
