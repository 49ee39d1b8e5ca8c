use thiserror::Error;

use super::session::WindowId;
use super::tab::TabId;

// === TabError ===

/// Errors related to tracking live tabs.
#[derive(Debug, Error)]
pub enum TabError {
    /// Tab with the given ID is not tracked.
    #[error("Tab not found: {0}")]
    NotFound(TabId),
    /// A tab with the given ID is already tracked.
    #[error("Tab already exists: {0}")]
    AlreadyExists(TabId),
    /// The window is not tracked by the session store.
    #[error("Unknown window: {0}")]
    UnknownWindow(WindowId),
}

// === StorageError ===

/// Errors raised by the durable session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred while reading or writing a session file.
    #[error("Session storage I/O error: {0}")]
    Io(String),
    /// The requested session file does not exist.
    #[error("Session file not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

// === WriteError ===

/// Errors that abort a save cycle.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The session could not be serialized; nothing was written.
    #[error("Session serialization error: {0}")]
    Serialization(String),
    /// The atomic write failed; the previous file is untouched.
    #[error("Session write failed: {0}")]
    Storage(#[from] StorageError),
}

// === RestoreError ===

/// Errors related to restoring a serialized session.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The session text is not valid session JSON.
    #[error("Invalid session JSON: {0}")]
    InvalidJson(String),
    /// The session contains no windows.
    #[error("Invalid session: no windows")]
    NoWindows,
    /// The first window of the session contains no tabs.
    #[error("Invalid session: first window has no tabs")]
    NoTabs,
    /// There is no tracked window to restore into.
    #[error("No window available to restore into")]
    NoTargetWindow,
    /// A tab was asked to restore a snapshot without history entries.
    #[error("Cannot restore tab {0}: snapshot has no history entries")]
    EmptyTab(TabId),
    /// A tab snapshot points past its own history.
    #[error("Cannot restore tab {tab}: index {index} outside {len} history entries")]
    InvalidIndex { tab: TabId, index: usize, len: usize },
    /// No session file could be read.
    #[error("No session available: {0}")]
    Unavailable(String),
}

// === UndoError ===

/// Errors related to the closed-tab undo list.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The window is not tracked by the session store.
    #[error("Invalid argument: window {0} is not tracked")]
    UnknownWindow(WindowId),
    /// No closed tab at the given position.
    #[error("No closed tab at index {0}")]
    NoSuchEntry(usize),
    /// The closed tab has no history to reopen.
    #[error("Closed tab {0} has no history")]
    EmptySnapshot(TabId),
    /// The host refused to open the tab.
    #[error("Host could not open tab: {0}")]
    HostRefused(String),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
