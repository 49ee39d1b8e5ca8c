//! Durable session files.
//!
//! The current session lives in `sessionstore.json`. Every write goes to a
//! temporary sibling first and is renamed over the target, so a reader sees
//! either the previous complete file or the new complete file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, warn};

use crate::platform;
use crate::services::session_writer::WriteJob;
use crate::types::errors::StorageError;

pub const SESSION_FILE: &str = "sessionstore.json";
pub const BACKUP_FILE: &str = "sessionstore.bak";
pub const PREVIOUS_FILE: &str = "sessionstore.old";
pub const TEMP_FILE: &str = "sessionstore.json.tmp";

/// Environment variable that overrides the session directory.
pub const DATA_DIR_ENV: &str = "TABSTORE_DATA_DIR";

/// Which of the session files to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFileKind {
    /// The file the latest save cycle wrote.
    Current,
    /// Periodic copy of the last known-good current file.
    Backup,
    /// The session of the previous run, set aside by the host at startup.
    Previous,
}

/// Durable storage for the normal partition.
///
/// Implementations are shared with the blocking pool that performs writes,
/// hence the `Send + Sync` bound.
pub trait SessionStorage: Send + Sync {
    fn exists(&self) -> bool;
    fn read(&self, kind: SessionFileKind) -> Result<String, StorageError>;
    /// Replaces the current file atomically.
    fn write_atomic(&self, job: &WriteJob) -> Result<(), StorageError>;
    /// Copies the current file to the backup.
    fn backup(&self) -> Result<(), StorageError>;
    /// Removes every session file, including the previous-session file.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Paths of every file the store manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub current: PathBuf,
    pub backup: PathBuf,
    pub previous: PathBuf,
    pub temp: PathBuf,
}

impl SessionFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            current: dir.join(SESSION_FILE),
            backup: dir.join(BACKUP_FILE),
            previous: dir.join(PREVIOUS_FILE),
            temp: dir.join(TEMP_FILE),
        }
    }

    /// `$TABSTORE_DATA_DIR` when set, otherwise the platform data directory.
    pub fn default_location() -> Self {
        let dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(platform::get_data_dir);
        Self::in_dir(&dir)
    }

    pub fn path(&self, kind: SessionFileKind) -> &Path {
        match kind {
            SessionFileKind::Current => &self.current,
            SessionFileKind::Backup => &self.backup,
            SessionFileKind::Previous => &self.previous,
        }
    }
}

/// Session storage on the local file system.
pub struct FileStorage {
    files: SessionFiles,
    /// Generation of the newest job committed so far. A job started before it
    /// must not replace its result.
    committed: Mutex<Option<u64>>,
}

impl FileStorage {
    pub fn new(files: SessionFiles) -> Self {
        Self {
            files,
            committed: Mutex::new(None),
        }
    }

    pub fn files(&self) -> &SessionFiles {
        &self.files
    }

    fn ensure_parent(path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn write_temp(&self, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = fs::File::create(&self.files.temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    fn remove_if_present(path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStorage for FileStorage {
    fn exists(&self) -> bool {
        self.files.current.exists()
    }

    fn read(&self, kind: SessionFileKind) -> Result<String, StorageError> {
        let path = self.files.path(kind);
        match fs::read_to_string(path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, job: &WriteJob) -> Result<(), StorageError> {
        let mut committed = self
            .committed
            .lock()
            .map_err(|_| StorageError::Io("session storage lock poisoned".to_string()))?;
        if let Some(last) = *committed {
            if job.ticket.generation < last {
                warn!(
                    generation = job.ticket.generation,
                    committed = last,
                    "dropping session write older than the file on disk"
                );
                return Ok(());
            }
        }

        Self::ensure_parent(&self.files.current)?;
        let result = self
            .write_temp(&job.bytes)
            .and_then(|()| fs::rename(&self.files.temp, &self.files.current).map_err(Into::into));
        if let Err(e) = result {
            let _ = fs::remove_file(&self.files.temp);
            return Err(e);
        }

        *committed = Some(job.ticket.generation);
        debug!(
            path = %self.files.current.display(),
            bytes = job.bytes.len(),
            "session file written"
        );
        Ok(())
    }

    fn backup(&self) -> Result<(), StorageError> {
        Self::ensure_parent(&self.files.backup)?;
        fs::copy(&self.files.current, &self.files.backup)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        for path in [
            &self.files.current,
            &self.files.backup,
            &self.files.previous,
            &self.files.temp,
        ] {
            Self::remove_if_present(path)?;
        }
        Ok(())
    }
}
