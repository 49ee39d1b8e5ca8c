//! Crash recovery.
//!
//! Picks the session to restore at startup. The current file is preferred;
//! when it is missing or unusable (a crash during the very first write, a
//! truncated copy from a full disk) the backup and then the previous-session
//! file are tried.

use tracing::{info, warn};

use crate::services::restore::parse_session;
use crate::services::session_files::{SessionFileKind, SessionStorage};
use crate::types::errors::RestoreError;

/// The session text that passed validation, and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredSession {
    pub text: String,
    pub source: SessionFileKind,
}

/// Trait defining crash recovery operations.
pub trait CrashRecoveryTrait {
    fn load_last_session(&self) -> Result<RecoveredSession, RestoreError>;
}

pub struct CrashRecovery<'a> {
    storage: &'a dyn SessionStorage,
}

const FALLBACK_ORDER: [SessionFileKind; 3] = [
    SessionFileKind::Current,
    SessionFileKind::Backup,
    SessionFileKind::Previous,
];

impl<'a> CrashRecovery<'a> {
    pub fn new(storage: &'a dyn SessionStorage) -> Self {
        Self { storage }
    }
}

impl CrashRecoveryTrait for CrashRecovery<'_> {
    fn load_last_session(&self) -> Result<RecoveredSession, RestoreError> {
        let mut failures = Vec::new();
        for kind in FALLBACK_ORDER {
            let text = match self.storage.read(kind) {
                Ok(text) => text,
                Err(e) => {
                    failures.push(format!("{:?}: {}", kind, e));
                    continue;
                }
            };
            match parse_session(&text) {
                Ok(_) => {
                    info!(source = ?kind, "recovered last session");
                    return Ok(RecoveredSession { text, source: kind });
                }
                Err(e) => {
                    warn!(source = ?kind, error = %e, "session file unusable");
                    failures.push(format!("{:?}: {}", kind, e));
                }
            }
        }
        Err(RestoreError::Unavailable(failures.join("; ")))
    }
}
