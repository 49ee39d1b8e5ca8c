use serde::{Deserialize, Serialize};

/// Top-level session store settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    #[serde(default)]
    pub saving: SavingSettings,
    #[serde(default)]
    pub undo: UndoSettings,
    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Timing of disk writes, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SavingSettings {
    /// Minimum time between two disk writes.
    pub interval_ms: u64,
    /// Shortest debounce applied to a normal save request.
    pub min_delay_ms: u64,
    /// Debounce for saves that only touch private tabs.
    pub private_delay_ms: u64,
    /// How often the last good session file is copied to the backup.
    pub backup_interval_ms: u64,
}

impl Default for SavingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            min_delay_ms: 2_000,
            private_delay_ms: 500,
            backup_interval_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UndoSettings {
    /// Capacity of each window's closed-tab ring. Zero disables undo.
    pub max_tabs: usize,
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self { max_tabs: 5 }
    }
}

/// Which recorded form data may be persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    #[default]
    Full,
    UnencryptedOnly,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrivacySettings {
    pub level: PrivacyLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub debug: bool,
}
