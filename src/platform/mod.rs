// Platform directories for the session store.
//
// `cfg(target_os)` picks the implementation at compile time.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Directory name used below every platform root.
pub const APP_DIR_NAME: &str = "tabstore";

/// Where `settings.json` lives.
///
/// - **Linux**: `$XDG_CONFIG_HOME/tabstore` or `~/.config/tabstore`
/// - **macOS**: `~/Library/Preferences/tabstore`
/// - **Windows**: `%APPDATA%/tabstore/config`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Where the session files live unless `TABSTORE_DATA_DIR` overrides it.
///
/// - **Linux**: `$XDG_DATA_HOME/tabstore` or `~/.local/share/tabstore`
/// - **macOS**: `~/Library/Application Support/tabstore`
/// - **Windows**: `%LOCALAPPDATA%/tabstore`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}
