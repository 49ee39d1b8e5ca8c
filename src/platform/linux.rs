// Linux follows the XDG base directory layout.

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    match env::var_os(var).filter(|v| !v.is_empty()) {
        Some(base) => PathBuf::from(base).join(APP_DIR_NAME),
        None => {
            let home = env::var("HOME").unwrap_or_else(|_| String::from("/tmp"));
            fallback
                .iter()
                .fold(PathBuf::from(home), |p, part| p.join(part))
                .join(APP_DIR_NAME)
        }
    }
}

pub fn get_config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
}

pub fn get_data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}
