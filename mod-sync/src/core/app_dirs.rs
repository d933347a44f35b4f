//! Where the engine keeps its files
//!
//! Database, config and logs live under one per-user data folder. `TWMT_DATA_DIR`
//! moves the whole folder, which the CLI uses for portable installs.

use std::ffi::OsString;
use std::path::PathBuf;

/// Folder name shared with the desktop shell
const APP_IDENTIFIER: &str = "com.twmt.modsync";
const ENV_DATA_DIR: &str = "TWMT_DATA_DIR";

const DATABASE_FILE: &str = "twmt.db";
const CONFIG_FILE: &str = "sync_config.json";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value: &OsString| !value.is_empty())
        .map(PathBuf::from)
}

/// Per-user data folder:
/// - Windows: `%LOCALAPPDATA%\com.twmt.modsync`
/// - macOS: `~/Library/Application Support/com.twmt.modsync`
/// - other: `$XDG_DATA_HOME/com.twmt.modsync` or `~/.local/share/com.twmt.modsync`
pub fn get_app_data_dir() -> PathBuf {
    if let Some(dir) = env_path(ENV_DATA_DIR) {
        return dir;
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_IDENTIFIER)
}

pub fn get_logs_dir() -> PathBuf {
    get_app_data_dir().join("logs")
}

pub fn get_database_path() -> PathBuf {
    get_app_data_dir().join(DATABASE_FILE)
}

pub fn get_config_path() -> PathBuf {
    get_app_data_dir().join(CONFIG_FILE)
}

/// Scratch root for pack extractions; every analysis makes its own subfolder
pub fn get_extraction_temp_dir() -> PathBuf {
    std::env::temp_dir().join("twmt_extract")
}
