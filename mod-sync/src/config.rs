//! Engine configuration
//!
//! Read from `sync_config.json` in the app data directory; every field has a default
//! and a few can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::app_dirs;
use crate::error::{ApiError, ApiResult};
use crate::logger;

pub const DEFAULT_STEAM_API_URL: &str =
    "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/";

const ENV_RPFM_PATH: &str = "TWMT_RPFM_PATH";
const ENV_SCHEMA_DIR: &str = "TWMT_SCHEMA_DIR";
const ENV_DATABASE_PATH: &str = "TWMT_DATABASE_PATH";
const ENV_STEAM_API_URL: &str = "TWMT_STEAM_API_URL";

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Extraction time allowance, growing with pack size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutPolicy {
    pub base_secs: u64,
    pub secs_per_mb: u64,
    pub max_secs: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base_secs: 60,
            secs_per_mb: 2,
            max_secs: 1800,
        }
    }
}

impl TimeoutPolicy {
    pub fn for_size(&self, size_bytes: u64) -> Duration {
        let size_mib = size_bytes.div_ceil(BYTES_PER_MIB);
        let secs = self
            .base_secs
            .saturating_add(self.secs_per_mb.saturating_mul(size_mib))
            .min(self.max_secs.max(self.base_secs));
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Path to the `rpfm_cli` executable
    pub rpfm_cli_path: Option<PathBuf>,
    /// Directory holding the per-game `schema_*.ron` files
    pub schema_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub extraction_temp_dir: Option<PathBuf>,
    pub extraction_timeout: TimeoutPolicy,
    pub list_timeout_secs: u64,
    pub steam_api_url: String,
    pub remote_fetch_timeout_secs: u64,
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpfm_cli_path: None,
            schema_dir: None,
            database_path: None,
            extraction_temp_dir: None,
            extraction_timeout: TimeoutPolicy::default(),
            list_timeout_secs: 60,
            steam_api_url: DEFAULT_STEAM_API_URL.to_string(),
            remote_fetch_timeout_secs: 15,
            log_level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> ApiResult<Self> {
        let mut config = Self::load_from(&app_dirs::get_config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Missing file yields defaults; unreadable or malformed file is an error
    pub fn load_from(path: &Path) -> ApiResult<Self> {
        if !path.exists() {
            logger::log_debug(
                &format!("No config at {}, using defaults", path.display()),
                Some("config"),
                None,
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::with_details(
                crate::error::ApiErrorCode::ValidationFailed,
                format!("Failed to read config: {}", e),
                path.display().to_string(),
            )
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ApiError::with_details(
                crate::error::ApiErrorCode::ValidationFailed,
                format!("Malformed config: {}", e),
                path.display().to_string(),
            )
        })
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = std::env::var_os(ENV_RPFM_PATH) {
            self.rpfm_cli_path = Some(PathBuf::from(value));
        }
        if let Some(value) = std::env::var_os(ENV_SCHEMA_DIR) {
            self.schema_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = std::env::var_os(ENV_DATABASE_PATH) {
            self.database_path = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var(ENV_STEAM_API_URL) {
            if !value.trim().is_empty() {
                self.steam_api_url = value;
            }
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(app_dirs::get_database_path)
    }

    pub fn extraction_temp_dir(&self) -> PathBuf {
        self.extraction_temp_dir
            .clone()
            .unwrap_or_else(app_dirs::get_extraction_temp_dir)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs.max(1))
    }

    pub fn remote_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_fetch_timeout_secs.max(1))
    }
}
