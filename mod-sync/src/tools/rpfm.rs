//! RPFM command line wrapper
//!
//! Listing needs only the executable; extraction also needs the game schema so that
//! tables come out as TSV.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use super::process::run_tool;
use super::{ArchiveExtractor, ArchiveInspector, ExtractedLocFiles};
use crate::config::{SyncConfig, TimeoutPolicy};
use crate::core::task_control::TaskControl;
use crate::error::{ApiError, ApiResult};
use crate::logger;

/// Game code used by this application -> game key understood by RPFM
const GAME_KEYS: &[(&str, &str)] = &[
    ("wh3", "warhammer_3"),
    ("wh2", "warhammer_2"),
    ("wh", "warhammer"),
    ("troy", "troy"),
    ("3k", "three_kingdoms"),
    ("pharaoh", "pharaoh"),
    ("pharaoh_dynasties", "pharaoh_dynasties"),
    ("thrones", "thrones_of_britannia"),
    ("attila", "attila"),
    ("rome2", "rome_2"),
    ("shogun2", "shogun_2"),
];

pub fn rpfm_game_key(game_code: &str) -> Option<&'static str> {
    let code = game_code.trim().to_ascii_lowercase();
    GAME_KEYS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, key)| *key)
}

fn is_tsv_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false)
}

/// Every `.tsv` file under `dir`, sorted by path
fn collect_tsv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_tsv_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub struct RpfmCli {
    executable: Option<PathBuf>,
    schema_dir: Option<PathBuf>,
    list_timeout: Duration,
    extraction_timeout: TimeoutPolicy,
}

impl RpfmCli {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            executable: config.rpfm_cli_path.clone(),
            schema_dir: config.schema_dir.clone(),
            list_timeout: config.list_timeout(),
            extraction_timeout: config.extraction_timeout.clone(),
        }
    }

    fn executable(&self) -> ApiResult<&Path> {
        self.executable
            .as_deref()
            .ok_or_else(|| ApiError::tool_unavailable("RPFM CLI path is not configured"))
    }

    fn game_key(game_code: &str) -> ApiResult<&'static str> {
        rpfm_game_key(game_code).ok_or_else(|| {
            ApiError::validation(format!("Game '{}' is not supported by RPFM", game_code))
        })
    }

    fn schema_path(&self, game_key: &str) -> ApiResult<PathBuf> {
        let dir = self
            .schema_dir
            .as_ref()
            .ok_or_else(|| ApiError::validation("RPFM schema directory is not configured"))?;
        let path = dir.join(format!("schema_{}.ron", game_key));
        if !path.is_file() {
            return Err(ApiError::with_details(
                crate::error::ApiErrorCode::ValidationFailed,
                format!("Missing RPFM schema for {}", game_key),
                path.display().to_string(),
            ));
        }
        Ok(path)
    }

    fn list_args(game_key: &str, archive_path: &Path) -> Vec<OsString> {
        vec![
            "--game".into(),
            game_key.into(),
            "pack".into(),
            "list".into(),
            "--pack-path".into(),
            archive_path.as_os_str().to_owned(),
        ]
    }

    fn extract_args(
        game_key: &str,
        archive_path: &Path,
        schema_path: &Path,
        output_dir: &Path,
    ) -> Vec<OsString> {
        let mut folder_arg = OsString::from("text;");
        folder_arg.push(output_dir.as_os_str());
        vec![
            "--game".into(),
            game_key.into(),
            "pack".into(),
            "extract".into(),
            "--pack-path".into(),
            archive_path.as_os_str().to_owned(),
            "--tables-as-tsv".into(),
            schema_path.as_os_str().to_owned(),
            "--folder-path".into(),
            folder_arg,
        ]
    }
}

#[async_trait]
impl ArchiveInspector for RpfmCli {
    async fn list_contents(
        &self,
        game_code: &str,
        archive_path: &Path,
        task: &TaskControl,
    ) -> ApiResult<Vec<String>> {
        let executable = self.executable()?;
        let game_key = Self::game_key(game_code)?;

        let output = run_tool(
            executable,
            &Self::list_args(game_key, archive_path),
            self.list_timeout,
            task,
        )
        .await
        .map_err(|e| {
            let err = ApiError::from(e);
            ApiError::new(
                err.code,
                format!("Listing {} failed: {}", archive_path.display(), err.message),
            )
        })?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn is_available(&self) -> bool {
        let Some(path) = self.executable.as_deref() else {
            return false;
        };
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => {
                logger::log_warn(
                    &format!("RPFM CLI not found at {}", path.display()),
                    Some("rpfm"),
                );
                false
            }
        }
    }
}

#[async_trait]
impl ArchiveExtractor for RpfmCli {
    async fn extract_tabular(
        &self,
        game_code: &str,
        archive_path: &Path,
        output_dir: &Path,
        task: &TaskControl,
    ) -> ApiResult<ExtractedLocFiles> {
        task.ensure_not_cancelled("Extraction")?;
        let executable = self.executable()?;
        let game_key = Self::game_key(game_code)?;
        let schema_path = self.schema_path(game_key)?;

        let size = tokio::fs::metadata(archive_path)
            .await
            .map_err(|e| {
                ApiError::not_found(format!(
                    "Pack file {} is not readable: {}",
                    archive_path.display(),
                    e
                ))
            })?
            .len();
        let timeout = self.extraction_timeout.for_size(size);

        tokio::fs::create_dir_all(output_dir).await?;

        crate::log_debug!(
            &format!(
                "Extracting {} ({} bytes, timeout {:?})",
                archive_path.display(),
                size,
                timeout
            ),
            "rpfm"
        );

        run_tool(
            executable,
            &Self::extract_args(game_key, archive_path, &schema_path, output_dir),
            timeout,
            task,
        )
        .await
        .map_err(|e| {
            let err = ApiError::from(e);
            ApiError::new(
                err.code,
                format!("Extracting {} failed: {}", archive_path.display(), err.message),
            )
        })?;

        let dir = output_dir.to_path_buf();
        let extracted_files = tokio::task::spawn_blocking(move || collect_tsv_files(&dir))
            .await
            .map_err(|e| ApiError::internal(format!("Extraction listing task failed: {}", e)))?;

        Ok(ExtractedLocFiles {
            extracted_files,
            output_directory: output_dir.to_path_buf(),
        })
    }
}
