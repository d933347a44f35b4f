//! External pack tooling behind narrow capabilities
//!
//! Listing and extraction are separate traits so callers that only probe never
//! need an extractor. Packing translated text back is not part of this crate.

pub mod process;
pub mod rpfm;
pub mod tsv;

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::task_control::TaskControl;
use crate::error::ApiResult;

pub use rpfm::RpfmCli;
pub use tsv::TsvLocParser;

/// File suffix of localization tables inside a pack
pub const LOC_FILE_SUFFIX: &str = ".loc";

/// True for pack entry paths holding localization tables
pub fn is_localization_entry(entry_path: &str) -> bool {
    entry_path
        .trim_end()
        .to_ascii_lowercase()
        .ends_with(LOC_FILE_SUFFIX)
}

/// Lists entries inside a pack without extracting anything
#[async_trait]
pub trait ArchiveInspector: Send + Sync {
    async fn list_contents(
        &self,
        game_code: &str,
        archive_path: &Path,
        task: &TaskControl,
    ) -> ApiResult<Vec<String>>;

    /// Checked once per probe batch
    async fn is_available(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLocFiles {
    pub extracted_files: Vec<PathBuf>,
    pub output_directory: PathBuf,
}

/// Extracts every localization table of a pack as TSV under `output_dir`.
/// The caller owns and deletes `output_directory`.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn extract_tabular(
        &self,
        game_code: &str,
        archive_path: &Path,
        output_dir: &Path,
        task: &TaskControl,
    ) -> ApiResult<ExtractedLocFiles>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocEntry {
    pub key: String,
    pub value: String,
}

pub trait TabularParser: Send + Sync {
    fn parse(&self, file_path: &Path) -> ApiResult<Vec<LocEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localization_predicate() {
        assert!(is_localization_entry("text/db/units.loc"));
        assert!(is_localization_entry("TEXT/DB/UNITS.LOC"));
        assert!(is_localization_entry("text/db/units.loc\r"));
        assert!(!is_localization_entry("db/units_tables/data"));
        assert!(!is_localization_entry("text/db/units.loc.tsv"));
        assert!(!is_localization_entry("ui/local.png"));
    }
}
