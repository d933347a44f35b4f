//! Workshop folder inventory
//!
//! Every immediate subdirectory named by a Workshop id is expected to hold one pack
//! file. Unreadable folders are skipped; the walk itself never fails.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use crate::error::{ApiError, ApiResult};
use crate::logger;
use crate::models::ModArchiveRecord;

static WORKSHOP_ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9]+$").ok());

const PACK_EXTENSION: &str = "pack";
const PREVIEW_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn is_workshop_id(name: &str) -> bool {
    WORKSHOP_ID_RE
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

/// File mtime truncated to whole seconds
pub fn last_modified_secs(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

/// Regular files of `dir`, sorted by file name
fn sorted_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// `<stem>.png` next to the pack, else the first image in the folder
fn find_preview_image(files: &[PathBuf], pack_stem: &str) -> Option<PathBuf> {
    let preferred = format!("{}.png", pack_stem);
    files
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(&preferred))
        })
        .or_else(|| {
            files
                .iter()
                .find(|path| has_extension(path, PREVIEW_EXTENSIONS))
        })
        .cloned()
}

fn inspect_mod_dir(workshop_id: &str, dir: &Path) -> Option<ModArchiveRecord> {
    let files = match sorted_files(dir) {
        Ok(files) => files,
        Err(e) => {
            crate::log_debug!(
                &format!("Skipping unreadable folder {}: {}", dir.display(), e),
                "inventory"
            );
            return None;
        }
    };

    let Some(archive_path) = files
        .iter()
        .find(|path| has_extension(path, &[PACK_EXTENSION]))
        .cloned()
    else {
        crate::log_debug!(
            &format!("No pack file in {}", dir.display()),
            "inventory"
        );
        return None;
    };

    let Some(last_modified) = last_modified_secs(&archive_path) else {
        crate::log_debug!(
            &format!("No modification time for {}", archive_path.display()),
            "inventory"
        );
        return None;
    };

    let archive_base_name = archive_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image_path = find_preview_image(&files, &archive_base_name);

    Some(ModArchiveRecord {
        workshop_id: workshop_id.to_string(),
        directory_path: dir.to_path_buf(),
        archive_path,
        archive_base_name,
        last_modified,
        image_path,
    })
}

/// Blocking walk of a Workshop content root
pub fn scan_workshop_root(root: &Path) -> Vec<ModArchiveRecord> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_warn(
                &format!("Cannot read Workshop folder {}: {}", root.display(), e),
                Some("inventory"),
            );
            return Vec::new();
        }
    };

    let mut records: Vec<ModArchiveRecord> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_workshop_id(&name) {
                return None;
            }
            inspect_mod_dir(&name, &entry.path())
        })
        .collect();

    records.sort_by(|a, b| {
        let numeric = |id: &str| id.parse::<u64>().unwrap_or(u64::MAX);
        numeric(&a.workshop_id)
            .cmp(&numeric(&b.workshop_id))
            .then_with(|| a.workshop_id.cmp(&b.workshop_id))
    });

    logger::log_info(
        &format!("Found {} mod packs under {}", records.len(), root.display()),
        Some("inventory"),
    );
    records
}

/// Runs the walk on the blocking pool
pub async fn scan_workshop_root_async(root: PathBuf) -> ApiResult<Vec<ModArchiveRecord>> {
    tokio::task::spawn_blocking(move || scan_workshop_root(&root))
        .await
        .map_err(|e| ApiError::internal(format!("Inventory task failed: {}", e)))
}

/// Record for one mod folder under `root`; `None` when the folder has no usable pack
pub async fn inspect_mod_folder_async(
    root: PathBuf,
    workshop_id: String,
) -> ApiResult<Option<ModArchiveRecord>> {
    if !is_workshop_id(&workshop_id) {
        return Ok(None);
    }
    tokio::task::spawn_blocking(move || inspect_mod_dir(&workshop_id, &root.join(&workshop_id)))
        .await
        .map_err(|e| ApiError::internal(format!("Inventory task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_workshop_id_pattern() {
        assert!(is_workshop_id("2789900000"));
        assert!(!is_workshop_id("27899a"));
        assert!(!is_workshop_id(""));
        assert!(!is_workshop_id("backup_123"));
        // Arabic-Indic digits are not Workshop ids
        assert!(!is_workshop_id("\u{0661}\u{0662}"));
    }

    #[test]
    fn test_non_ascii_digit_folders_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("\u{0661}\u{0662}").join("x.pack"));
        write(&root.path().join("12").join("y.pack"));

        let records = scan_workshop_root(root.path());
        let ids: Vec<_> = records.iter().map(|r| r.workshop_id.as_str()).collect();
        assert_eq!(ids, vec!["12"]);
    }

    #[test]
    fn test_scan_picks_first_pack_and_preview() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("200").join("zz_later.pack"));
        write(&root.path().join("200").join("aa_first.pack"));
        write(&root.path().join("200").join("aa_first.png"));
        write(&root.path().join("200").join("0_cover.jpg"));
        write(&root.path().join("13").join("solo.PACK"));
        write(&root.path().join("13").join("preview.jpg"));
        write(&root.path().join("14").join("notes.txt"));
        write(&root.path().join("not_a_mod").join("x.pack"));
        write(&root.path().join("999.pack"));

        let records = scan_workshop_root(root.path());
        let ids: Vec<_> = records.iter().map(|r| r.workshop_id.as_str()).collect();
        assert_eq!(ids, vec!["13", "200"]);

        let solo = &records[0];
        assert_eq!(solo.archive_base_name, "solo");
        assert!(solo.image_path.as_ref().unwrap().ends_with("preview.jpg"));
        assert!(solo.last_modified > 0);

        let multi = &records[1];
        assert!(multi.archive_path.ends_with("aa_first.pack"));
        assert!(multi.image_path.as_ref().unwrap().ends_with("aa_first.png"));
        assert_eq!(multi.directory_path, root.path().join("200"));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let root = tempfile::tempdir().unwrap();
        assert!(scan_workshop_root(&root.path().join("missing")).is_empty());
    }

    #[tokio::test]
    async fn test_async_scan() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("5").join("x.pack"));
        let records = scan_workshop_root_async(root.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_modified, last_modified_secs(&records[0].archive_path).unwrap());
    }

    #[tokio::test]
    async fn test_inspect_single_folder() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("5").join("x.pack"));
        let found = inspect_mod_folder_async(root.path().to_path_buf(), "5".to_string())
            .await
            .unwrap();
        assert_eq!(found.unwrap().archive_base_name, "x");

        let missing = inspect_mod_folder_async(root.path().to_path_buf(), "6".to_string())
            .await
            .unwrap();
        assert!(missing.is_none());
        let bogus = inspect_mod_folder_async(root.path().to_path_buf(), "../5".to_string())
            .await
            .unwrap();
        assert!(bogus.is_none());
    }
}
