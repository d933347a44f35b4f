//! Shared path helpers
//!
//! Cache rows are keyed by path strings, so every writer and reader must agree on
//! one textual form of a path.

use std::io;
use std::path::{Path, PathBuf};

/// Textual key for a path: forward slashes, no trailing separator
pub fn path_key(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    match normalized.trim_end_matches('/') {
        "" => normalized,
        trimmed => trimmed.to_string(),
    }
}

/// `path` relative to `base` as a forward-slash string, or the full key when outside `base`
pub fn relative_key(base: &Path, path: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(relative) => path_key(relative),
        Err(_) => path_key(path),
    }
}

/// Canonicalize `candidate` and verify it is contained within `base`.
///
/// Returns the canonical form of `candidate` on success.
/// Returns an `io::Error` with `PermissionDenied` if the resolved path
/// escapes `base`, or any OS-level canonicalization error.
pub fn validate_child_path(base: &Path, candidate: &Path) -> io::Result<PathBuf> {
    let canonical_base = base.canonicalize()?;
    let canonical_candidate = candidate.canonicalize()?;
    if !canonical_candidate.starts_with(&canonical_base) {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "extracted file escapes the output directory",
        ));
    }
    Ok(canonical_candidate)
}
