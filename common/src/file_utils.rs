//! File discovery helpers.

use std::fs;
use std::path::{Path, PathBuf};

/// Supported volumetric stack extensions.
pub const STACK_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Returns paths to all files in `dir` matching the given extensions, sorted by name.
///
/// Extensions are matched case-insensitively. A missing directory yields an empty list.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|path| {
            if !path.is_file() {
                return false;
            }
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            extensions.contains(&ext.to_lowercase().as_str())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// File name without directory and extension, or the whole path as a fallback.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
