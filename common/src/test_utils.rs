//! Locations for files written by tests.
//!
//! Everything lives under `<workspace>/test_output/`, which is git-ignored.

use std::path::PathBuf;

/// `<workspace>/test_output`. The workspace is the parent of this crate's manifest dir.
pub fn test_output_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
        .join("test_output")
}

/// Path for a test output file. `name` may contain subdirectories; they are
/// created on demand.
pub fn test_output_path(name: &str) -> PathBuf {
    let path = test_output_root().join(name);
    let parent = path.parent().map(PathBuf::from).unwrap_or_else(test_output_root);
    std::fs::create_dir_all(&parent)
        .unwrap_or_else(|e| panic!("Failed to create {}: {e}", parent.display()));
    path
}

/// An empty directory for one test. Leftovers of earlier runs are removed.
pub fn test_output_dir(name: &str) -> PathBuf {
    let dir = test_output_root().join(name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir)
            .unwrap_or_else(|e| panic!("Failed to clear {}: {e}", dir.display()));
    }
    std::fs::create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("Failed to create {}: {e}", dir.display()));
    dir
}
