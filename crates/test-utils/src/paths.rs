//! Scratch directories for dataset tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Creates a temporary directory to hold dataset files.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_dataset_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary dataset directory")
}

/// Creates a temporary directory with a specific prefix.
///
/// # Arguments
///
/// * `prefix` - A prefix for the directory name (e.g., "latest_cache_")
pub fn temp_dataset_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary dataset directory")
}

/// Creates an empty file named `name` in `dir`, returning its path.
///
/// Useful for populating a directory with entries that scanning should
/// either pick up or skip, without writing a full dataset.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"").expect("Failed to create test file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dataset_dir() {
        let dir = temp_dataset_dir();
        assert!(dir.path().exists());
        // Dir is cleaned up when dropped
    }

    #[test]
    fn test_temp_dataset_dir_with_prefix() {
        let dir = temp_dataset_dir_with_prefix("wind_test_");
        let path_str = dir.path().to_string_lossy();
        assert!(path_str.contains("wind_test_"));
    }

    #[test]
    fn test_touch() {
        let dir = temp_dataset_dir();
        let path = touch(dir.path(), "2024011500.gribmirror");
        assert!(path.exists());
        assert_eq!(fs::metadata(path).unwrap().len(), 0);
    }
}
