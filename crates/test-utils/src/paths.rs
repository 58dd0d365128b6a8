//! Locating optional scene files and scratch directories.

use std::path::PathBuf;

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// Look for `name` under `$TEST_DATA_DIR`, then `<workspace>/testdata`.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let env_dir = std::env::var_os("TEST_DATA_DIR").map(PathBuf::from);
    env_dir
        .into_iter()
        .chain(std::iter::once(workspace_root().join("testdata")))
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("scene-composite-")
        .tempdir()
        .expect("Failed to create temporary test directory")
}
