//! Test helpers shared by the workspace crates: STAC fixtures, synthetic
//! reflectance rasters with a GeoTIFF writer, and lookup of optional real
//! scene files.

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a real scene file or return early from the test.
///
/// Sentinel-2 COGs are far too large to check in, so tests against them
/// only run where the file was downloaded (see [`find_test_file`]).
///
/// ```ignore
/// let path = test_utils::require_test_file!("T10TET_20200601_B04.tif");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!("SKIPPED: '{}' not found, set TEST_DATA_DIR to run", $name);
                return;
            }
        }
    }};
}
