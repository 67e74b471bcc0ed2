//! Test helpers for the coastal snow crates.
//!
//! Synthetic land/water masks and rasters, sample CSV builders, calibrated
//! display fixtures, temp directories, and float assertions. Pulled in as a
//! path dev-dependency by `snow-processor` and `snow-service`.

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a data file through [`find_test_file`], or end the calling test
/// early when it is absent.
///
/// Large inputs such as the 3600x1800 land mask are not checked in; tests
/// that need them pass silently unless `TEST_DATA_DIR` points at a copy.
///
/// ```ignore
/// let mask = require_test_file!("esacci_landmask.png");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        let name = $name;
        match $crate::find_test_file(name) {
            Some(path) => path,
            None => {
                eprintln!("skipping: '{}' not found (set TEST_DATA_DIR)", name);
                return;
            }
        }
    }};
}

/// Assert `|left - right| <= epsilon` for depths and display values.
///
/// Both sides are widened to `f64`, so `f32` fields compare directly
/// against decimal literals such as `0.1536`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right) = ($left as f64, $right as f64);
        let epsilon = $epsilon as f64;
        assert!(
            (left - right).abs() <= epsilon,
            "{} != {} within {} (off by {})",
            left,
            right,
            epsilon,
            (left - right).abs()
        );
    }};
}

/// Element-wise [`assert_approx_eq!`] over two slices of equal length, for
/// values along a diffusion walk.
#[macro_export]
macro_rules! assert_slice_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = $left;
        let right = $right;
        assert_eq!(left.len(), right.len(), "slice lengths differ");
        for (idx, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let diff = (*l as f64 - *r as f64).abs();
            if diff > $epsilon as f64 {
                panic!(
                    "assertion failed at index {}: `{:?}` vs `{:?}`, diff `{:?}` > epsilon `{:?}`",
                    idx, l, r, diff, $epsilon
                );
            }
        }
    }};
}
