//! Shared test utilities for the catchment-compare workspace.
//!
//! GeoPackage and MBTiles builders that write SQLite files into temp dirs,
//! polygon generators, and the standard fixture dataset with the values
//! tests should expect from it.

pub mod fixtures;
pub mod generators;
pub mod gpkg;
pub mod mbtiles;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use gpkg::{grid_geopackage, standard_geopackage, GeoPackageBuilder, SqliteFixture};
pub use mbtiles::{standard_mbtiles, standard_tile_payload, MbTilesBuilder};

/// Assert two numbers are within `epsilon` of each other.
///
/// ```ignore
/// assert_approx_eq!(area, 2.0, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        let (actual, expected, epsilon) = ($actual as f64, $expected as f64, $epsilon as f64);
        let diff = (actual - expected).abs();
        assert!(
            diff <= epsilon,
            "assertion failed: {} is not within {} of {} (diff {})",
            actual,
            epsilon,
            expected,
            diff
        );
    }};
}

/// Assert two `[min_x, min_y, max_x, max_y]` boxes match component-wise.
#[macro_export]
macro_rules! assert_bbox_approx_eq {
    ($actual:expr, $expected:expr, $epsilon:expr) => {{
        let actual: [f64; 4] = $actual;
        let expected: [f64; 4] = $expected;
        for (a, e) in actual.iter().zip(expected.iter()) {
            $crate::assert_approx_eq!(*a, *e, $epsilon);
        }
    }};
}
