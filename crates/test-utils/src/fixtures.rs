//! Common test fixtures for catchment engine tests.
//!
//! The "standard" dataset is small enough to reason about by hand:
//! three unit squares side by side along the x axis plus two catchments
//! without usable geometry.
//!
//! ```text
//!   y=1 +-----+-----+-----+
//!       |  1  |  2  |  3  |
//!   y=0 +-----+-----+-----+
//!      x=0   x=1   x=2   x=3
//! ```

/// Common bounding box definitions for testing, as (min_x, min_y, max_x, max_y).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Covers the whole standard dataset.
    pub const STANDARD_ALL: (f64, f64, f64, f64) = (-1.0, -1.0, 4.0, 2.0);

    /// Strictly inside catchment 1 only.
    pub const INSIDE_FIRST: (f64, f64, f64, f64) = (0.2, 0.2, 0.4, 0.4);

    /// Far from every catchment.
    pub const EMPTY_AREA: (f64, f64, f64, f64) = (100.0, 50.0, 101.0, 51.0);

    /// Invalid bbox (min > max)
    pub const INVERTED: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);

    /// Renders a tuple in the `minx,miny,maxx,maxy` query form.
    pub fn to_query(b: (f64, f64, f64, f64)) -> String {
        format!("{},{},{},{}", b.0, b.1, b.2, b.3)
    }
}

/// The standard catchment dataset.
pub mod catchments {
    /// Catchments with valid square geometry.
    pub const SQUARE_IDS: [i64; 3] = [1, 2, 3];

    /// Catchment whose geometry blob is corrupt.
    pub const MALFORMED_ID: i64 = 4;

    /// Catchment with a NULL geometry blob.
    pub const NULL_GEOMETRY_ID: i64 = 5;

    /// An id present in no table.
    pub const UNKNOWN_ID: i64 = 999;
}

/// Attribute values of the standard dataset.
pub mod attributes {
    pub const RAINFALL: &str = "rainfall";
    pub const RUNOFF: &str = "runoff";
    /// A text column; never queryable.
    pub const LABEL: &str = "label";

    /// `rainfall` by id for ids 1..=3.
    pub const RAINFALL_CURRENT: [f64; 3] = [10.0, 20.0, 30.0];
    pub const RAINFALL_REFERENCE: [f64; 3] = [5.0, 25.0, 40.0];

    /// `runoff` by id for ids 1..=3; `None` is stored as NULL.
    pub const RUNOFF_CURRENT: [Option<f64>; 3] = [Some(0.4), None, Some(0.6)];
    pub const RUNOFF_REFERENCE: [Option<f64>; 3] = [Some(0.3), Some(0.5), None];

    /// Domain of `rainfall` across both scenarios.
    pub const RAINFALL_DOMAIN: (f64, f64) = (5.0, 40.0);
}

/// The standard tile archive.
pub mod tiles {
    pub const LAYER: &str = "catchments";
    pub const MIN_ZOOM: u32 = 0;
    pub const MAX_ZOOM: u32 = 6;

    /// Tiles stored in the archive, as XYZ coordinates.
    pub const POPULATED: [(u32, u32, u32); 3] = [(0, 0, 0), (1, 1, 0), (6, 57, 38)];

    /// The (1, 1, 0) tile is stored gzip-compressed.
    pub const GZIPPED: (u32, u32, u32) = (1, 1, 0);
}
