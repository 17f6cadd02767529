//! Tile coordinates for slippy-map (XYZ) tile pyramids.

use serde::{Deserialize, Serialize};

/// Deepest zoom level any archive may address.
pub const MAX_ZOOM: u32 = 30;

/// A tile coordinate (z/x/y) in the XYZ scheme (row 0 at the north edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y), XYZ scheme
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this zoom, or `None` past [`MAX_ZOOM`].
    pub fn matrix_size(z: u32) -> Option<u64> {
        (z <= MAX_ZOOM).then(|| 1u64 << z)
    }

    /// Whether the coordinate addresses a tile that can exist at its zoom.
    pub fn is_valid(&self) -> bool {
        match Self::matrix_size(self.z) {
            Some(n) => (self.x as u64) < n && (self.y as u64) < n,
            None => false,
        }
    }

    /// Row in the TMS scheme (row 0 at the south edge), as MBTiles stores it.
    pub fn tms_row(&self) -> Option<u32> {
        if !self.is_valid() {
            return None;
        }
        let n = 1u64 << self.z;
        Some((n - 1 - self.y as u64) as u32)
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tms_row_flip() {
        assert_eq!(TileCoord::new(0, 0, 0).tms_row(), Some(0));
        assert_eq!(TileCoord::new(1, 0, 0).tms_row(), Some(1));
        assert_eq!(TileCoord::new(3, 2, 5).tms_row(), Some(2));
    }

    #[test]
    fn test_out_of_range_coords() {
        assert!(!TileCoord::new(2, 4, 0).is_valid());
        assert!(!TileCoord::new(2, 0, 4).is_valid());
        assert!(!TileCoord::new(31, 0, 0).is_valid());
        assert_eq!(TileCoord::new(2, 4, 0).tms_row(), None);
    }
}
