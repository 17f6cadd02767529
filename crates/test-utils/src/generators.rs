//! Synthetic geometry generators.

use geo::{polygon, MultiPolygon};
use gpkg_geometry::CatchmentGeometry;

/// An axis-aligned square with its lower-left corner at (x, y).
///
/// # Example
///
/// ```
/// use test_utils::square;
///
/// let sq = square(0.0, 0.0, 2.0);
/// assert_eq!(sq.planar_area(), 4.0);
/// ```
pub fn square(x: f64, y: f64, size: f64) -> CatchmentGeometry {
    CatchmentGeometry::Polygon(polygon![
        (x: x, y: y),
        (x: x + size, y: y),
        (x: x + size, y: y + size),
        (x: x, y: y + size),
        (x: x, y: y)
    ])
}

/// A square with a centred square hole of half its size.
pub fn square_with_hole(x: f64, y: f64, size: f64) -> CatchmentGeometry {
    let q = size / 4.0;
    CatchmentGeometry::Polygon(polygon!(
        exterior: [
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y)
        ],
        interiors: [[
            (x: x + q, y: y + q),
            (x: x + 3.0 * q, y: y + q),
            (x: x + 3.0 * q, y: y + 3.0 * q),
            (x: x + q, y: y + 3.0 * q),
            (x: x + q, y: y + q)
        ]]
    ))
}

/// Two unit squares three units apart, as one MultiPolygon.
pub fn two_part_catchment(x: f64, y: f64) -> CatchmentGeometry {
    let parts = [square(x, y, 1.0), square(x + 3.0, y, 1.0)]
        .into_iter()
        .flat_map(|g| g.polygons().to_vec())
        .collect();
    CatchmentGeometry::MultiPolygon(MultiPolygon::new(parts))
}

/// An `n` x `n` grid of adjacent squares of side `size`, starting at the
/// origin. Ids run 1..=n*n row by row from the bottom-left.
pub fn square_grid(n: usize, size: f64) -> Vec<(i64, CatchmentGeometry)> {
    let mut cells = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let id = (row * n + col + 1) as i64;
            cells.push((id, square(col as f64 * size, row as f64 * size, size)));
        }
    }
    cells
}
