//! Dissolve: planar union of catchment polygons into one boundary.

use std::collections::BTreeSet;

use catchment_common::{BoundingBox, CatchmentId, EngineError, EngineResult};
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use gpkg_geometry::CatchmentGeometry;
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Kilometres per degree of latitude on a spherical earth.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Read access to stored catchment geometry.
pub trait GeometryLookup {
    /// Geometry of `id`, `None` if unknown or stored without geometry.
    fn geometry(&self, id: CatchmentId) -> Option<&CatchmentGeometry>;
}

impl GeometryLookup for std::collections::HashMap<CatchmentId, CatchmentGeometry> {
    fn geometry(&self, id: CatchmentId) -> Option<&CatchmentGeometry> {
        self.get(&id)
    }
}

impl GeometryLookup for std::collections::BTreeMap<CatchmentId, CatchmentGeometry> {
    fn geometry(&self, id: CatchmentId) -> Option<&CatchmentGeometry> {
        self.get(&id)
    }
}

/// A synthesized analysis boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    /// Input ids, ascending and de-duplicated.
    pub catchment_ids: Vec<CatchmentId>,
    pub geometry: CatchmentGeometry,
    pub bbox: BoundingBox,
    /// Planar area in squared coordinate units (deg² for lon/lat data).
    pub area: f64,
    /// `area` scaled to km² at the latitude of the bbox centre.
    pub area_km2: f64,
}

impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            catchment_ids: &'a [CatchmentId],
            geometry: geojson::Geometry,
            bbox: [f64; 4],
            area: f64,
            area_km2: f64,
        }

        Repr {
            catchment_ids: &self.catchment_ids,
            geometry: self.geometry.to_geojson(),
            bbox: self.bbox.to_array(),
            area: self.area,
            area_km2: self.area_km2,
        }
        .serialize(serializer)
    }
}

/// Union the geometry of every id in `ids`.
///
/// All-or-nothing: if any id has no geometry, or only zero-area rings, the
/// whole call fails with `UnknownCatchment` naming the smallest such id. Input order and
/// duplicates do not affect the result.
pub fn dissolve<L>(
    lookup: &L,
    ids: impl IntoIterator<Item = CatchmentId>,
    cancel: &CancellationToken,
) -> EngineResult<Boundary>
where
    L: GeometryLookup + ?Sized,
{
    let ids: BTreeSet<CatchmentId> = ids.into_iter().collect();
    if ids.is_empty() {
        return Err(EngineError::EmptySelection);
    }

    let mut parts = Vec::with_capacity(ids.len());
    for &id in &ids {
        let geometry = lookup
            .geometry(id)
            .ok_or(EngineError::UnknownCatchment(id))?;
        let normalized = normalize(geometry);
        if normalized.0.is_empty() {
            // Zero-area geometry is as unusable as a missing one
            debug!(catchment_id = id, "Catchment has no non-degenerate rings");
            return Err(EngineError::UnknownCatchment(id));
        }
        parts.push(normalized);
    }

    let union = cascaded_union(parts, cancel)?;
    let geometry = CatchmentGeometry::from_multi_polygon(union);
    let bbox = geometry
        .bbox()
        .ok_or_else(|| EngineError::Geometry("union produced no points".to_string()))?;
    let area = geometry.planar_area();

    Ok(Boundary {
        catchment_ids: ids.into_iter().collect(),
        area_km2: degrees_to_km2(area, &bbox),
        geometry,
        bbox,
        area,
    })
}

/// Convert a deg² area to km² using the cosine of the bbox's mid latitude.
pub fn degrees_to_km2(area_deg2: f64, bbox: &BoundingBox) -> f64 {
    let (_, mid_lat) = bbox.center();
    area_deg2 * KM_PER_DEGREE * KM_PER_DEGREE * mid_lat.to_radians().cos().abs()
}

/// Pairwise union, halving the number of parts each round.
fn cascaded_union(
    mut parts: Vec<MultiPolygon<f64>>,
    cancel: &CancellationToken,
) -> EngineResult<MultiPolygon<f64>> {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }

    parts
        .pop()
        .ok_or_else(|| EngineError::Geometry("nothing to union".to_string()))
}

/// Clean each ring before union: drop non-finite and repeated points,
/// close open rings, discard rings with fewer than three distinct points
/// or zero area. A polygon whose exterior is discarded is dropped whole.
pub fn normalize(geometry: &CatchmentGeometry) -> MultiPolygon<f64> {
    let polygons = geometry
        .polygons()
        .iter()
        .filter_map(|polygon| {
            let exterior = clean_ring(polygon.exterior())?;
            let interiors = polygon.interiors().iter().filter_map(clean_ring).collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect();
    MultiPolygon::new(polygons)
}

fn clean_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len() + 1);
    for c in ring.coords() {
        if !(c.x.is_finite() && c.y.is_finite()) {
            continue;
        }
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }
    let first = coords[0];
    coords.push(first);

    let ring = LineString::new(coords);
    let area = Polygon::new(ring.clone(), Vec::new()).unsigned_area();
    (area > 0.0).then_some(ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use std::collections::HashMap;

    fn square(x: f64, y: f64, size: f64) -> CatchmentGeometry {
        CatchmentGeometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size)
        ])
    }

    fn lookup() -> HashMap<CatchmentId, CatchmentGeometry> {
        let mut map = HashMap::new();
        map.insert(1, square(0.0, 0.0, 1.0));
        map.insert(2, square(1.0, 0.0, 1.0));
        map.insert(3, square(5.0, 5.0, 1.0));
        map.insert(4, square(0.5, 0.0, 1.0));
        map
    }

    #[test]
    fn test_adjacent_squares_merge() {
        let boundary = dissolve(&lookup(), [2, 1], &CancellationToken::new()).unwrap();
        assert!(matches!(boundary.geometry, CatchmentGeometry::Polygon(_)));
        assert!((boundary.area - 2.0).abs() < 1e-9);
        assert_eq!(boundary.bbox, BoundingBox::new(0.0, 0.0, 2.0, 1.0));
        assert_eq!(boundary.catchment_ids, vec![1, 2]);
    }

    #[test]
    fn test_overlap_is_not_double_counted() {
        let boundary = dissolve(&lookup(), [1, 4], &CancellationToken::new()).unwrap();
        assert!((boundary.area - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_stays_multipolygon() {
        let boundary = dissolve(&lookup(), [1, 3], &CancellationToken::new()).unwrap();
        match &boundary.geometry {
            CatchmentGeometry::MultiPolygon(mp) => assert_eq!(mp.0.len(), 2),
            other => panic!("expected multipolygon, got {:?}", other),
        }
        assert_eq!(boundary.bbox, BoundingBox::new(0.0, 0.0, 6.0, 6.0));
    }

    #[test]
    fn test_order_and_duplicates_do_not_matter() {
        let token = CancellationToken::new();
        let a = dissolve(&lookup(), [1, 2, 3], &token).unwrap();
        let b = dissolve(&lookup(), [3, 1, 2, 2], &token).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_unknown() {
        let token = CancellationToken::new();
        assert!(matches!(
            dissolve(&lookup(), Vec::new(), &token),
            Err(EngineError::EmptySelection)
        ));
        assert!(matches!(
            dissolve(&lookup(), [1, 42, 17], &token),
            Err(EngineError::UnknownCatchment(17))
        ));
    }

    #[test]
    fn test_zero_area_catchment_is_unknown() {
        let token = CancellationToken::new();
        let mut map = lookup();
        map.insert(
            7,
            CatchmentGeometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 2.0, y: 2.0)
            ]),
        );

        assert!(matches!(
            dissolve(&map, [1, 7], &token),
            Err(EngineError::UnknownCatchment(7))
        ));
        assert!(matches!(
            dissolve(&map, [7], &token),
            Err(EngineError::UnknownCatchment(7))
        ));
        // Smallest unusable id wins, whether missing or degenerate
        assert!(matches!(
            dissolve(&map, [7, 1, 9], &token),
            Err(EngineError::UnknownCatchment(7))
        ));
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            dissolve(&lookup(), [1, 2], &token),
            Err(EngineError::Cancelled)
        ));
    }

    #[test]
    fn test_normalize_drops_degenerate_rings() {
        let spike = LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.0, 0.0)]);
        assert!(clean_ring(&spike).is_none());

        let open = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let closed = clean_ring(&open).unwrap();
        assert_eq!(closed.0.len(), 4);
        assert_eq!(closed.0.first(), closed.0.last());
    }

    #[test]
    fn test_km2_scaling_at_equator() {
        let bbox = BoundingBox::new(0.0, -0.5, 1.0, 0.5);
        let km2 = degrees_to_km2(1.0, &bbox);
        assert!((km2 - KM_PER_DEGREE * KM_PER_DEGREE).abs() < 1e-6);
    }
}
