//! Decoded catchment geometry and its GeoJSON form.

use catchment_common::BoundingBox;
use geo::{Area, MultiPolygon, Polygon};

use crate::DecodeError;

/// A decoded catchment boundary. Coordinates are (x = longitude, y = latitude).
#[derive(Debug, Clone, PartialEq)]
pub enum CatchmentGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl CatchmentGeometry {
    /// View as a list of polygons, the form union and area math work on.
    pub fn polygons(&self) -> &[Polygon<f64>] {
        match self {
            CatchmentGeometry::Polygon(p) => std::slice::from_ref(p),
            CatchmentGeometry::MultiPolygon(mp) => &mp.0,
        }
    }

    /// Every ring point in storage order, exterior first then interiors, per polygon.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.polygons().iter().flat_map(|p| {
            std::iter::once(p.exterior())
                .chain(p.interiors().iter())
                .flat_map(|ring| ring.coords().map(|c| (c.x, c.y)))
        })
    }

    /// Bounding box over all ring points, `None` for a geometry without points.
    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points())
    }

    /// Planar area in squared coordinate units: exteriors count positive,
    /// holes negative.
    pub fn planar_area(&self) -> f64 {
        self.polygons().iter().map(|p| p.unsigned_area()).sum()
    }

    /// Convert to a GeoJSON Polygon or MultiPolygon geometry.
    pub fn to_geojson(&self) -> geojson::Geometry {
        let value = match self {
            CatchmentGeometry::Polygon(p) => geojson::Value::Polygon(polygon_rings(p)),
            CatchmentGeometry::MultiPolygon(mp) => {
                geojson::Value::MultiPolygon(mp.0.iter().map(polygon_rings).collect())
            }
        };
        geojson::Geometry::new(value)
    }

    /// Build from a union result, collapsing single-part results to a Polygon.
    pub fn from_multi_polygon(mp: MultiPolygon<f64>) -> Self {
        if mp.0.len() == 1 {
            let mut parts = mp.0;
            match parts.pop() {
                Some(p) => CatchmentGeometry::Polygon(p),
                None => CatchmentGeometry::MultiPolygon(MultiPolygon::new(parts)),
            }
        } else {
            CatchmentGeometry::MultiPolygon(mp)
        }
    }
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
        .collect()
}

/// Per-row decode outcome. A malformed row degrades to "no geometry" for
/// that catchment without failing anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryRow {
    Present(CatchmentGeometry),
    /// NULL blob or a header flagged as empty geometry.
    Absent,
    Malformed(DecodeError),
}

impl GeometryRow {
    pub fn geometry(&self) -> Option<&CatchmentGeometry> {
        match self {
            GeometryRow::Present(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, GeometryRow::Malformed(_))
    }
}
