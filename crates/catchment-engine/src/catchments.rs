//! In-memory catchment geometry, decoded once at load.

use std::collections::BTreeMap;

use catchment_common::{BoundingBox, CatchmentId, EngineResult};
use gpkg_geometry::{decode_row, CatchmentGeometry, GeometryRow};
use tracing::{info, warn};

use crate::config::CatchmentTableConfig;
use crate::dissolve::GeometryLookup;
use crate::gpkg::{CatchmentRow, GeoPackageSource};

/// One catchment's decoded geometry and derived data.
#[derive(Debug, Clone)]
pub struct CatchmentRecord {
    pub id: CatchmentId,
    /// `None` when the blob was NULL, flagged empty or malformed.
    pub geometry: Option<CatchmentGeometry>,
    pub bbox: Option<BoundingBox>,
    /// GeoJSON geometry object, from the cache column or derived from `geometry`.
    pub geojson: Option<serde_json::Value>,
}

/// Counts gathered while decoding the catchments table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub with_geometry: usize,
    pub absent: usize,
    pub malformed: usize,
}

/// Immutable catchment records, ordered by id.
#[derive(Debug, Default)]
pub struct CatchmentStore {
    records: BTreeMap<CatchmentId, CatchmentRecord>,
    stats: LoadStats,
}

impl CatchmentStore {
    pub async fn load(
        source: &GeoPackageSource,
        table: &CatchmentTableConfig,
    ) -> EngineResult<Self> {
        let rows = source.load_catchments(table).await?;
        let store = Self::from_rows(rows);
        info!(
            rows = store.stats.rows,
            with_geometry = store.stats.with_geometry,
            absent = store.stats.absent,
            malformed = store.stats.malformed,
            "Loaded catchments"
        );
        Ok(store)
    }

    /// Decode raw rows. A row that fails to decode keeps its id with no geometry.
    pub fn from_rows(rows: impl IntoIterator<Item = CatchmentRow>) -> Self {
        let mut records = BTreeMap::new();
        let mut stats = LoadStats::default();

        for row in rows {
            stats.rows += 1;
            let geometry = match decode_row(row.geometry.as_deref()) {
                GeometryRow::Present(geometry) => {
                    stats.with_geometry += 1;
                    Some(geometry)
                }
                GeometryRow::Absent => {
                    stats.absent += 1;
                    None
                }
                GeometryRow::Malformed(e) => {
                    stats.malformed += 1;
                    warn!(catchment_id = row.id, error = %e, "Failed to decode catchment geometry");
                    None
                }
            };

            let geojson = geometry
                .as_ref()
                .map(|g| cached_geojson(row.id, row.geojson.as_deref(), g));

            records.insert(
                row.id,
                CatchmentRecord {
                    id: row.id,
                    bbox: geometry.as_ref().and_then(CatchmentGeometry::bbox),
                    geometry,
                    geojson,
                },
            );
        }

        if stats.malformed > 0 {
            warn!(
                malformed = stats.malformed,
                "Some catchments have undecodable geometry and will be served without it"
            );
        }

        Self { records, stats }
    }

    pub fn get(&self, id: CatchmentId) -> Option<&CatchmentRecord> {
        self.records.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CatchmentId> + '_ {
        self.records.keys().copied()
    }

    /// (id, bbox) for every catchment that has geometry.
    pub fn bounding_boxes(&self) -> impl Iterator<Item = (CatchmentId, BoundingBox)> + '_ {
        self.records
            .values()
            .filter_map(|r| r.bbox.map(|bbox| (r.id, bbox)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

impl GeometryLookup for CatchmentStore {
    fn geometry(&self, id: CatchmentId) -> Option<&CatchmentGeometry> {
        self.records.get(&id).and_then(|r| r.geometry.as_ref())
    }
}

/// Use the stored serialization when it parses, otherwise rebuild it.
fn cached_geojson(
    id: CatchmentId,
    cached: Option<&str>,
    geometry: &CatchmentGeometry,
) -> serde_json::Value {
    if let Some(text) = cached.filter(|t| !t.trim().is_empty()) {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) if value.get("type").is_some() => return value,
            Ok(_) => warn!(catchment_id = id, "Cached GeoJSON has no type, rebuilding"),
            Err(e) => warn!(catchment_id = id, error = %e, "Cached GeoJSON is invalid, rebuilding"),
        }
    }
    serde_json::to_value(geometry.to_geojson()).unwrap_or(serde_json::Value::Null)
}
