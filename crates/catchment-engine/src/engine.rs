//! The engine facade: every operation the API layer calls.

use std::collections::BTreeMap;

use catchment_common::{BoundingBox, CatchmentId, EngineError, EngineResult, TileCoord};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::attributes::{AttributeStore, ColumnDomain};
use crate::catchments::CatchmentStore;
use crate::config::EngineConfig;
use crate::dissolve::{degrees_to_km2, dissolve, Boundary};
use crate::gpkg::GeoPackageSource;
use crate::spatial::SpatialIndex;
use crate::tiles::{Tile, TileJson, TileServer};

/// A choropleth request, already parsed but not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethQuery {
    pub bbox: BoundingBox,
    pub scenario: String,
    pub column: String,
    /// Requested cap; clamped to `[1, viewport_limit]`.
    pub limit: Option<usize>,
}

/// GeoJSON FeatureCollection of catchments colored by one attribute.
#[derive(Debug, Serialize)]
pub struct Choropleth<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<ChoroplethFeature<'a>>,
    pub truncated: bool,
    pub limit: usize,
    pub total_matches: usize,
    pub domain: Option<ColumnDomain>,
    pub scenario: &'a str,
    pub column: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChoroplethFeature<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: CatchmentId,
    pub geometry: &'a serde_json::Value,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureProperties {
    pub catchment_id: CatchmentId,
    /// `null` for NoData.
    pub value: Option<f64>,
}

/// Everything known about one catchment.
#[derive(Debug, Serialize)]
pub struct CatchmentDetail<'a> {
    pub catchment_id: CatchmentId,
    pub geometry: Option<&'a serde_json::Value>,
    pub bbox: Option<[f64; 4]>,
    pub area: Option<f64>,
    pub area_km2: Option<f64>,
    /// scenario -> column -> value (`null` for NoData).
    pub attributes: BTreeMap<&'a str, BTreeMap<&'a str, Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub domain: Option<ColumnDomain>,
}

/// Load-time counts, reported by readiness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    pub catchments: usize,
    pub indexed: usize,
    pub malformed_geometries: usize,
    pub scenarios: usize,
    pub columns: usize,
    pub tile_layers: Vec<String>,
}

/// Loaded, immutable engine state. Shared read-only between requests.
pub struct GeoEngine {
    viewport_limit: usize,
    catchments: CatchmentStore,
    attributes: AttributeStore,
    index: SpatialIndex,
    tiles: TileServer,
}

impl GeoEngine {
    /// Open every backing file and build the in-memory stores.
    ///
    /// Any failure here is fatal; there is no partially-loaded engine.
    pub async fn load(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let source = GeoPackageSource::open(&config.geopackage).await?;
        let catchments = CatchmentStore::load(&source, &config.catchments).await?;
        let attributes = AttributeStore::load(
            &source,
            &config.catchments,
            &config.scenarios,
            catchments.ids(),
        )
        .await?;
        source.close().await;

        let tiles = TileServer::open(&config.tiles, &config.tile_url_template).await?;

        let engine = Self::from_parts(config.viewport_limit, catchments, attributes, tiles);
        info!(
            catchments = engine.catchments.len(),
            indexed = engine.index.len(),
            viewport_limit = engine.viewport_limit,
            "Catchment engine loaded"
        );
        Ok(engine)
    }

    /// Assemble an engine from stores built elsewhere.
    pub fn from_parts(
        viewport_limit: usize,
        catchments: CatchmentStore,
        attributes: AttributeStore,
        tiles: TileServer,
    ) -> Self {
        let index = SpatialIndex::build(catchments.bounding_boxes());
        Self {
            viewport_limit: viewport_limit.max(1),
            catchments,
            attributes,
            index,
            tiles,
        }
    }

    pub fn viewport_limit(&self) -> usize {
        self.viewport_limit
    }

    pub fn list_scenarios(&self) -> &[String] {
        self.attributes.list_scenarios()
    }

    pub fn list_columns(&self) -> &[String] {
        self.attributes.list_columns()
    }

    pub fn is_valid_column(&self, name: &str) -> bool {
        self.attributes.is_valid_column(name)
    }

    pub fn column_domains(&self) -> Vec<ColumnInfo> {
        self.attributes
            .domains()
            .map(|(name, domain)| ColumnInfo {
                name: name.to_string(),
                domain,
            })
            .collect()
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Clamp a requested limit to `[1, viewport_limit]`.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.viewport_limit)
            .clamp(1, self.viewport_limit)
    }

    /// Catchments in the viewport with one attribute's values.
    ///
    /// Column and scenario are checked against the loaded allowlists before
    /// anything else happens.
    pub fn query_choropleth<'a>(
        &'a self,
        query: &'a ChoroplethQuery,
        cancel: &CancellationToken,
    ) -> EngineResult<Choropleth<'a>> {
        let column = self.attributes.column_index(&query.column)?;
        let scenario = self.attributes.scenario_index(&query.scenario)?;
        if !query.bbox.to_array().iter().all(|v| v.is_finite()) {
            return Err(EngineError::InvalidBbox(
                "coordinates must be finite".to_string(),
            ));
        }

        let limit = self.effective_limit(query.limit);
        let selection = self.index.query_viewport(&query.bbox, limit, cancel)?;

        let features = selection
            .ids
            .iter()
            .filter_map(|&id| {
                let geometry = self.catchments.get(id)?.geojson.as_ref()?;
                Some(ChoroplethFeature {
                    kind: "Feature",
                    id,
                    geometry,
                    properties: FeatureProperties {
                        catchment_id: id,
                        value: self.attributes.value_at(scenario, id, column).as_f64(),
                    },
                })
            })
            .collect();

        Ok(Choropleth {
            kind: "FeatureCollection",
            features,
            truncated: selection.truncated,
            limit,
            total_matches: selection.total_matches,
            domain: self.attributes.get_domain(&query.column)?,
            scenario: &query.scenario,
            column: &query.column,
        })
    }

    pub fn catchment_detail(&self, id: CatchmentId) -> EngineResult<CatchmentDetail<'_>> {
        let record = self.catchments.get(id);
        if record.is_none() && !self.attributes.contains(id) {
            return Err(EngineError::CatchmentNotFound(id));
        }

        let geometry = record.and_then(|r| r.geometry.as_ref());
        let bbox = record.and_then(|r| r.bbox);
        let area = geometry.map(|g| g.planar_area());

        let columns = self.attributes.list_columns();
        let attributes = self
            .attributes
            .list_scenarios()
            .iter()
            .enumerate()
            .map(|(scenario_idx, scenario)| {
                let values = columns
                    .iter()
                    .map(String::as_str)
                    .zip(self.attributes.row(scenario_idx, id))
                    .map(|(column, value)| (column, value.as_f64()))
                    .collect();
                (scenario.as_str(), values)
            })
            .collect();

        Ok(CatchmentDetail {
            catchment_id: id,
            geometry: record.and_then(|r| r.geojson.as_ref()),
            bbox: bbox.map(|b| b.to_array()),
            area,
            area_km2: area.zip(bbox).map(|(a, b)| degrees_to_km2(a, &b)),
            attributes,
        })
    }

    /// Union of the given catchments. Runs on the calling thread; callers on
    /// an async runtime should move it to a blocking task.
    pub fn dissolve_catchments(
        &self,
        ids: &[CatchmentId],
        cancel: &CancellationToken,
    ) -> EngineResult<Boundary> {
        dissolve(&self.catchments, ids.iter().copied(), cancel)
    }

    pub async fn get_tile(&self, layer: &str, coord: TileCoord) -> EngineResult<Tile> {
        self.tiles.get_tile(layer, coord).await
    }

    pub fn tile_metadata(&self, layer: &str) -> EngineResult<&TileJson> {
        self.tiles.metadata(layer)
    }

    pub fn tile_layers(&self) -> Vec<&str> {
        self.tiles.layers()
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            catchments: self.catchments.len(),
            indexed: self.index.len(),
            malformed_geometries: self.catchments.stats().malformed,
            scenarios: self.attributes.list_scenarios().len(),
            columns: self.attributes.list_columns().len(),
            tile_layers: self.tiles.layers().into_iter().map(String::from).collect(),
        }
    }
}
