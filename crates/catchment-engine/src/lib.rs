//! Geospatial data engine for catchment scenario comparison.
//!
//! Loads a GeoPackage of catchment polygons and per-scenario attribute
//! tables into immutable in-memory stores, and serves:
//! - viewport choropleth queries against an R-tree of catchment boxes
//! - per-catchment detail
//! - dissolves of catchment sets into one boundary
//! - pre-built vector tiles and TileJSON from MBTiles archives
//!
//! Everything is read-only after [`GeoEngine::load`], so a single engine can
//! be shared behind an `Arc` by any number of concurrent readers.

pub mod attributes;
pub mod catchments;
pub mod config;
pub mod dissolve;
pub mod engine;
pub mod gpkg;
pub mod spatial;
pub mod tiles;

pub use attributes::{AttributeStore, AttributeValue, ColumnDomain};
pub use catchments::{CatchmentRecord, CatchmentStore, LoadStats};
pub use config::{
    CatchmentTableConfig, EngineConfig, ScenarioConfig, TileLayerConfig, DEFAULT_VIEWPORT_LIMIT,
};
pub use dissolve::{dissolve, Boundary, GeometryLookup};
pub use engine::{
    CatchmentDetail, Choropleth, ChoroplethFeature, ChoroplethQuery, ColumnInfo, EngineSummary,
    FeatureProperties, GeoEngine,
};
pub use gpkg::GeoPackageSource;
pub use spatial::{SpatialIndex, ViewportSelection};
pub use tiles::{Tile, TileArchive, TileFormat, TileJson, TileServer};

pub use catchment_common::{BoundingBox, CatchmentId, EngineError, EngineResult, TileCoord};
pub use tokio_util::sync::CancellationToken;
