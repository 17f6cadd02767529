//! Common types and utilities shared across the catchment engine and its services.

pub mod bbox;
pub mod error;
pub mod tile;

pub use bbox::{BboxParseError, BoundingBox};
pub use error::{EngineError, EngineResult};
pub use tile::TileCoord;

/// Identifier of a catchment, as stored in the GeoPackage id column.
pub type CatchmentId = i64;
