//! Error types for the catchment engine.

use thiserror::Error;

use crate::CatchmentId;

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Primary error type for engine operations.
///
/// Variants fall into four families: validation (the request was wrong),
/// not-found (nothing there), resource (backing storage unusable) and
/// control (the caller cancelled).
#[derive(Debug, Error)]
pub enum EngineError {
    // === Validation Errors ===
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Invalid bbox: {0}")]
    InvalidBbox(String),

    #[error("Empty selection: at least one catchment id is required")]
    EmptySelection,

    #[error("Invalid tile coordinate: {0}")]
    InvalidTile(String),

    // === Not-Found Errors ===
    #[error("Catchment not found: {0}")]
    CatchmentNotFound(CatchmentId),

    #[error("Unknown catchment (no stored geometry): {0}")]
    UnknownCatchment(CatchmentId),

    #[error("Tile not found: {layer}/{z}/{x}/{y}")]
    TileNotFound { layer: String, z: u32, x: u32, y: u32 },

    #[error("Tile layer not found: {0}")]
    LayerNotFound(String),

    // === Resource Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // === Internal Errors ===
    #[error("Geometry error: {0}")]
    Geometry(String),

    // === Control ===
    #[error("Operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Stable short code for this error, used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidColumn(_) => "invalid_column",
            EngineError::InvalidScenario(_) => "invalid_scenario",
            EngineError::InvalidBbox(_) => "invalid_bbox",
            EngineError::EmptySelection => "empty_selection",
            EngineError::InvalidTile(_) => "invalid_tile",
            EngineError::CatchmentNotFound(_) => "catchment_not_found",
            EngineError::UnknownCatchment(_) => "unknown_catchment",
            EngineError::TileNotFound { .. } => "tile_not_found",
            EngineError::LayerNotFound(_) => "layer_not_found",
            EngineError::Database(_) => "database",
            EngineError::Config(_) => "config",
            EngineError::Geometry(_) => "geometry",
            EngineError::Cancelled => "cancelled",
        }
    }

    /// True for errors caused by the request itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidColumn(_)
                | EngineError::InvalidScenario(_)
                | EngineError::InvalidBbox(_)
                | EngineError::EmptySelection
                | EngineError::InvalidTile(_)
        )
    }

    /// True for "nothing here" outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::CatchmentNotFound(_)
                | EngineError::UnknownCatchment(_)
                | EngineError::TileNotFound { .. }
                | EngineError::LayerNotFound(_)
        )
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            EngineError::InvalidColumn(_)
            | EngineError::InvalidScenario(_)
            | EngineError::InvalidBbox(_)
            | EngineError::EmptySelection
            | EngineError::InvalidTile(_) => 400,

            EngineError::CatchmentNotFound(_)
            | EngineError::UnknownCatchment(_)
            | EngineError::TileNotFound { .. }
            | EngineError::LayerNotFound(_) => 404,

            EngineError::Cancelled => 503,

            EngineError::Database(_) | EngineError::Config(_) | EngineError::Geometry(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(EngineError::InvalidColumn("x".into()).http_status_code(), 400);
        assert_eq!(EngineError::EmptySelection.http_status_code(), 400);
        assert_eq!(EngineError::UnknownCatchment(7).http_status_code(), 404);
        assert_eq!(EngineError::CatchmentNotFound(7).http_status_code(), 404);
        assert_eq!(
            EngineError::TileNotFound {
                layer: "catchments".into(),
                z: 3,
                x: 1,
                y: 1
            }
            .http_status_code(),
            404
        );
        assert_eq!(EngineError::Database("gone".into()).http_status_code(), 500);
    }

    #[test]
    fn test_error_families_are_disjoint() {
        let errors = [
            EngineError::InvalidColumn("x".into()),
            EngineError::EmptySelection,
            EngineError::UnknownCatchment(1),
            EngineError::LayerNotFound("l".into()),
            EngineError::Cancelled,
        ];
        for err in &errors {
            assert!(!(err.is_validation() && err.is_not_found()), "{}", err.kind());
        }
    }
}
