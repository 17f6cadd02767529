//! Pre-built tiles and TileJSON.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Path},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use catchment_engine::{EngineError, TileCoord};

use super::common::{json_response, ApiError};
use crate::metrics::Endpoint;
use crate::state::AppState;

/// Parse one path segment of a tile address.
fn parse_coord(name: &str, value: &str) -> Result<u32, EngineError> {
    value
        .parse::<u32>()
        .map_err(|_| EngineError::InvalidTile(format!("{} must be a non-negative integer: {}", name, value)))
}

/// The row segment, which may carry a format extension (`38.pbf`).
fn parse_row(value: &str) -> Result<u32, EngineError> {
    let digits = value.split_once('.').map_or(value, |(head, _)| head);
    parse_coord("y", digits)
}

/// GET /tiles/:layer/:z/:x/:y
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((layer, z, x, y)): Path<(String, String, String, String)>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let result = serve_tile(&state, &layer, &z, &x, &y).await;
    state
        .metrics
        .record_request(Endpoint::Tile, start.elapsed(), result.is_ok())
        .await;
    result
}

async fn serve_tile(
    state: &AppState,
    layer: &str,
    z: &str,
    x: &str,
    y: &str,
) -> Result<Response, ApiError> {
    let coord = TileCoord::new(parse_coord("z", z)?, parse_coord("x", x)?, parse_row(y)?);
    let tile = state.engine.get_tile(layer, coord).await?;

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, tile.format.content_type()),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        tile.data.clone(),
    )
        .into_response();
    if tile.is_gzipped() {
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    Ok(response)
}

/// GET /tiles/:layer - TileJSON descriptor
pub async fn tilejson_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(layer): Path<String>,
) -> Result<Response, ApiError> {
    let layer = layer.strip_suffix(".json").unwrap_or(&layer);
    let tilejson = state.engine.tile_metadata(layer)?;
    Ok(json_response(StatusCode::OK, tilejson))
}
