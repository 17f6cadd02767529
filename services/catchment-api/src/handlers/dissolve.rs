//! Dissolve a set of catchments into one analysis boundary.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Extension, http::StatusCode, response::Response};
use bytes::Bytes;
use catchment_engine::{CancellationToken, CatchmentId};
use serde::Deserialize;
use tracing::info;

use super::common::{json_response, ApiError};
use crate::metrics::Endpoint;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DissolveRequest {
    pub catchment_ids: Vec<CatchmentId>,
}

/// POST /api/dissolve with body `{"catchment_ids": [..]}`
pub async fn dissolve_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let result = run(&state, &body).await;
    state
        .metrics
        .record_request(Endpoint::Dissolve, start.elapsed(), result.is_ok())
        .await;
    result
}

async fn run(state: &Arc<AppState>, body: &[u8]) -> Result<Response, ApiError> {
    let request: DissolveRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?;
    let requested = request.catchment_ids.len();

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let engine = state.engine.clone();
    let boundary = tokio::task::spawn_blocking(move || {
        engine.dissolve_catchments(&request.catchment_ids, &cancel)
    })
    .await??;
    guard.disarm();

    info!(
        requested,
        dissolved = boundary.catchment_ids.len(),
        area_km2 = boundary.area_km2,
        "Dissolved catchments"
    );
    Ok(json_response(StatusCode::OK, &boundary))
}
