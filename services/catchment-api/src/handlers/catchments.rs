//! Single-catchment detail.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};
use catchment_engine::CatchmentId;

use super::common::{json_response, ApiError};
use crate::metrics::Endpoint;
use crate::state::AppState;

/// GET /api/catchments/:id
pub async fn catchment_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let result = id
        .parse::<CatchmentId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid catchment id: {}", id)))
        .and_then(|id| {
            let detail = state.engine.catchment_detail(id)?;
            Ok(json_response(StatusCode::OK, &detail))
        });

    state
        .metrics
        .record_request(Endpoint::Detail, start.elapsed(), result.is_ok())
        .await;
    result
}
