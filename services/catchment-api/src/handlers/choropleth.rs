//! Viewport choropleth queries.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Response,
};
use bytes::Bytes;
use catchment_engine::{BoundingBox, CancellationToken, ChoroplethQuery, EngineError};
use serde::Deserialize;
use tracing::debug;

use super::common::{json_bytes, ApiError};
use crate::metrics::Endpoint;
use crate::state::AppState;
use crate::viewport_cache::ViewportCacheKey;

#[derive(Debug, Deserialize)]
pub struct ChoroplethParams {
    pub bbox: Option<String>,
    pub scenario: Option<String>,
    pub column: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/choropleth?bbox=minx,miny,maxx,maxy&scenario=&column=&limit=
pub async fn choropleth_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ChoroplethParams>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let result = query(&state, params).await;
    state
        .metrics
        .record_request(Endpoint::Choropleth, start.elapsed(), result.is_ok())
        .await;
    result
}

async fn query(state: &Arc<AppState>, params: ChoroplethParams) -> Result<Response, ApiError> {
    let column = params
        .column
        .ok_or_else(|| ApiError::BadRequest("missing required parameter: column".into()))?;
    let scenario = params
        .scenario
        .ok_or_else(|| ApiError::BadRequest("missing required parameter: scenario".into()))?;

    // Allowlist checks come before anything else touches the request
    let attributes = state.engine.attributes();
    attributes.column_index(&column)?;
    attributes.scenario_index(&scenario)?;

    let bbox = params
        .bbox
        .as_deref()
        .ok_or_else(|| EngineError::InvalidBbox("missing bbox".into()))
        .and_then(|s| {
            BoundingBox::from_query_string(s).map_err(|e| EngineError::InvalidBbox(e.to_string()))
        })?;
    let limit = params
        .limit
        .as_deref()
        .map(|s| {
            s.trim()
                .parse::<usize>()
                .map_err(|_| ApiError::BadRequest(format!("invalid limit: {}", s)))
        })
        .transpose()?;

    let query = ChoroplethQuery {
        bbox,
        scenario,
        column,
        limit,
    };
    let key = ViewportCacheKey::new(
        &query.bbox,
        &query.scenario,
        &query.column,
        state.engine.effective_limit(limit),
    );

    if let Some(body) = state.viewport_cache.get(&key).await {
        state.metrics.record_viewport_cache(true);
        return Ok(json_bytes(StatusCode::OK, body));
    }
    state.metrics.record_viewport_cache(false);

    // A dropped request drops the guard, which cancels the scan
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let engine = state.engine.clone();
    let (body, truncated, features) = tokio::task::spawn_blocking(move || {
        let choropleth = engine.query_choropleth(&query, &cancel)?;
        let body = serde_json::to_vec(&choropleth)
            .map_err(|e| ApiError::Internal(format!("failed to serialize choropleth: {}", e)))?;
        Ok::<_, ApiError>((Bytes::from(body), choropleth.truncated, choropleth.features.len()))
    })
    .await??;
    guard.disarm();

    if truncated {
        state.metrics.record_truncated_viewport();
    }
    debug!(features, truncated, "Choropleth query served");

    state.viewport_cache.put(key, body.clone()).await;
    Ok(json_bytes(StatusCode::OK, body))
}
