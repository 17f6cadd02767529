//! Health, readiness and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use catchment_engine::EngineSummary;
use serde::Serialize;

use super::common::json_response;
use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub engine: EngineSummary,
    pub viewport_limit: usize,
    pub viewport_cache_hit_rate: f64,
    pub metrics: MetricsSnapshot,
}

/// GET /health - Basic health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /ready - Engine loaded, with load-time counts
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    // State only exists once the engine has loaded successfully
    let response = ReadyResponse {
        ready: true,
        engine: state.engine.summary(),
        viewport_limit: state.engine.viewport_limit(),
        viewport_cache_hit_rate: state.viewport_cache.stats().hit_rate(),
        metrics: state.metrics.snapshot().await,
    };
    json_response(StatusCode::OK, &response)
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    state
        .metrics
        .publish_cache_stats(state.viewport_cache.stats());

    let body = state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
