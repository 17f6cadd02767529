//! Catchment API library.
//!
//! HTTP surface over the catchment engine: scenario and column catalogs,
//! viewport choropleths, catchment detail, dissolves and vector tiles.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod viewport_cache;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Catalog
        .route("/api/scenarios", get(handlers::catalog::scenarios_handler))
        .route("/api/columns", get(handlers::catalog::columns_handler))
        // Queries
        .route(
            "/api/choropleth",
            get(handlers::choropleth::choropleth_handler),
        )
        .route(
            "/api/catchments/:id",
            get(handlers::catchments::catchment_handler),
        )
        .route("/api/dissolve", post(handlers::dissolve::dissolve_handler))
        // Tiles
        .route("/tiles/:layer", get(handlers::tiles::tilejson_handler))
        .route(
            "/tiles/:layer/:z/:x/:y",
            get(handlers::tiles::tile_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
