//! Application state for the catchment API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catchment_engine::GeoEngine;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::config::{CacheConfig, ServiceConfig};
use crate::metrics::MetricsCollector;
use crate::viewport_cache::ViewportCache;

/// Shared application state.
pub struct AppState {
    /// Loaded engine; immutable after startup.
    pub engine: Arc<GeoEngine>,
    pub viewport_cache: ViewportCache,
    pub metrics: MetricsCollector,
    /// Set when a Prometheus recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Load the engine described by `config`. Fails if any data file is
    /// missing or unreadable.
    pub async fn new(config: &ServiceConfig, prometheus: Option<PrometheusHandle>) -> Result<Self> {
        let engine = GeoEngine::load(&config.engine)
            .await
            .with_context(|| {
                format!(
                    "failed to load catchment data from {}",
                    config.engine.geopackage.display()
                )
            })?;

        let summary = engine.summary();
        info!(
            catchments = summary.catchments,
            scenarios = summary.scenarios,
            columns = summary.columns,
            tile_layers = summary.tile_layers.len(),
            "Application state initialized"
        );

        Ok(Self::from_engine(Arc::new(engine), config.cache, prometheus))
    }

    pub fn from_engine(
        engine: Arc<GeoEngine>,
        cache: CacheConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            engine,
            viewport_cache: ViewportCache::new(
                cache.viewport_cache_mb,
                Duration::from_millis(cache.viewport_ttl_ms),
            ),
            metrics: MetricsCollector::new(),
            prometheus,
        }
    }
}
