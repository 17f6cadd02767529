//! Request metrics.
//!
//! Counters and histograms go to the global `metrics` recorder (exported
//! at `/metrics` when Prometheus is installed). A small in-process
//! collector keeps timing summaries that `/ready` reports as JSON.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::viewport_cache::ViewportCacheStats;

/// Endpoint families with their own timing series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Choropleth,
    Detail,
    Dissolve,
    Tile,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Choropleth => "choropleth",
            Endpoint::Detail => "detail",
            Endpoint::Dissolve => "dissolve",
            Endpoint::Tile => "tile",
        }
    }
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            count: self.count,
            avg_ms: if self.count == 0 {
                0.0
            } else {
                (self.total_us as f64 / self.count as f64) / 1000.0
            },
            min_ms: self.min_us as f64 / 1000.0,
            max_ms: self.max_us as f64 / 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingSnapshot {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub errors: u64,
    pub truncated_viewports: u64,
    pub choropleth: TimingSnapshot,
    pub detail: TimingSnapshot,
    pub dissolve: TimingSnapshot,
    pub tile: TimingSnapshot,
}

/// Metrics collector for the catchment API.
#[derive(Debug)]
pub struct MetricsCollector {
    requests: AtomicU64,
    errors: AtomicU64,
    truncated_viewports: AtomicU64,
    choropleth_times: RwLock<TimingStats>,
    detail_times: RwLock<TimingStats>,
    dissolve_times: RwLock<TimingStats>,
    tile_times: RwLock<TimingStats>,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            truncated_viewports: AtomicU64::new(0),
            choropleth_times: RwLock::new(TimingStats::default()),
            detail_times: RwLock::new(TimingStats::default()),
            dissolve_times: RwLock::new(TimingStats::default()),
            tile_times: RwLock::new(TimingStats::default()),
            start_time: Instant::now(),
        }
    }

    fn timings(&self, endpoint: Endpoint) -> &RwLock<TimingStats> {
        match endpoint {
            Endpoint::Choropleth => &self.choropleth_times,
            Endpoint::Detail => &self.detail_times,
            Endpoint::Dissolve => &self.dissolve_times,
            Endpoint::Tile => &self.tile_times,
        }
    }

    /// Record one completed request.
    pub async fn record_request(&self, endpoint: Endpoint, elapsed: Duration, success: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("catchment_requests_total", "endpoint" => endpoint.as_str()).increment(1);
        histogram!("catchment_request_duration_seconds", "endpoint" => endpoint.as_str())
            .record(elapsed.as_secs_f64());

        if !success {
            self.errors.fetch_add(1, Ordering::Relaxed);
            counter!("catchment_request_errors_total", "endpoint" => endpoint.as_str())
                .increment(1);
        }

        self.timings(endpoint)
            .write()
            .await
            .record(elapsed.as_micros() as u64);
    }

    pub fn record_truncated_viewport(&self) {
        self.truncated_viewports.fetch_add(1, Ordering::Relaxed);
        counter!("catchment_viewport_truncated_total").increment(1);
    }

    pub fn record_viewport_cache(&self, hit: bool) {
        if hit {
            counter!("catchment_viewport_cache_hits_total").increment(1);
        } else {
            counter!("catchment_viewport_cache_misses_total").increment(1);
        }
    }

    /// Publish viewport cache statistics as gauges.
    pub fn publish_cache_stats(&self, stats: &ViewportCacheStats) {
        gauge!("catchment_viewport_cache_hit_rate_percent").set(stats.hit_rate());
        gauge!("catchment_viewport_cache_entries")
            .set(stats.entry_count.load(Ordering::Relaxed) as f64);
        gauge!("catchment_viewport_cache_size_bytes")
            .set(stats.size_bytes.load(Ordering::Relaxed) as f64);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            truncated_viewports: self.truncated_viewports.load(Ordering::Relaxed),
            choropleth: self.choropleth_times.read().await.snapshot(),
            detail: self.detail_times.read().await.snapshot(),
            dissolve: self.dissolve_times.read().await.snapshot(),
            tile: self.tile_times.read().await.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_request_updates_snapshot() {
        let metrics = MetricsCollector::new();
        metrics
            .record_request(Endpoint::Dissolve, Duration::from_millis(4), true)
            .await;
        metrics
            .record_request(Endpoint::Dissolve, Duration::from_millis(2), false)
            .await;
        metrics.record_truncated_viewport();

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.truncated_viewports, 1);
        assert_eq!(snapshot.dissolve.count, 2);
        assert_eq!(snapshot.dissolve.min_ms, 2.0);
        assert_eq!(snapshot.dissolve.max_ms, 4.0);
        assert_eq!(snapshot.dissolve.avg_ms, 3.0);
        assert_eq!(snapshot.tile.count, 0);
        assert_eq!(snapshot.tile.avg_ms, 0.0);
    }
}
