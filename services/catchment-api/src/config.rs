//! Service configuration.
//!
//! One YAML file holds the engine settings under `engine:` and the
//! API-layer cache settings under `cache:`.

use std::path::Path;

use anyhow::{Context, Result};
use catchment_engine::EngineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub engine: EngineConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Viewport response cache settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an identical viewport query is served from cache.
    #[serde(default = "default_viewport_ttl_ms")]
    pub viewport_ttl_ms: u64,

    /// Memory cap for cached viewport responses.
    #[serde(default = "default_viewport_cache_mb")]
    pub viewport_cache_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            viewport_ttl_ms: default_viewport_ttl_ms(),
            viewport_cache_mb: default_viewport_cache_mb(),
        }
    }
}

fn default_viewport_ttl_ms() -> u64 {
    500
}

fn default_viewport_cache_mb() -> usize {
    64
}

impl ServiceConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        // Relative data paths are resolved against the config file's directory
        Ok(config.resolve_paths(path.parent().unwrap_or_else(|| Path::new("."))))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("failed to parse YAML")?;
        config.engine.validate()?;
        Ok(config)
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        if self.engine.geopackage.is_relative() {
            self.engine.geopackage = base.join(&self.engine.geopackage);
        }
        for layer in &mut self.engine.tiles {
            if layer.path.is_relative() {
                layer.path = base.join(&layer.path);
            }
        }
        self
    }
}
