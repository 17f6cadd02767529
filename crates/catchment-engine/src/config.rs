//! Configuration for the catchment engine.

use std::path::{Path, PathBuf};

use catchment_common::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Default cap on features returned by one viewport query.
pub const DEFAULT_VIEWPORT_LIMIT: usize = 2000;

/// Configuration for loading the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the GeoPackage holding catchments and scenario tables.
    pub geopackage: PathBuf,

    /// Layout of the catchments table.
    #[serde(default)]
    pub catchments: CatchmentTableConfig,

    /// Scenario attribute tables, in presentation order.
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioConfig>,

    /// Maximum features returned by one viewport query.
    #[serde(default = "default_viewport_limit")]
    pub viewport_limit: usize,

    /// Pre-built vector tile archives, one per layer.
    #[serde(default)]
    pub tiles: Vec<TileLayerConfig>,

    /// URL template advertised in TileJSON; `{layer}` is substituted.
    #[serde(default = "default_tile_url_template")]
    pub tile_url_template: String,
}

/// Table and column names of the catchments table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchmentTableConfig {
    #[serde(default = "default_catchments_table")]
    pub table: String,

    #[serde(default = "default_id_column")]
    pub id_column: String,

    #[serde(default = "default_geometry_column")]
    pub geometry_column: String,

    /// Optional column of pre-serialized GeoJSON geometry.
    #[serde(default = "default_geojson_column")]
    pub geojson_column: Option<String>,
}

impl Default for CatchmentTableConfig {
    fn default() -> Self {
        Self {
            table: default_catchments_table(),
            id_column: default_id_column(),
            geometry_column: default_geometry_column(),
            geojson_column: default_geojson_column(),
        }
    }
}

/// A named scenario backed by one attribute table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub name: String,
    pub table: String,
}

/// A tile layer backed by an MBTiles archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileLayerConfig {
    pub layer: String,
    pub path: PathBuf,
}

impl EngineConfig {
    /// Config for a GeoPackage with every other setting at its default.
    pub fn new(geopackage: impl Into<PathBuf>) -> Self {
        Self {
            geopackage: geopackage.into(),
            catchments: CatchmentTableConfig::default(),
            scenarios: default_scenarios(),
            viewport_limit: default_viewport_limit(),
            tiles: Vec::new(),
            tile_url_template: default_tile_url_template(),
        }
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> EngineResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| EngineError::Config(format!("failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.viewport_limit == 0 {
            return Err(EngineError::Config("viewport_limit must be > 0".into()));
        }
        if self.scenarios.is_empty() {
            return Err(EngineError::Config("at least one scenario is required".into()));
        }

        let c = &self.catchments;
        for ident in [&c.table, &c.id_column, &c.geometry_column]
            .into_iter()
            .chain(c.geojson_column.as_ref())
            .chain(self.scenarios.iter().map(|s| &s.table))
        {
            check_identifier(ident)?;
        }

        for (i, scenario) in self.scenarios.iter().enumerate() {
            if self.scenarios[..i].iter().any(|s| s.name == scenario.name) {
                return Err(EngineError::Config(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }
        for (i, layer) in self.tiles.iter().enumerate() {
            if self.tiles[..i].iter().any(|l| l.layer == layer.layer) {
                return Err(EngineError::Config(format!(
                    "duplicate tile layer '{}'",
                    layer.layer
                )));
            }
        }
        Ok(())
    }
}

/// Accept only plain SQL identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn check_identifier(name: &str) -> EngineResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(EngineError::Config(format!("invalid SQL identifier '{}'", name)))
    }
}

/// Double-quote an identifier for SQLite, escaping embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn default_catchments_table() -> String {
    "catchments".to_string()
}

fn default_id_column() -> String {
    "catchment_id".to_string()
}

fn default_geometry_column() -> String {
    "geom".to_string()
}

fn default_geojson_column() -> Option<String> {
    Some("geojson".to_string())
}

fn default_scenarios() -> Vec<ScenarioConfig> {
    vec![
        ScenarioConfig {
            name: "reference".to_string(),
            table: "reference".to_string(),
        },
        ScenarioConfig {
            name: "current".to_string(),
            table: "current".to_string(),
        },
    ]
}

fn default_viewport_limit() -> usize {
    DEFAULT_VIEWPORT_LIMIT
}

fn default_tile_url_template() -> String {
    "/tiles/{layer}/{z}/{x}/{y}".to_string()
}
