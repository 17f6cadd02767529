//! MBTiles tile archives and their TileJSON descriptors.
//!
//! Archives store rows in TMS order (row 0 at the south edge); requests
//! arrive in XYZ order and are flipped before lookup.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use bytes::Bytes;
use catchment_common::{EngineError, EngineResult, TileCoord};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info, trace};

use crate::config::TileLayerConfig;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Payload format of an archive, from its `format` metadata row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    Pbf,
    Png,
    Jpg,
    Webp,
    Json,
}

impl TileFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pbf" | "mvt" => Some(TileFormat::Pbf),
            "png" => Some(TileFormat::Png),
            "jpg" | "jpeg" => Some(TileFormat::Jpg),
            "webp" => Some(TileFormat::Webp),
            "json" | "geojson" => Some(TileFormat::Json),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Pbf => "application/x-protobuf",
            TileFormat::Png => "image/png",
            TileFormat::Jpg => "image/jpeg",
            TileFormat::Webp => "image/webp",
            TileFormat::Json => "application/json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TileFormat::Pbf => "pbf",
            TileFormat::Png => "png",
            TileFormat::Jpg => "jpg",
            TileFormat::Webp => "webp",
            TileFormat::Json => "json",
        }
    }
}

/// One tile as stored, uninterpreted.
#[derive(Debug, Clone)]
pub struct Tile {
    pub data: Bytes,
    pub format: TileFormat,
}

impl Tile {
    /// Whether the payload is gzip-compressed (common for MVT archives).
    pub fn is_gzipped(&self) -> bool {
        self.data.starts_with(&GZIP_MAGIC)
    }
}

/// TileJSON 3.0.0 descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileJson {
    pub tilejson: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub scheme: String,
    pub tiles: Vec<String>,
    pub minzoom: u32,
    pub maxzoom: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 3]>,
    pub format: TileFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_layers: Option<serde_json::Value>,
}

impl TileJson {
    /// Build a descriptor from MBTiles `metadata` rows.
    ///
    /// `zoom_range` is the populated range of the `tiles` table, used when
    /// the metadata omits `minzoom` or `maxzoom`.
    pub fn from_metadata(
        layer: &str,
        metadata: &BTreeMap<String, String>,
        zoom_range: Option<(u32, u32)>,
        tile_url: String,
    ) -> Self {
        let get = |key: &str| metadata.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let zoom = |key: &str| get(key).and_then(|v| v.parse::<u32>().ok());

        let minzoom = zoom("minzoom")
            .or(zoom_range.map(|(min, _)| min))
            .unwrap_or(0);
        let maxzoom = zoom("maxzoom")
            .or(zoom_range.map(|(_, max)| max))
            .unwrap_or(minzoom)
            .max(minzoom);

        let vector_layers = get("json")
            .and_then(|json| serde_json::from_str::<serde_json::Value>(json).ok())
            .and_then(|mut value| value.get_mut("vector_layers").map(serde_json::Value::take));

        Self {
            tilejson: "3.0.0".to_string(),
            name: get("name").unwrap_or(layer).to_string(),
            description: get("description").map(str::to_string),
            attribution: get("attribution").map(str::to_string),
            version: get("version").map(str::to_string),
            scheme: "xyz".to_string(),
            tiles: vec![tile_url],
            minzoom,
            maxzoom,
            bounds: get("bounds").and_then(parse_floats::<4>),
            center: get("center").and_then(parse_floats::<3>),
            format: get("format")
                .and_then(TileFormat::parse)
                .unwrap_or(TileFormat::Pbf),
            vector_layers,
        }
    }
}

fn parse_floats<const N: usize>(s: &str) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    let mut parts = s.split(',');
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok().filter(|v: &f64| v.is_finite())?;
    }
    parts.next().is_none().then_some(out)
}

/// Read-only handle on one MBTiles archive.
pub struct TileArchive {
    layer: String,
    pool: SqlitePool,
    metadata: TileJson,
}

impl TileArchive {
    pub async fn open(layer: &str, path: &Path, url_template: &str) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::Database(format!(
                "tile archive not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| EngineError::Database(format!("failed to open tile archive: {}", e)))?;

        let rows = sqlx::query("SELECT name, value FROM metadata")
            .fetch_all(&pool)
            .await
            .map_err(db_error)?;
        let mut metadata = BTreeMap::new();
        for row in &rows {
            let name: String = row.try_get(0).map_err(db_error)?;
            let value: Option<String> = row.try_get(1).map_err(db_error)?;
            metadata.insert(name, value.unwrap_or_default());
        }

        let zoom_range: (Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT MIN(zoom_level), MAX(zoom_level) FROM tiles")
                .fetch_one(&pool)
                .await
                .map_err(db_error)?;
        let zoom_range = zoom_range_from_db(zoom_range);

        let tile_url = url_template.replace("{layer}", layer);
        let metadata = TileJson::from_metadata(layer, &metadata, zoom_range, tile_url);

        info!(
            layer = %layer,
            path = %path.display(),
            minzoom = metadata.minzoom,
            maxzoom = metadata.maxzoom,
            format = metadata.format.as_str(),
            "Opened tile archive"
        );

        Ok(Self {
            layer: layer.to_string(),
            pool,
            metadata,
        })
    }

    pub fn metadata(&self) -> &TileJson {
        &self.metadata
    }

    /// Fetch one tile by XYZ coordinate.
    ///
    /// Coordinates outside the tile matrix, outside the archive's zoom
    /// range or simply absent all yield `TileNotFound`.
    pub async fn get_tile(&self, coord: TileCoord) -> EngineResult<Tile> {
        let not_found = || EngineError::TileNotFound {
            layer: self.layer.clone(),
            z: coord.z,
            x: coord.x,
            y: coord.y,
        };

        let Some(tms_row) = coord.tms_row() else {
            trace!(layer = %self.layer, tile = %coord.cache_key(), "Tile outside matrix");
            return Err(not_found());
        };
        if coord.z < self.metadata.minzoom || coord.z > self.metadata.maxzoom {
            trace!(layer = %self.layer, tile = %coord.cache_key(), "Tile outside zoom range");
            return Err(not_found());
        }

        let row = sqlx::query(
            "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
        )
        .bind(coord.z as i64)
        .bind(coord.x as i64)
        .bind(tms_row as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            trace!(layer = %self.layer, tile = %coord.cache_key(), "Tile not in archive");
            return Err(not_found());
        };
        let data: Vec<u8> = row.try_get(0).map_err(db_error)?;

        Ok(Tile {
            data: Bytes::from(data),
            format: self.metadata.format,
        })
    }
}

/// All configured tile archives, by layer name.
#[derive(Default)]
pub struct TileServer {
    archives: HashMap<String, TileArchive>,
}

impl TileServer {
    pub async fn open(layers: &[TileLayerConfig], url_template: &str) -> EngineResult<Self> {
        let mut archives = HashMap::with_capacity(layers.len());
        for layer in layers {
            let archive = TileArchive::open(&layer.layer, &layer.path, url_template).await?;
            archives.insert(layer.layer.clone(), archive);
        }
        debug!(layers = archives.len(), "Tile server ready");
        Ok(Self { archives })
    }

    /// Layer names, sorted.
    pub fn layers(&self) -> Vec<&str> {
        let mut layers: Vec<&str> = self.archives.keys().map(String::as_str).collect();
        layers.sort_unstable();
        layers
    }

    fn archive(&self, layer: &str) -> EngineResult<&TileArchive> {
        self.archives
            .get(layer)
            .ok_or_else(|| EngineError::LayerNotFound(layer.to_string()))
    }

    pub async fn get_tile(&self, layer: &str, coord: TileCoord) -> EngineResult<Tile> {
        self.archive(layer)?.get_tile(coord).await
    }

    pub fn metadata(&self, layer: &str) -> EngineResult<&TileJson> {
        Ok(self.archive(layer)?.metadata())
    }
}

/// Populated zoom range from `MIN`/`MAX(zoom_level)`; values that do not fit
/// a zoom level are treated as absent.
fn zoom_range_from_db(range: (Option<i64>, Option<i64>)) -> Option<(u32, u32)> {
    match range {
        (Some(min), Some(max)) => Some((u32::try_from(min).ok()?, u32::try_from(max).ok()?)),
        _ => None,
    }
}

fn db_error(e: sqlx::Error) -> EngineError {
    EngineError::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_zoom_range_out_of_range_is_absent() {
        assert_eq!(zoom_range_from_db((Some(0), Some(6))), Some((0, 6)));
        assert_eq!(zoom_range_from_db((Some(-1), Some(6))), None);
        assert_eq!(zoom_range_from_db((Some(0), Some(i64::from(u32::MAX) + 1))), None);
        assert_eq!(zoom_range_from_db((None, None)), None);
    }

    #[test]
    fn test_tilejson_from_metadata() {
        let md = metadata(&[
            ("name", "Catchments"),
            ("format", "pbf"),
            ("minzoom", "4"),
            ("maxzoom", "12"),
            ("bounds", "140.0,-39.0,150.0,-33.5"),
            ("center", "145.0,-37.0,8"),
            ("json", r#"{"vector_layers":[{"id":"catchments","fields":{"catchment_id":"Number"}}]}"#),
        ]);
        let tj = TileJson::from_metadata("catchments", &md, None, "/tiles/catchments/{z}/{x}/{y}".into());

        assert_eq!(tj.tilejson, "3.0.0");
        assert_eq!(tj.name, "Catchments");
        assert_eq!((tj.minzoom, tj.maxzoom), (4, 12));
        assert_eq!(tj.bounds, Some([140.0, -39.0, 150.0, -33.5]));
        assert_eq!(tj.center, Some([145.0, -37.0, 8.0]));
        assert_eq!(tj.format, TileFormat::Pbf);
        assert_eq!(tj.vector_layers.unwrap()[0]["id"], "catchments");
    }

    #[test]
    fn test_tilejson_falls_back_to_tile_range() {
        let md = metadata(&[("bounds", "not,a,bbox"), ("format", "png")]);
        let tj = TileJson::from_metadata("basins", &md, Some((2, 9)), String::new());
        assert_eq!(tj.name, "basins");
        assert_eq!((tj.minzoom, tj.maxzoom), (2, 9));
        assert_eq!(tj.bounds, None);
        assert_eq!(tj.format.content_type(), "image/png");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(TileFormat::parse("MVT"), Some(TileFormat::Pbf));
        assert_eq!(TileFormat::parse("jpeg"), Some(TileFormat::Jpg));
        assert_eq!(TileFormat::parse("tiff"), None);
    }

    #[test]
    fn test_gzip_detection() {
        let tile = Tile {
            data: Bytes::from_static(&[0x1f, 0x8b, 0x08, 0x00]),
            format: TileFormat::Pbf,
        };
        assert!(tile.is_gzipped());
        let tile = Tile {
            data: Bytes::from_static(&[0x1a, 0x02]),
            format: TileFormat::Pbf,
        };
        assert!(!tile.is_gzipped());
    }
}
