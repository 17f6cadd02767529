//! Writes synthetic MBTiles archives into temp directories.

use crate::fixtures::tiles;
use crate::gpkg::{create_database, SqliteFixture};

/// Builder for an MBTiles archive.
#[derive(Default)]
pub struct MbTilesBuilder {
    metadata: Vec<(String, String)>,
    /// (zoom, column, TMS row, data)
    tiles: Vec<(u32, u32, u32, Vec<u8>)>,
}

impl MbTilesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, name: &str, value: &str) -> Self {
        self.metadata.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a tile addressed in XYZ; it is stored under its TMS row.
    pub fn tile(mut self, z: u32, x: u32, y: u32, data: &[u8]) -> Self {
        let tms_row = (1u32 << z) - 1 - y;
        self.tiles.push((z, x, tms_row, data.to_vec()));
        self
    }

    pub async fn build(self) -> Result<SqliteFixture, sqlx::Error> {
        let (dir, path, pool) = create_database("tiles.mbtiles").await?;

        sqlx::query("CREATE TABLE metadata (name TEXT, value TEXT)")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, \
             tile_row INTEGER, tile_data BLOB)",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row)",
        )
        .execute(&pool)
        .await?;

        for (name, value) in &self.metadata {
            sqlx::query("INSERT INTO metadata (name, value) VALUES (?, ?)")
                .bind(name)
                .bind(value)
                .execute(&pool)
                .await?;
        }
        for (z, x, row, data) in &self.tiles {
            sqlx::query(
                "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?, ?, ?, ?)",
            )
            .bind(*z as i64)
            .bind(*x as i64)
            .bind(*row as i64)
            .bind(data.as_slice())
            .execute(&pool)
            .await?;
        }

        pool.close().await;
        Ok(SqliteFixture::new(dir, path))
    }
}

/// Payload stored for an XYZ tile in the standard archive.
///
/// Each tile gets distinct bytes so tests can tell which row was served.
pub fn standard_tile_payload(z: u32, x: u32, y: u32) -> Vec<u8> {
    let body = format!("tile {}/{}/{}", z, x, y).into_bytes();
    if (z, x, y) == tiles::GZIPPED {
        let mut data = vec![0x1f, 0x8b, 0x08, 0x00];
        data.extend(body);
        data
    } else {
        body
    }
}

/// The standard tile archive described in [`crate::fixtures::tiles`].
pub async fn standard_mbtiles() -> Result<SqliteFixture, sqlx::Error> {
    let mut builder = MbTilesBuilder::new()
        .metadata("name", "Catchments")
        .metadata("description", "Catchment boundaries")
        .metadata("format", "pbf")
        .metadata("minzoom", &tiles::MIN_ZOOM.to_string())
        .metadata("maxzoom", &tiles::MAX_ZOOM.to_string())
        .metadata("bounds", "0.0,0.0,3.0,1.0")
        .metadata("center", "1.5,0.5,4")
        .metadata(
            "json",
            r#"{"vector_layers":[{"id":"catchments","fields":{"catchment_id":"Number"}}]}"#,
        );
    for (z, x, y) in tiles::POPULATED {
        builder = builder.tile(z, x, y, &standard_tile_payload(z, x, y));
    }
    builder.build().await
}
