//! Writes synthetic GeoPackage databases into temp directories.

use std::path::{Path, PathBuf};

use gpkg_geometry::{encode_gpkg, CatchmentGeometry, EncodeOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tempfile::TempDir;

use crate::fixtures::{attributes, catchments};
use crate::generators::square;

/// A database file that lives as long as this value.
pub struct SqliteFixture {
    dir: TempDir,
    path: PathBuf,
}

impl SqliteFixture {
    pub(crate) fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

pub(crate) async fn create_database(
    file_name: &str,
) -> Result<(TempDir, PathBuf, SqlitePool), sqlx::Error> {
    let dir = TempDir::new()?;
    let path = dir.path().join(file_name);
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok((dir, path, pool))
}

struct CatchmentEntry {
    id: i64,
    blob: Option<Vec<u8>>,
    geojson: Option<String>,
}

struct ScenarioEntry {
    table: String,
    /// (name, declared SQL type)
    columns: Vec<(String, String)>,
    rows: Vec<(i64, Vec<Option<f64>>)>,
}

/// Builder for a GeoPackage with a catchments table and scenario tables.
///
/// Table layout matches the engine defaults: `catchments(fid, catchment_id,
/// geom, geojson)` and one `<scenario>(fid, catchment_id, ...)` per scenario.
#[derive(Default)]
pub struct GeoPackageBuilder {
    catchments: Vec<CatchmentEntry>,
    scenarios: Vec<ScenarioEntry>,
    with_geojson_column: bool,
}

impl GeoPackageBuilder {
    pub fn new() -> Self {
        Self {
            with_geojson_column: true,
            ..Default::default()
        }
    }

    /// Omit the `geojson` cache column from the catchments table.
    pub fn without_geojson_column(mut self) -> Self {
        self.with_geojson_column = false;
        self
    }

    /// Add a catchment encoded with default options.
    pub fn catchment(self, id: i64, geometry: &CatchmentGeometry) -> Self {
        self.catchment_blob(id, Some(encode_gpkg(geometry, EncodeOptions::default())))
    }

    /// Add a catchment with an arbitrary (possibly corrupt or NULL) blob.
    pub fn catchment_blob(mut self, id: i64, blob: Option<Vec<u8>>) -> Self {
        self.catchments.push(CatchmentEntry {
            id,
            blob,
            geojson: None,
        });
        self
    }

    /// Set the cached GeoJSON text of the most recently added catchment.
    pub fn with_cached_geojson(mut self, geojson: &str) -> Self {
        if let Some(last) = self.catchments.last_mut() {
            last.geojson = Some(geojson.to_string());
        }
        self
    }

    /// Add a scenario table. `columns` are (name, SQL type) pairs.
    pub fn scenario(mut self, table: &str, columns: &[(&str, &str)]) -> Self {
        self.scenarios.push(ScenarioEntry {
            table: table.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows: Vec::new(),
        });
        self
    }

    /// Add a row to a scenario table, values in column order.
    pub fn row(mut self, table: &str, id: i64, values: &[Option<f64>]) -> Self {
        if let Some(scenario) = self.scenarios.iter_mut().find(|s| s.table == table) {
            scenario.rows.push((id, values.to_vec()));
        }
        self
    }

    pub async fn build(self) -> Result<SqliteFixture, sqlx::Error> {
        let (dir, path, pool) = create_database("catchments.gpkg").await?;

        let geojson_decl = if self.with_geojson_column {
            ", geojson TEXT"
        } else {
            ""
        };
        sqlx::query(&format!(
            "CREATE TABLE catchments (fid INTEGER PRIMARY KEY AUTOINCREMENT, \
             catchment_id INTEGER NOT NULL, geom BLOB{})",
            geojson_decl
        ))
        .execute(&pool)
        .await?;

        let mut tx = pool.begin().await?;
        for entry in &self.catchments {
            if self.with_geojson_column {
                sqlx::query("INSERT INTO catchments (catchment_id, geom, geojson) VALUES (?, ?, ?)")
                    .bind(entry.id)
                    .bind(entry.blob.as_deref())
                    .bind(entry.geojson.as_deref())
                    .execute(&mut *tx)
                    .await?;
            } else {
                sqlx::query("INSERT INTO catchments (catchment_id, geom) VALUES (?, ?)")
                    .bind(entry.id)
                    .bind(entry.blob.as_deref())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for scenario in &self.scenarios {
            let decls: String = scenario
                .columns
                .iter()
                .map(|(name, ty)| format!(", \"{}\" {}", name, ty))
                .collect();
            sqlx::query(&format!(
                "CREATE TABLE \"{}\" (fid INTEGER PRIMARY KEY AUTOINCREMENT, \
                 catchment_id INTEGER NOT NULL{})",
                scenario.table, decls
            ))
            .execute(&mut *tx)
            .await?;

            let names: String = scenario
                .columns
                .iter()
                .map(|(name, _)| format!(", \"{}\"", name))
                .collect();
            let params: String = scenario.columns.iter().map(|_| ", ?").collect();
            let insert = format!(
                "INSERT INTO \"{}\" (catchment_id{}) VALUES (?{})",
                scenario.table, names, params
            );
            for (id, values) in &scenario.rows {
                let mut query = sqlx::query(&insert).bind(*id);
                for i in 0..scenario.columns.len() {
                    query = query.bind(values.get(i).copied().flatten());
                }
                query.execute(&mut *tx).await?;
            }
        }
        tx.commit().await?;

        pool.close().await;
        Ok(SqliteFixture { dir, path })
    }
}

/// The standard three-square dataset described in [`crate::fixtures`].
pub async fn standard_geopackage() -> Result<SqliteFixture, sqlx::Error> {
    let columns = [
        (attributes::RAINFALL, "REAL"),
        (attributes::LABEL, "TEXT"),
        (attributes::RUNOFF, "DOUBLE"),
    ];
    let mut builder = GeoPackageBuilder::new()
        .scenario("current", &columns)
        .scenario("reference", &columns);

    for (i, id) in catchments::SQUARE_IDS.into_iter().enumerate() {
        builder = builder
            .catchment(id, &square(i as f64, 0.0, 1.0))
            .row(
                "current",
                id,
                &[
                    Some(attributes::RAINFALL_CURRENT[i]),
                    None,
                    attributes::RUNOFF_CURRENT[i],
                ],
            )
            .row(
                "reference",
                id,
                &[
                    Some(attributes::RAINFALL_REFERENCE[i]),
                    None,
                    attributes::RUNOFF_REFERENCE[i],
                ],
            );
    }

    builder
        .catchment_blob(catchments::MALFORMED_ID, Some(b"GP\0\x01garbage".to_vec()))
        .catchment_blob(catchments::NULL_GEOMETRY_ID, None)
        .build()
        .await
}

/// An `n` x `n` grid of unit squares with `rainfall = id` in both scenarios.
pub async fn grid_geopackage(n: usize) -> Result<SqliteFixture, sqlx::Error> {
    let columns = [(attributes::RAINFALL, "REAL")];
    let mut builder = GeoPackageBuilder::new()
        .scenario("current", &columns)
        .scenario("reference", &columns);
    for (id, geometry) in crate::generators::square_grid(n, 1.0) {
        builder = builder
            .catchment(id, &geometry)
            .row("current", id, &[Some(id as f64)])
            .row("reference", id, &[Some(id as f64 * 2.0)]);
    }
    builder.build().await
}
