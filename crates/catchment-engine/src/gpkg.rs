//! GeoPackage source: reads catchments and scenario attribute tables at load time.
//!
//! All SQL here is built from configured, identifier-checked table names and
//! from column names read back out of the database schema itself. Nothing a
//! request supplies ever reaches this module.

use std::path::Path;

use catchment_common::{CatchmentId, EngineError, EngineResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::{quote_identifier, CatchmentTableConfig};

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub declared_type: String,
}

impl TableColumn {
    /// Whether SQLite would give this column NUMERIC, INTEGER or REAL affinity.
    pub fn is_numeric(&self) -> bool {
        let t = self.declared_type.to_ascii_uppercase();
        !(t.is_empty()
            || t.contains("CHAR")
            || t.contains("CLOB")
            || t.contains("TEXT")
            || t.contains("BLOB"))
    }
}

/// A raw catchment row before geometry decoding.
#[derive(Debug, Clone)]
pub struct CatchmentRow {
    pub id: CatchmentId,
    pub geometry: Option<Vec<u8>>,
    pub geojson: Option<String>,
}

/// Read-only handle on a GeoPackage file.
pub struct GeoPackageSource {
    pool: SqlitePool,
}

impl GeoPackageSource {
    /// Open an existing GeoPackage read-only.
    pub async fn open(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::Database(format!(
                "GeoPackage not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| EngineError::Database(format!("failed to open GeoPackage: {}", e)))?;

        info!(path = %path.display(), "Opened GeoPackage");
        Ok(Self { pool })
    }

    /// Columns of a table, in declaration order. Empty if the table does not exist.
    pub async fn table_columns(&self, table: &str) -> EngineResult<Vec<TableColumn>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(TableColumn {
                    name: row.try_get("name").map_err(db_error)?,
                    declared_type: row.try_get("type").map_err(db_error)?,
                })
            })
            .collect()
    }

    /// Load every catchment row, ordered by id.
    pub async fn load_catchments(
        &self,
        table: &CatchmentTableConfig,
    ) -> EngineResult<Vec<CatchmentRow>> {
        let columns = self.table_columns(&table.table).await?;
        if columns.is_empty() {
            return Err(EngineError::Database(format!(
                "catchments table '{}' not found",
                table.table
            )));
        }
        for required in [&table.id_column, &table.geometry_column] {
            if !columns.iter().any(|c| &c.name == required) {
                return Err(EngineError::Database(format!(
                    "column '{}' missing from table '{}'",
                    required, table.table
                )));
            }
        }

        // The serialized-geometry cache is optional; without it we derive from the blob.
        let geojson_column = table
            .geojson_column
            .as_ref()
            .filter(|name| columns.iter().any(|c| &c.name == *name));
        if table.geojson_column.is_some() && geojson_column.is_none() {
            debug!(
                table = %table.table,
                "GeoJSON cache column not present, geometry JSON will be derived"
            );
        }

        let geojson_select = match geojson_column {
            Some(name) => quote_identifier(name),
            None => "NULL".to_string(),
        };
        let sql = format!(
            "SELECT {id}, {geom}, {geojson} FROM {table} ORDER BY {id}",
            id = quote_identifier(&table.id_column),
            geom = quote_identifier(&table.geometry_column),
            geojson = geojson_select,
            table = quote_identifier(&table.table),
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(CatchmentRow {
                    id: row.try_get_unchecked::<i64, _>(0).map_err(db_error)?,
                    geometry: row
                        .try_get_unchecked::<Option<Vec<u8>>, _>(1)
                        .map_err(db_error)?,
                    geojson: row
                        .try_get_unchecked::<Option<String>, _>(2)
                        .map_err(db_error)?,
                })
            })
            .collect()
    }

    /// Load `columns` of a scenario table keyed by `id_column`.
    ///
    /// Returned rows carry values in the same order as `columns`; NULL and
    /// NaN both read as `None`.
    pub async fn load_scenario_rows(
        &self,
        table: &str,
        id_column: &str,
        columns: &[String],
    ) -> EngineResult<Vec<(CatchmentId, Vec<Option<f64>>)>> {
        let mut select = vec![quote_identifier(id_column)];
        select.extend(columns.iter().map(|c| quote_identifier(c)));
        let sql = format!(
            "SELECT {} FROM {}",
            select.join(", "),
            quote_identifier(table)
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(|row| scenario_row(row, columns.len()))
            .collect()
    }

    /// Close the pool. Everything the engine needs is in memory after load.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn scenario_row(
    row: &SqliteRow,
    num_columns: usize,
) -> EngineResult<(CatchmentId, Vec<Option<f64>>)> {
    let id = row.try_get_unchecked::<i64, _>(0).map_err(db_error)?;
    let mut values = Vec::with_capacity(num_columns);
    for i in 0..num_columns {
        let value = row
            .try_get_unchecked::<Option<f64>, _>(i + 1)
            .map_err(db_error)?
            .filter(|v| !v.is_nan());
        values.push(value);
    }
    Ok((id, values))
}

fn db_error(e: sqlx::Error) -> EngineError {
    EngineError::Database(e.to_string())
}
