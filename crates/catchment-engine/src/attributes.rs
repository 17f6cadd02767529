//! Attribute store: per-scenario numeric columns keyed by catchment id.
//!
//! The set of queryable columns is computed once at load time from the
//! scenario tables' own schema. Every lookup by column name goes through
//! [`AttributeStore::column_index`] first, so a name that is not in that
//! set never reaches a query or a map lookup.

use std::collections::{BTreeSet, HashMap};

use catchment_common::{CatchmentId, EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{CatchmentTableConfig, ScenarioConfig};
use crate::gpkg::GeoPackageSource;

/// Observed (min, max) of one column across every scenario table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDomain {
    pub min: f64,
    pub max: f64,
}

impl ColumnDomain {
    fn include(domain: &mut Option<ColumnDomain>, value: f64) {
        match domain {
            Some(d) => {
                d.min = d.min.min(value);
                d.max = d.max.max(value);
            }
            None => *domain = Some(ColumnDomain { min: value, max: value }),
        }
    }
}

/// One attribute value. `NoData` is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeValue {
    Value(f64),
    NoData,
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Value(v) => Some(*v),
            AttributeValue::NoData => None,
        }
    }
}

impl From<Option<f64>> for AttributeValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if !v.is_nan() => AttributeValue::Value(v),
            _ => AttributeValue::NoData,
        }
    }
}

/// Rows of one scenario table: id -> values in column order.
pub type ScenarioTable = HashMap<CatchmentId, Vec<Option<f64>>>;

/// Read-only attribute data for every scenario.
#[derive(Debug)]
pub struct AttributeStore {
    scenarios: Vec<String>,
    columns: Vec<String>,
    column_lookup: HashMap<String, usize>,
    tables: Vec<ScenarioTable>,
    domains: Vec<Option<ColumnDomain>>,
    known_ids: BTreeSet<CatchmentId>,
}

impl AttributeStore {
    /// Build a store from already-loaded tables.
    ///
    /// `tables[i]` holds the rows of `scenarios[i]`, each row's values in
    /// `columns` order. `catchment_ids` are ids known from the catchments
    /// table; ids appearing only in a scenario table are also known.
    pub fn from_tables(
        scenarios: Vec<String>,
        columns: Vec<String>,
        tables: Vec<ScenarioTable>,
        catchment_ids: impl IntoIterator<Item = CatchmentId>,
    ) -> EngineResult<Self> {
        if scenarios.len() != tables.len() {
            return Err(EngineError::Config(format!(
                "{} scenarios but {} attribute tables",
                scenarios.len(),
                tables.len()
            )));
        }

        let column_lookup = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut domains = vec![None; columns.len()];
        for table in &tables {
            for values in table.values() {
                for (domain, value) in domains.iter_mut().zip(values) {
                    if let Some(v) = value.filter(|v| v.is_finite()) {
                        ColumnDomain::include(domain, v);
                    }
                }
            }
        }

        let mut known_ids: BTreeSet<CatchmentId> = catchment_ids.into_iter().collect();
        for table in &tables {
            known_ids.extend(table.keys().copied());
        }

        Ok(Self {
            scenarios,
            columns,
            column_lookup,
            tables,
            domains,
            known_ids,
        })
    }

    /// Load every scenario table from the GeoPackage.
    ///
    /// Queryable columns are the numeric columns common to every scenario
    /// table, in the first table's order, minus the id and geometry columns.
    pub async fn load(
        source: &GeoPackageSource,
        catchments: &CatchmentTableConfig,
        scenarios: &[ScenarioConfig],
        catchment_ids: impl IntoIterator<Item = CatchmentId>,
    ) -> EngineResult<Self> {
        let mut schemas = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let columns = source.table_columns(&scenario.table).await?;
            if columns.is_empty() {
                return Err(EngineError::Database(format!(
                    "scenario table '{}' not found",
                    scenario.table
                )));
            }
            if !columns.iter().any(|c| c.name == catchments.id_column) {
                return Err(EngineError::Database(format!(
                    "scenario table '{}' has no '{}' column",
                    scenario.table, catchments.id_column
                )));
            }
            schemas.push(columns);
        }

        let excluded = [
            catchments.id_column.as_str(),
            catchments.geometry_column.as_str(),
            "fid",
        ];
        let columns: Vec<String> = schemas[0]
            .iter()
            .filter(|c| c.is_numeric() && !excluded.contains(&c.name.as_str()))
            .filter(|c| {
                schemas[1..]
                    .iter()
                    .all(|other| other.iter().any(|o| o.name == c.name && o.is_numeric()))
            })
            .map(|c| c.name.clone())
            .collect();

        for (scenario, schema) in scenarios.iter().zip(&schemas) {
            let dropped = schema
                .iter()
                .filter(|c| c.is_numeric() && !excluded.contains(&c.name.as_str()))
                .filter(|c| !columns.contains(&c.name))
                .count();
            if dropped > 0 {
                warn!(
                    table = %scenario.table,
                    dropped,
                    "Numeric columns not shared by every scenario are not queryable"
                );
            }
        }

        let mut tables = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let rows = source
                .load_scenario_rows(&scenario.table, &catchments.id_column, &columns)
                .await?;
            let mut table = ScenarioTable::with_capacity(rows.len());
            for (id, values) in rows {
                table.insert(id, values);
            }
            tables.push(table);
        }

        let store = Self::from_tables(
            scenarios.iter().map(|s| s.name.clone()).collect(),
            columns,
            tables,
            catchment_ids,
        )?;

        info!(
            scenarios = store.scenarios.len(),
            columns = store.columns.len(),
            catchments = store.known_ids.len(),
            "Loaded attribute store"
        );
        Ok(store)
    }

    /// Scenario names in configured order.
    pub fn list_scenarios(&self) -> &[String] {
        &self.scenarios
    }

    /// The column allowlist, in load order.
    pub fn list_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_valid_column(&self, name: &str) -> bool {
        self.column_lookup.contains_key(name)
    }

    /// Position of an allowed column, or `InvalidColumn`.
    pub fn column_index(&self, name: &str) -> EngineResult<usize> {
        self.column_lookup
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::InvalidColumn(name.to_string()))
    }

    /// Position of a scenario, or `InvalidScenario`.
    pub fn scenario_index(&self, name: &str) -> EngineResult<usize> {
        self.scenarios
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| EngineError::InvalidScenario(name.to_string()))
    }

    pub fn contains(&self, id: CatchmentId) -> bool {
        self.known_ids.contains(&id)
    }

    /// Value of `column` for catchment `id` under `scenario`.
    ///
    /// A known catchment missing from one scenario table reads as `NoData`.
    pub fn get_value(
        &self,
        scenario: &str,
        id: CatchmentId,
        column: &str,
    ) -> EngineResult<AttributeValue> {
        let column = self.column_index(column)?;
        let scenario = self.scenario_index(scenario)?;
        if !self.contains(id) {
            return Err(EngineError::CatchmentNotFound(id));
        }
        Ok(self.value_at(scenario, id, column))
    }

    /// Lookup by pre-validated indices. Unknown ids read as `NoData`.
    pub(crate) fn value_at(&self, scenario: usize, id: CatchmentId, column: usize) -> AttributeValue {
        self.tables
            .get(scenario)
            .and_then(|table| table.get(&id))
            .and_then(|values| values.get(column).copied().flatten())
            .into()
    }

    /// Every column value of one catchment under one scenario, in column order.
    pub(crate) fn row(&self, scenario: usize, id: CatchmentId) -> Vec<AttributeValue> {
        (0..self.columns.len())
            .map(|column| self.value_at(scenario, id, column))
            .collect()
    }

    /// Domain of `column`, `None` when every value is NoData.
    pub fn get_domain(&self, column: &str) -> EngineResult<Option<ColumnDomain>> {
        let index = self.column_index(column)?;
        Ok(self.domains[index])
    }

    /// Every column paired with its domain.
    pub fn domains(&self) -> impl Iterator<Item = (&str, Option<ColumnDomain>)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.domains.iter().copied())
    }
}
