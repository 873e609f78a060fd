//! Shared test utilities for integration tests
//!
//! `RecordingEngine` is an in-memory backend good enough to execute the
//! planner's scope fetches: it filters, groups (with rollups and grouping
//! sets), aggregates and records every `DatabaseQuery` it receives so tests
//! can assert on backend traffic.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use cubeplan::measure::{Aggregation, CompiledAggregatedMeasure, CompiledMeasure};
use cubeplan::table::Header;
use cubeplan::{
    Catalog, ColumnarTable, DatabaseQuery, Datastore, EngineError, FieldType, QueryEngine,
    QueryScope, TypedField, Value,
};

pub struct InMemoryDatastore {
    catalog: Catalog,
    rows: Mutex<HashMap<String, Vec<Vec<Value>>>>,
}

impl Datastore for InMemoryDatastore {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// In-memory engine recording every query it executes
pub struct RecordingEngine {
    datastore: InMemoryDatastore,
    calls: Mutex<Vec<DatabaseQuery>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingEngine {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            datastore: InMemoryDatastore {
                catalog,
                rows: Mutex::new(HashMap::new()),
            },
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    pub fn load(&self, store: &str, rows: Vec<Vec<Value>>) {
        self.datastore
            .rows
            .lock()
            .entry(store.to_string())
            .or_default()
            .extend(rows);
    }

    /// Make every `execute` sleep, to widen concurrency windows
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<DatabaseQuery> {
        self.calls.lock().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    /// Aliases fetched by the i-th backend call
    pub fn fetched_aliases(&self, call: usize) -> Vec<String> {
        self.calls.lock()[call]
            .measures
            .iter()
            .map(|m| m.alias().to_string())
            .collect()
    }
}

impl QueryEngine for RecordingEngine {
    fn execute(&self, query: &DatabaseQuery) -> Result<ColumnarTable, EngineError> {
        self.calls.lock().push(query.clone());
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }

        let store = self
            .datastore
            .catalog
            .store(&query.scope.store)
            .ok_or_else(|| EngineError::unknown_table(&query.scope.store))?;
        let field_names: Vec<String> = store.fields.iter().map(|f| f.name.clone()).collect();
        let rows = self
            .datastore
            .rows
            .lock()
            .get(&query.scope.store)
            .cloned()
            .unwrap_or_default();
        aggregate(&query.scope, &query.measures, &field_names, &rows)
    }

    fn execute_raw_sql(&self, sql: &str) -> Result<ColumnarTable, EngineError> {
        Ok(ColumnarTable::new(
            vec![Header::dimension("sql", FieldType::Str)],
            vec![vec![Value::from(sql)]],
        ))
    }

    fn datastore(&self) -> &dyn Datastore {
        &self.datastore
    }
}

/// Group and aggregate `rows` for one scope, the way a SQL backend would:
/// one block of output rows per grouping set, nulls in the dimensions a set
/// does not group by, base aggregation first.
fn aggregate(
    scope: &QueryScope,
    measures: &[CompiledMeasure],
    field_names: &[String],
    rows: &[Vec<Value>],
) -> Result<ColumnarTable, EngineError> {
    let index_of = |f: &TypedField| field_names.iter().position(|n| *n == f.name);
    let cell = |row: &Vec<Value>, f: &TypedField| -> Option<Value> {
        index_of(f).map(|i| row[i].clone())
    };

    let filtered: Vec<&Vec<Value>> = rows
        .iter()
        .filter(|row| match &scope.criteria {
            Some(criteria) => criteria.matches(&|f| cell(row, f)),
            None => true,
        })
        .collect();

    let sets = grouping_sets(scope);
    let mut headers: Vec<Header> = scope
        .columns
        .iter()
        .map(|f| Header::dimension(f.name.as_str(), f.field_type))
        .collect();
    for measure in measures {
        headers.push(Header::measure(measure.alias(), measure.result_type()));
    }
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

    for set in &sets {
        // Group rows by the set's fields, first-appearance order.
        let mut groups: Vec<(Vec<Value>, Vec<&Vec<Value>>)> = Vec::new();
        for row in &filtered {
            let key: Vec<Value> = set
                .iter()
                .map(|f| cell(row, f).unwrap_or(Value::Null))
                .collect();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }
        for (key, members) in &groups {
            for (ci, field) in scope.columns.iter().enumerate() {
                let value = match set.iter().position(|f| f == field) {
                    Some(i) => key[i].clone(),
                    None => Value::Null,
                };
                columns[ci].push(value);
            }
            for (mi, measure) in measures.iter().enumerate() {
                let value = aggregate_measure(measure, members, set, &cell)?;
                columns[scope.columns.len() + mi].push(value);
            }
        }
    }

    let mut table = ColumnarTable::new(headers, columns);
    if scope.limit >= 0 {
        table.truncate(scope.limit as usize);
    }
    Ok(table)
}

/// The grouping sets a scope expands to: explicit sets win, otherwise a
/// rollup produces the full grouping first and then each shorter prefix.
fn grouping_sets(scope: &QueryScope) -> Vec<Vec<TypedField>> {
    if !scope.grouping_sets.is_empty() {
        // Base aggregation first, then the declared sets (skipping a
        // duplicate of the full grouping).
        let mut sets = vec![scope.columns.clone()];
        for set in &scope.grouping_sets {
            if *set != scope.columns {
                sets.push(set.clone());
            }
        }
        return sets;
    }
    if !scope.rollup.is_empty() {
        let fixed: Vec<TypedField> = scope
            .columns
            .iter()
            .filter(|c| !scope.rollup.contains(c))
            .cloned()
            .collect();
        return (0..=scope.rollup.len())
            .rev()
            .map(|k| {
                let mut set = fixed.clone();
                set.extend(scope.rollup[..k].iter().cloned());
                set
            })
            .collect();
    }
    vec![scope.columns.clone()]
}

fn aggregate_measure(
    measure: &CompiledMeasure,
    members: &[&Vec<Value>],
    set: &[TypedField],
    cell: &dyn Fn(&Vec<Value>, &TypedField) -> Option<Value>,
) -> Result<Value, EngineError> {
    let CompiledMeasure::Aggregated(m) = measure else {
        return Err(EngineError::permanent(format!(
            "measure '{}' is not a primitive aggregate",
            measure.alias()
        )));
    };
    let members: Vec<&&Vec<Value>> = members
        .iter()
        .filter(|row| match &m.criteria {
            Some(criteria) => criteria.matches(&|f| cell(row, f)),
            None => true,
        })
        .collect();
    Ok(apply_aggregation(m, &members, set, cell))
}

fn apply_aggregation(
    m: &CompiledAggregatedMeasure,
    members: &[&&Vec<Value>],
    set: &[TypedField],
    cell: &dyn Fn(&Vec<Value>, &TypedField) -> Option<Value>,
) -> Value {
    match m.aggregation {
        Aggregation::Count => Value::Int(members.len() as i64),
        Aggregation::Grouping => {
            Value::Int(if set.contains(&m.field) { 0 } else { 1 })
        }
        Aggregation::CountDistinct => {
            let mut seen: Vec<Value> = Vec::new();
            for row in members {
                if let Some(v) = cell(row, &m.field) {
                    if !v.is_null() && !seen.contains(&v) {
                        seen.push(v);
                    }
                }
            }
            Value::Int(seen.len() as i64)
        }
        Aggregation::Sum | Aggregation::Avg | Aggregation::Min | Aggregation::Max => {
            let values: Vec<Value> = members
                .iter()
                .filter_map(|row| cell(row, &m.field))
                .filter(|v| !v.is_null())
                .collect();
            if values.is_empty() {
                return Value::Null;
            }
            match m.aggregation {
                Aggregation::Sum => values
                    .iter()
                    .fold(Value::Int(0), |acc, v| acc.add(v)),
                Aggregation::Avg => {
                    let sum = values.iter().fold(Value::Int(0), |acc, v| acc.add(v));
                    sum.div(&Value::Int(values.len() as i64))
                }
                Aggregation::Min => values
                    .iter()
                    .cloned()
                    .reduce(|a, b| if a.compare(&b).is_le() { a } else { b })
                    .unwrap(),
                Aggregation::Max => values
                    .iter()
                    .cloned()
                    .reduce(|a, b| if a.compare(&b).is_ge() { a } else { b })
                    .unwrap(),
                _ => unreachable!(),
            }
        }
    }
}

/// Load the shared catalog fixture
pub fn sales_catalog() -> Catalog {
    Catalog::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/test_data/sales.yaml"))
        .unwrap_or_else(|e| panic!("Failed to load sales.yaml: {}", e))
}

/// Engine over the sales store, seeded with a small two-year dataset
pub fn sales_engine() -> Arc<RecordingEngine> {
    let engine = RecordingEngine::new(sales_catalog());
    engine.load(
        "sales",
        vec![
            sales_row("FR", "Paris", 2023, 8.0, 5.0),
            sales_row("FR", "Paris", 2024, 10.0, 6.0),
            sales_row("US", "NYC", 2023, 15.0, 9.0),
            sales_row("US", "NYC", 2024, 20.0, 10.0),
        ],
    );
    Arc::new(engine)
}

pub fn sales_row(country: &str, city: &str, year: i64, revenue: f64, cost: f64) -> Vec<Value> {
    vec![
        Value::from(country),
        Value::from(city),
        Value::from(year),
        Value::from(revenue),
        Value::from(cost),
    ]
}

/// Column accessor that panics with the table rendered, for readable
/// failures.
pub fn column(table: &ColumnarTable, name: &str) -> Vec<Value> {
    table
        .column(name)
        .unwrap_or_else(|| panic!("no column '{}' in:\n{}", name, table))
        .clone()
}

pub fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

pub fn floats(values: &[f64]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}
