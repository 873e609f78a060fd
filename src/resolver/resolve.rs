use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::measure::{
    CompiledAggregatedMeasure, CompiledBinaryMeasure, CompiledComparisonMeasure,
    CompiledConstantMeasure, CompiledCriteria, CompiledExpressionMeasure, CompiledMeasure,
    CompiledPeriodShift, Measure, PeriodShift,
};
use crate::plan::QueryScope;
use crate::query::{ColumnSet, ConditionOp, Criteria, QueryDto};
use crate::schema::{Catalog, FieldType, Store, TypedField};
use crate::value::Value;

use super::error::ResolveError;
use super::types::CompiledGroupColumnSet;

/// The resolved form of one query: typed columns, compiled measures and the
/// root scope.
///
/// Construction performs the whole validation pass; afterwards the resolver
/// is a read-only bag of accessors for the executor.
#[derive(Debug)]
pub struct QueryResolver {
    columns: Vec<TypedField>,
    group_columns: Vec<TypedField>,
    measures: Vec<CompiledMeasure>,
    column_sets: Vec<CompiledGroupColumnSet>,
    scope: QueryScope,
}

impl QueryResolver {
    pub fn new(query: &QueryDto, catalog: &Catalog) -> Result<Self, ResolveError> {
        let store = catalog
            .store(&query.table)
            .ok_or_else(|| ResolveError::UnknownStore(query.table.clone()))?;
        let binder = Binder { catalog, store };

        // 1. Resolve the user-facing grouping columns.
        let columns: Vec<TypedField> = query
            .columns
            .iter()
            .map(|c| binder.resolve_field(c))
            .collect::<Result<_, _>>()?;

        // 2. Resolve GROUP column-sets; their source columns must be fetched
        //    even when the user did not list them.
        let mut column_sets = Vec::new();
        let mut group_columns = Vec::new();
        for ColumnSet::Group(set) in &query.column_sets {
            let field = binder.resolve_field(&set.field)?;
            let groups = set
                .groups
                .iter()
                .map(|g| {
                    let values = g
                        .values
                        .iter()
                        .map(|v| binder.convert_constant(&field, v))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok((g.name.clone(), values))
                })
                .collect::<Result<Vec<_>, ResolveError>>()?;
            group_columns.push(field.clone());
            column_sets.push(CompiledGroupColumnSet {
                new_field: TypedField::synthetic(set.new_field.as_str(), FieldType::Str),
                field,
                groups,
            });
        }

        // 3. The scope groups by user columns plus group-set sources.
        let mut scope_columns = columns.clone();
        for f in &group_columns {
            if !scope_columns.contains(f) {
                scope_columns.push(f.clone());
            }
        }

        // 4. Rollups and grouping sets must stay within the grouped columns.
        let rollup = query
            .rollup_columns
            .iter()
            .map(|c| binder.resolve_grouped_field(c, &scope_columns))
            .collect::<Result<Vec<_>, _>>()?;
        let grouping_sets = query
            .grouping_sets
            .iter()
            .map(|set| {
                set.iter()
                    .map(|c| binder.resolve_grouped_field(c, &scope_columns))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let criteria = query
            .criteria
            .as_ref()
            .map(|c| binder.compile_criteria(c))
            .transpose()?;

        let scope = QueryScope {
            store: store.name.clone(),
            columns: scope_columns,
            rollup,
            grouping_sets,
            criteria,
            limit: query.limit,
        };

        // 5. Compile measures, inlining alias references and rejecting
        //    duplicate aliases and reference cycles.
        let mut by_alias: HashMap<&str, &Measure> = HashMap::new();
        for measure in &query.measures {
            if let Some(alias) = measure.alias() {
                if by_alias.insert(alias, measure).is_some() {
                    return Err(ResolveError::DuplicateAlias(alias.to_string()));
                }
            }
        }
        let mut measures = Vec::with_capacity(query.measures.len());
        for measure in &query.measures {
            let compiled = binder.compile_measure(measure, &by_alias, &mut Vec::new(), &scope)?;
            measures.push(compiled);
        }

        Ok(Self {
            columns,
            group_columns,
            measures,
            column_sets,
            scope,
        })
    }

    /// User-declared grouping columns, in declaration order
    pub fn columns(&self) -> &[TypedField] {
        &self.columns
    }

    /// Source columns of GROUP column-sets
    pub fn group_columns(&self) -> &[TypedField] {
        &self.group_columns
    }

    /// Compiled user measures, in declaration order
    pub fn measures(&self) -> &[CompiledMeasure] {
        &self.measures
    }

    pub fn column_sets(&self) -> &[CompiledGroupColumnSet] {
        &self.column_sets
    }

    /// The root scope of the query
    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }
}

/// Catalog lookups shared by the resolution steps
struct Binder<'a> {
    catalog: &'a Catalog,
    store: &'a Store,
}

impl<'a> Binder<'a> {
    /// Resolve "field" or "store.field" to a typed field
    fn resolve_field(&self, name: &str) -> Result<TypedField, ResolveError> {
        if let Some((store_name, field_name)) = name.split_once('.') {
            if let Some(store) = self.catalog.store(store_name) {
                let field = store.field(field_name).ok_or_else(|| ResolveError::UnknownField {
                    store: store_name.to_string(),
                    field: field_name.to_string(),
                })?;
                return Ok(TypedField::new(
                    store.name.as_str(),
                    field.name.as_str(),
                    field.field_type,
                ));
            }
        }
        let field = self.store.field(name).ok_or_else(|| ResolveError::UnknownField {
            store: self.store.name.clone(),
            field: name.to_string(),
        })?;
        Ok(TypedField::new(
            self.store.name.as_str(),
            field.name.as_str(),
            field.field_type,
        ))
    }

    /// Resolve a rollup / grouping-set column and check it is grouped
    fn resolve_grouped_field(
        &self,
        name: &str,
        grouped: &[TypedField],
    ) -> Result<TypedField, ResolveError> {
        let field = self.resolve_field(name)?;
        if !grouped.contains(&field) {
            return Err(ResolveError::RollupColumnNotGrouped(name.to_string()));
        }
        Ok(field)
    }

    /// Convert a JSON filter constant, enforcing the field's type
    fn convert_constant(
        &self,
        field: &TypedField,
        json: &serde_json::Value,
    ) -> Result<Value, ResolveError> {
        let mismatch = || ResolveError::TypeMismatch {
            field: field.to_string(),
            expected: field.field_type,
            value: json.to_string(),
        };
        let value = Value::from_json(json);
        match (field.field_type, &value) {
            (_, Value::Null) => Ok(Value::Null),
            (FieldType::Int, Value::Int(_)) => Ok(value),
            (FieldType::Int, Value::IntList(_)) => Ok(value),
            (FieldType::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
            (FieldType::Float, Value::Float(_)) => Ok(value),
            (FieldType::Bool, Value::Bool(_)) => Ok(value),
            (FieldType::Str, Value::Str(_)) => Ok(value),
            (FieldType::Str, Value::StrList(_)) => Ok(value),
            (FieldType::Date, Value::Str(s)) => s
                .parse::<NaiveDate>()
                .map(Value::Date)
                .map_err(|_| mismatch()),
            (FieldType::DateTime, Value::Str(s)) => s
                .parse::<NaiveDateTime>()
                .map(Value::DateTime)
                .map_err(|_| mismatch()),
            (FieldType::IntList, Value::IntList(_)) => Ok(value),
            (FieldType::StrList, Value::StrList(_)) => Ok(value),
            (FieldType::Object, _) => Ok(value),
            _ => Err(mismatch()),
        }
    }

    fn compile_criteria(&self, criteria: &Criteria) -> Result<CompiledCriteria, ResolveError> {
        match criteria {
            Criteria::And(parts) => Ok(CompiledCriteria::And(
                parts
                    .iter()
                    .map(|c| self.compile_criteria(c))
                    .collect::<Result<_, _>>()?,
            )),
            Criteria::Or(parts) => Ok(CompiledCriteria::Or(
                parts
                    .iter()
                    .map(|c| self.compile_criteria(c))
                    .collect::<Result<_, _>>()?,
            )),
            Criteria::Condition { field, op, value } => {
                let field = self.resolve_field(field)?;
                let value = match op {
                    ConditionOp::IsNull | ConditionOp::IsNotNull => Value::Null,
                    _ => self.convert_constant(&field, value)?,
                };
                Ok(CompiledCriteria::Condition { field, op: *op, value })
            }
        }
    }

    fn compile_measure(
        &self,
        measure: &Measure,
        by_alias: &HashMap<&str, &Measure>,
        visiting: &mut Vec<String>,
        scope: &QueryScope,
    ) -> Result<CompiledMeasure, ResolveError> {
        match measure {
            Measure::Ref(alias) => {
                if visiting.iter().any(|a| a == alias) {
                    return Err(ResolveError::CyclicMeasure(alias.clone()));
                }
                let target = by_alias
                    .get(alias.as_str())
                    .ok_or_else(|| ResolveError::UnresolvedMeasure(alias.clone()))?;
                visiting.push(alias.clone());
                let compiled = self.compile_measure(target, by_alias, visiting, scope)?;
                visiting.pop();
                Ok(compiled)
            }
            Measure::Aggregated {
                alias,
                field,
                aggregation,
                criteria,
            } => {
                let field = if field == "*" {
                    TypedField::synthetic("*", FieldType::Int)
                } else {
                    self.resolve_field(field)?
                };
                let criteria = criteria
                    .as_ref()
                    .map(|c| self.compile_criteria(c))
                    .transpose()?;
                Ok(CompiledMeasure::Aggregated(CompiledAggregatedMeasure {
                    alias: alias.clone(),
                    field,
                    aggregation: *aggregation,
                    criteria,
                }))
            }
            Measure::Binary { alias, op, left, right } => {
                let left = self.compile_measure(left, by_alias, visiting, scope)?;
                let right = self.compile_measure(right, by_alias, visiting, scope)?;
                Ok(CompiledMeasure::Binary(CompiledBinaryMeasure {
                    alias: alias.clone(),
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                }))
            }
            Measure::Comparison {
                alias,
                method,
                measure,
                shifts,
            } => {
                let base = self.compile_measure(measure, by_alias, visiting, scope)?;
                let shifts = shifts
                    .iter()
                    .map(|s| self.compile_shift(s, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                if shifts.is_empty() {
                    return Err(ResolveError::InvalidComparison(format!(
                        "'{}' declares no period shift",
                        alias
                    )));
                }
                Ok(CompiledMeasure::Comparison(CompiledComparisonMeasure {
                    alias: alias.clone(),
                    method: *method,
                    measure: Box::new(base),
                    shifts,
                }))
            }
            Measure::Constant { alias, value } => Ok(CompiledMeasure::Constant(
                CompiledConstantMeasure {
                    alias: alias.clone(),
                    value: Value::from_json(value),
                },
            )),
            Measure::Expression { alias, expression } => Ok(CompiledMeasure::Expression(
                CompiledExpressionMeasure {
                    alias: alias.clone(),
                    expression: expression.clone(),
                },
            )),
        }
    }

    /// A period shift needs an integer or date field, and the scope must pin
    /// the row's period: the field is either grouped or filtered by equality.
    fn compile_shift(
        &self,
        shift: &PeriodShift,
        scope: &QueryScope,
    ) -> Result<CompiledPeriodShift, ResolveError> {
        let field = self.resolve_field(&shift.field)?;
        if !matches!(field.field_type, FieldType::Int | FieldType::Date) {
            return Err(ResolveError::InvalidComparison(format!(
                "period field '{}' must be an integer or date, got {}",
                field, field.field_type
            )));
        }
        let grouped = scope.columns.contains(&field);
        let filtered = scope
            .criteria
            .as_ref()
            .map(|c| criteria_pins_field(c, &field))
            .unwrap_or(false);
        if !grouped && !filtered {
            return Err(ResolveError::InvalidComparison(format!(
                "period field '{}' is neither grouped nor filtered by equality",
                field
            )));
        }
        Ok(CompiledPeriodShift { field, offset: shift.offset })
    }
}

/// Whether the criteria tree contains an equality condition on `field`
/// reachable through conjunctions only.
fn criteria_pins_field(criteria: &CompiledCriteria, field: &TypedField) -> bool {
    match criteria {
        CompiledCriteria::And(parts) => parts.iter().any(|c| criteria_pins_field(c, field)),
        CompiledCriteria::Or(_) => false,
        CompiledCriteria::Condition { field: f, op, .. } => {
            f == field && *op == ConditionOp::Eq
        }
    }
}

/// Equality constant pinned for `field` by the scope criteria, if any
pub(crate) fn pinned_value(criteria: Option<&CompiledCriteria>, field: &TypedField) -> Option<Value> {
    fn walk(criteria: &CompiledCriteria, field: &TypedField) -> Option<Value> {
        match criteria {
            CompiledCriteria::And(parts) => parts.iter().find_map(|c| walk(c, field)),
            CompiledCriteria::Or(_) => None,
            CompiledCriteria::Condition { field: f, op, value } => {
                (f == field && *op == ConditionOp::Eq).then(|| value.clone())
            }
        }
    }
    criteria.and_then(|c| walk(c, field))
}
