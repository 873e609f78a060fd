//! Measure evaluation
//!
//! Computes each non-primitive node's column from already-materialized
//! scope tables, in the order the execution plan dictates.

use std::collections::HashMap;

use crate::measure::{
    CompiledComparisonMeasure, CompiledMeasure, ComparisonMethod, COUNT_ALIAS,
};
use crate::plan::{QueryPlanNodeKey, QueryScope};
use crate::resolver::pinned_value;
use crate::table::{ColumnarTable, Header};
use crate::value::Value;

use super::error::ExecuteError;
use super::prefetch::shifted_scope;

/// Evaluate one plan node into its scope's table.
///
/// Primitive nodes were materialized by the prefetch stage; they are only
/// verified here. Already-present columns are left alone so shared nodes
/// evaluate once.
pub fn evaluate(
    node: &QueryPlanNodeKey,
    table_by_scope: &mut HashMap<QueryScope, ColumnarTable>,
) -> Result<(), ExecuteError> {
    let alias = node.measure.alias();
    let present = table_by_scope
        .get(&node.scope)
        .map(|t| t.column(alias).is_some())
        .unwrap_or(false);
    if present {
        return Ok(());
    }

    let column = match &node.measure {
        CompiledMeasure::Aggregated(_) | CompiledMeasure::Expression(_) => {
            // A missing primitive column means the prefetch stage skipped a
            // scope; that is a pipeline bug, not a user error.
            return Err(ExecuteError::Internal(format!(
                "primitive measure '{}' was not materialized in its scope",
                alias
            )));
        }
        CompiledMeasure::Constant(m) => {
            let count = scope_table(table_by_scope, &node.scope, alias)?.count();
            vec![m.value.clone(); count]
        }
        CompiledMeasure::Binary(m) => {
            let table = scope_table(table_by_scope, &node.scope, alias)?;
            let left = operand_column(table, m.left.alias(), alias)?;
            let right = operand_column(table, m.right.alias(), alias)?;
            left.iter()
                .zip(right.iter())
                .map(|(l, r)| {
                    let l = count_null_as_zero(m.left.alias(), l);
                    let r = count_null_as_zero(m.right.alias(), r);
                    match m.op {
                        crate::measure::BinaryOperator::Add => l.add(&r),
                        crate::measure::BinaryOperator::Sub => l.sub(&r),
                        crate::measure::BinaryOperator::Mul => l.mul(&r),
                        crate::measure::BinaryOperator::Div => l.div(&r),
                    }
                })
                .collect()
        }
        CompiledMeasure::Comparison(m) => evaluate_comparison(m, node, table_by_scope)?,
    };

    let header = Header::measure(alias, node.measure.result_type());
    let table = table_by_scope.get_mut(&node.scope).ok_or_else(|| {
        ExecuteError::Internal(format!("no table materialized for the scope of '{}'", alias))
    })?;
    table.add_column(header, column);
    Ok(())
}

fn scope_table<'a>(
    table_by_scope: &'a HashMap<QueryScope, ColumnarTable>,
    scope: &QueryScope,
    alias: &str,
) -> Result<&'a ColumnarTable, ExecuteError> {
    table_by_scope.get(scope).ok_or_else(|| {
        ExecuteError::Internal(format!("no table materialized for the scope of '{}'", alias))
    })
}

fn operand_column<'a>(
    table: &'a ColumnarTable,
    operand_alias: &str,
    alias: &str,
) -> Result<&'a Vec<Value>, ExecuteError> {
    table.column(operand_alias).ok_or_else(|| {
        ExecuteError::Internal(format!(
            "operand '{}' of '{}' was not materialized",
            operand_alias, alias
        ))
    })
}

/// COUNT always has a value: a missing group contributes zero rows
fn count_null_as_zero(alias: &str, value: &Value) -> Value {
    if alias == COUNT_ALIAS && value.is_null() {
        Value::Int(0)
    } else {
        value.clone()
    }
}

/// Compute a comparison column: every row is paired with a reference row in
/// the shifted scope's table and combined under the comparison method.
/// Rows without a reference yield null.
fn evaluate_comparison(
    measure: &CompiledComparisonMeasure,
    node: &QueryPlanNodeKey,
    table_by_scope: &HashMap<QueryScope, ColumnarTable>,
) -> Result<Vec<Value>, ExecuteError> {
    let alias = &measure.alias;
    let base_alias = measure.measure.alias();
    let current = scope_table(table_by_scope, &node.scope, alias)?;
    let reference_scope = shifted_scope(&node.scope, &measure.shifts);
    let reference = scope_table(table_by_scope, &reference_scope, alias)?;
    let base = operand_column(reference, base_alias, alias)?;

    // Index the reference table by its grouping columns.
    let key_fields: Vec<&str> = reference_scope
        .columns
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    let key_indices: Vec<usize> = key_fields
        .iter()
        .map(|name| {
            reference.column_index(name).ok_or_else(|| {
                ExecuteError::Internal(format!(
                    "reference table of '{}' misses grouping column '{}'",
                    alias, name
                ))
            })
        })
        .collect::<Result<_, _>>()?;
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    for r in 0..reference.count() {
        index.insert(reference.row_key(r, &key_indices), r);
    }

    let current_base = operand_column(current, base_alias, alias)?;
    let mut column = Vec::with_capacity(current.count());
    for r in 0..current.count() {
        let mut key = Vec::with_capacity(key_fields.len());
        let mut resolvable = true;
        for field in &reference_scope.columns {
            let shift = measure.shifts.iter().find(|s| s.field == *field);
            // The row's own period value: from its cell when the field is
            // grouped, from the pinned filter constant otherwise.
            let cell = match current.column(&field.name) {
                Some(col) => col[r].clone(),
                None => match pinned_value(node.scope.criteria.as_ref(), field) {
                    Some(v) => v,
                    None => {
                        resolvable = false;
                        break;
                    }
                },
            };
            key.push(match shift {
                Some(s) => s.apply(&cell),
                None => cell,
            });
        }

        let reference_value = if resolvable {
            index.get(&key).map(|&i| base[i].clone())
        } else {
            None
        };
        let value = match reference_value {
            Some(reference_value) if !reference_value.is_null() => {
                let cur = &current_base[r];
                match measure.method {
                    ComparisonMethod::AbsoluteDifference => cur.sub(&reference_value),
                    ComparisonMethod::RelativeDifference => {
                        cur.sub(&reference_value).div(&reference_value)
                    }
                    ComparisonMethod::Divide => cur.div(&reference_value),
                }
            }
            _ => Value::Null,
        };
        column.push(value);
    }
    Ok(column)
}
