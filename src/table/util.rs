//! Result shaping
//!
//! The post-processing steps applied to tables: promoting backend nulls to
//! the internal total marker, projecting and ordering columns to the user's
//! declaration order, ordering rows, and rendering total markers.

use std::cmp::Ordering;

use crate::measure::grouping_alias;
use crate::plan::QueryScope;
use crate::resolver::QueryResolver;
use crate::value::Value;

use super::ColumnarTable;

/// Display string substituted for total markers in grouping cells
pub const TOTAL_CELL: &str = "Total";

/// Promote backend nulls in rolled-up grouping columns to [`Value::Total`].
///
/// When the backend supplied GROUPING() columns they decide which nulls are
/// super-aggregates; otherwise any null in a rolled-up column is one.
pub fn replace_null_cells_by_total(table: &mut ColumnarTable, scope: &QueryScope) {
    if !scope.has_super_aggregates() {
        return;
    }
    for field in scope.rolled_up_fields() {
        let grouping = table.column(&grouping_alias(&field.name)).cloned();
        let Some(column) = table.column_mut(&field.name) else {
            continue;
        };
        for (i, cell) in column.iter_mut().enumerate() {
            let is_super_aggregate = match &grouping {
                Some(g) => matches!(g.get(i), Some(Value::Int(1))),
                None => cell.is_null(),
            };
            if is_super_aggregate {
                *cell = Value::Total;
            }
        }
    }
}

/// Render the internal total marker as its display string
pub fn replace_total_cell_values(table: &mut ColumnarTable) {
    let dimensions: Vec<String> = table
        .dimension_headers()
        .map(|h| h.name.clone())
        .collect();
    for name in dimensions {
        if let Some(column) = table.column_mut(&name) {
            for cell in column.iter_mut() {
                if cell.is_total() {
                    *cell = Value::Str(TOTAL_CELL.to_string());
                }
            }
        }
    }
}

/// Project the table to the user-facing columns, in declaration order:
/// GROUP column-set fields first, then the user columns, then the measures.
/// Backend-only columns (count, GROUPING()) are dropped on the way.
pub fn select_and_order_columns(table: &ColumnarTable, resolver: &QueryResolver) -> ColumnarTable {
    let mut names: Vec<&str> = Vec::new();
    for set in resolver.column_sets() {
        if !names.contains(&set.new_field.name.as_str()) {
            names.push(&set.new_field.name);
        }
        if !names.contains(&set.field.name.as_str()) {
            names.push(&set.field.name);
        }
    }
    for column in resolver.columns() {
        if !names.contains(&column.name.as_str()) {
            names.push(&column.name);
        }
    }
    for measure in resolver.measures() {
        if !names.contains(&measure.alias()) {
            names.push(measure.alias());
        }
    }
    table.select(&names)
}

/// Row ordering for one column, compiled against typed values
#[derive(Debug, Clone)]
pub enum CompiledOrder {
    Asc,
    Desc,
    /// Explicit value order; values absent from the list sort after it
    Explicit(Vec<Value>),
}

impl CompiledOrder {
    /// Compare two cells under this order. Total markers sort last
    /// regardless of direction unless `totals_last` is disabled.
    fn compare(&self, a: &Value, b: &Value, totals_last: bool) -> Ordering {
        if totals_last {
            match (a.is_total(), b.is_total()) {
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                (true, true) => return Ordering::Equal,
                (false, false) => {}
            }
        }
        match self {
            CompiledOrder::Asc => a.compare(b),
            CompiledOrder::Desc => b.compare(a),
            CompiledOrder::Explicit(list) => {
                let pos = |v: &Value| list.iter().position(|x| x == v).unwrap_or(list.len());
                pos(a).cmp(&pos(b)).then_with(|| a.compare(b))
            }
        }
    }
}

/// Stable sort of the table rows.
///
/// Dimension columns are compared left to right in table order, each under
/// its declared [`CompiledOrder`] (ascending when none was declared).
pub fn order_rows(table: &mut ColumnarTable, orders: &[(String, CompiledOrder)]) {
    let keys: Vec<(usize, CompiledOrder)> = table
        .headers()
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.measure)
        .map(|(i, h)| {
            let order = orders
                .iter()
                .find(|(name, _)| *name == h.name)
                .map(|(_, o)| o.clone())
                .unwrap_or(CompiledOrder::Asc);
            (i, order)
        })
        .collect();
    if keys.is_empty() {
        return;
    }

    let mut permutation: Vec<usize> = (0..table.count()).collect();
    permutation.sort_by(|&a, &b| {
        for (column, order) in &keys {
            let col = table.column_at(*column);
            let cmp = order.compare(&col[a], &col[b], true);
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
    table.permute_rows(&permutation);
}
