//! Pivot tables

use crate::value::Value;

use super::util::TOTAL_CELL;
use super::ColumnarTable;

/// A flat result annotated with its pivot shape: which dimensions span rows,
/// which span columns, and which measure aliases fill the cells.
#[derive(Debug, Clone)]
pub struct PivotTable {
    pub table: ColumnarTable,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<String>,
    pub hidden_totals: Vec<String>,
}

impl PivotTable {
    pub fn new(
        table: ColumnarTable,
        rows: Vec<String>,
        columns: Vec<String>,
        values: Vec<String>,
        hidden_totals: Vec<String>,
    ) -> Self {
        Self {
            table,
            rows,
            columns,
            values,
            hidden_totals,
        }
    }

    /// Materialize the pivoted view.
    ///
    /// Row and column keys keep their order of appearance in the flat table
    /// (which the post-processor already sorted). Rows whose total marker
    /// sits in a hidden-totals field are suppressed.
    pub fn grid(&self) -> PivotGrid {
        let row_indices: Vec<usize> = self
            .rows
            .iter()
            .filter_map(|n| self.table.column_index(n))
            .collect();
        let column_indices: Vec<usize> = self
            .columns
            .iter()
            .filter_map(|n| self.table.column_index(n))
            .collect();
        let hidden_indices: Vec<usize> = self
            .hidden_totals
            .iter()
            .filter_map(|n| self.table.column_index(n))
            .collect();

        let mut row_keys: Vec<Vec<Value>> = Vec::new();
        let mut column_keys: Vec<Vec<Value>> = Vec::new();
        let mut placed: Vec<(usize, usize, usize)> = Vec::new();

        for r in 0..self.table.count() {
            if hidden_indices
                .iter()
                .any(|&c| is_total_cell(&self.table.column_at(c)[r]))
            {
                continue;
            }
            let row_key = self.table.row_key(r, &row_indices);
            let column_key = self.table.row_key(r, &column_indices);
            let ri = position_or_insert(&mut row_keys, row_key);
            let ci = position_or_insert(&mut column_keys, column_key);
            placed.push((ri, ci, r));
        }

        let mut cells: Vec<Vec<Vec<Option<Value>>>> =
            vec![vec![vec![None; self.values.len()]; column_keys.len()]; row_keys.len()];
        for (ri, ci, r) in placed {
            for (vi, alias) in self.values.iter().enumerate() {
                cells[ri][ci][vi] = self.table.column(alias).map(|col| col[r].clone());
            }
        }

        PivotGrid {
            row_keys,
            column_keys,
            cells,
        }
    }
}

fn is_total_cell(value: &Value) -> bool {
    value.is_total() || matches!(value, Value::Str(s) if s == TOTAL_CELL)
}

fn position_or_insert(keys: &mut Vec<Vec<Value>>, key: Vec<Value>) -> usize {
    match keys.iter().position(|k| *k == key) {
        Some(i) => i,
        None => {
            keys.push(key);
            keys.len() - 1
        }
    }
}

/// The materialized pivot view: `cells[row][column][value]`
#[derive(Debug, Clone, PartialEq)]
pub struct PivotGrid {
    pub row_keys: Vec<Vec<Value>>,
    pub column_keys: Vec<Vec<Value>>,
    pub cells: Vec<Vec<Vec<Option<Value>>>>,
}
