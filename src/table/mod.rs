//! Columnar tables
//!
//! Results travel as [`ColumnarTable`]: an ordered list of headers plus one
//! value vector per header. Headers flag which columns are measures; the
//! remaining columns are the grouping dimensions.

mod grouper;
mod pivot;
pub mod util;

use std::fmt;

use crate::schema::FieldType;
use crate::value::Value;

pub use grouper::group;
pub use pivot::{PivotGrid, PivotTable};

/// One column header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub field_type: FieldType,
    pub measure: bool,
}

impl Header {
    pub fn dimension(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            measure: false,
        }
    }

    pub fn measure(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            measure: true,
        }
    }
}

/// Columnar result table
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarTable {
    headers: Vec<Header>,
    columns: Vec<Vec<Value>>,
}

impl ColumnarTable {
    pub fn new(headers: Vec<Header>, columns: Vec<Vec<Value>>) -> Self {
        debug_assert_eq!(headers.len(), columns.len());
        Self { headers, columns }
    }

    /// Table with the given headers and no rows
    pub fn empty(headers: Vec<Header>) -> Self {
        let columns = headers.iter().map(|_| Vec::new()).collect();
        Self { headers, columns }
    }

    /// Number of rows
    pub fn count(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Vec<Value>> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> &Vec<Value> {
        &self.columns[index]
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        let i = self.column_index(name)?;
        Some(&mut self.columns[i])
    }

    /// Append a column; its length must match the row count (unchecked for
    /// empty tables).
    pub fn add_column(&mut self, header: Header, values: Vec<Value>) {
        debug_assert!(self.headers.is_empty() || values.len() == self.count());
        self.headers.push(header);
        self.columns.push(values);
    }

    /// Drop a column by name; unknown names are ignored
    pub fn remove_column(&mut self, name: &str) {
        if let Some(i) = self.column_index(name) {
            self.headers.remove(i);
            self.columns.remove(i);
        }
    }

    /// The grouping (non-measure) headers
    pub fn dimension_headers(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter().filter(|h| !h.measure)
    }

    /// One row, cloned
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c[index].clone()).collect()
    }

    /// The values of the given columns at `row`, cloned
    pub fn row_key(&self, row: usize, column_indices: &[usize]) -> Vec<Value> {
        column_indices
            .iter()
            .map(|&c| self.columns[c][row].clone())
            .collect()
    }

    /// Keep only the first `n` rows
    pub fn truncate(&mut self, n: usize) {
        for column in &mut self.columns {
            column.truncate(n);
        }
    }

    /// Reorder rows by the given permutation of row indices
    pub fn permute_rows(&mut self, permutation: &[usize]) {
        debug_assert_eq!(permutation.len(), self.count());
        for column in &mut self.columns {
            let reordered: Vec<Value> = permutation.iter().map(|&i| column[i].clone()).collect();
            *column = reordered;
        }
    }

    /// Copy of this table restricted to the given columns, in that order
    pub fn select(&self, names: &[&str]) -> ColumnarTable {
        let mut headers = Vec::new();
        let mut columns = Vec::new();
        for name in names {
            if let Some(i) = self.column_index(name) {
                headers.push(self.headers[i].clone());
                columns.push(self.columns[i].clone());
            }
        }
        ColumnarTable::new(headers, columns)
    }
}

impl fmt::Display for ColumnarTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.name.len()).collect();
        let rendered: Vec<Vec<String>> = (0..self.count())
            .map(|r| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(c, col)| {
                        let s = col[r].to_string();
                        widths[c] = widths[c].max(s.len());
                        s
                    })
                    .collect()
            })
            .collect();

        let names: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(c, h)| format!("{:width$}", h.name, width = widths[c]))
            .collect();
        writeln!(f, "| {} |", names.join(" | "))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "|-{}-|", rule.join("-|-"))?;
        for row in rendered {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(c, s)| format!("{:width$}", s, width = widths[c]))
                .collect();
            writeln!(f, "| {} |", cells.join(" | "))?;
        }
        Ok(())
    }
}
