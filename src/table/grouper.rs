//! GROUP column-set reshape

use crate::resolver::CompiledGroupColumnSet;
use crate::schema::FieldType;
use crate::value::Value;

use super::{ColumnarTable, Header};

/// Reshape a table under a GROUP column-set.
///
/// A new group column is prepended; each source row is emitted once per
/// group containing its source value, groups and values in declaration
/// order. Tables without the source column pass through unchanged.
pub fn group(table: &ColumnarTable, set: &CompiledGroupColumnSet) -> ColumnarTable {
    let Some(source) = table.column(&set.field.name) else {
        return table.clone();
    };

    let mut selection: Vec<(String, usize)> = Vec::new();
    for (name, values) in &set.groups {
        for value in values {
            for (row, cell) in source.iter().enumerate() {
                if cell == value {
                    selection.push((name.clone(), row));
                }
            }
        }
    }

    let mut headers = Vec::with_capacity(table.headers().len() + 1);
    headers.push(Header::dimension(set.new_field.name.as_str(), FieldType::Str));
    headers.extend(table.headers().iter().cloned());

    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(selection.len())];
    for _ in table.headers() {
        columns.push(Vec::with_capacity(selection.len()));
    }
    for (group_name, row) in &selection {
        columns[0].push(Value::Str(group_name.clone()));
        for (i, cell) in table.row(*row).into_iter().enumerate() {
            columns[i + 1].push(cell);
        }
    }
    ColumnarTable::new(headers, columns)
}
