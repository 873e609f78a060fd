//! Integration tests for pivot queries

mod common;

use common::{column, sales_engine, strs};
use cubeplan::{ExecuteError, Measure, PivotQueryDto, QueryDto, QueryExecutor, Value};

fn revenue_pivot() -> PivotQueryDto {
    PivotQueryDto {
        query: QueryDto::from("sales")
            .with_column("country")
            .with_column("year")
            .with_measure(Measure::sum("revenue", "revenue")),
        rows: vec!["country".to_string()],
        columns: vec!["year".to_string()],
        hidden_totals: Vec::new(),
    }
}

#[test]
fn test_pivot_produces_row_and_column_totals() {
    let executor = QueryExecutor::new(sales_engine());

    let pivot = executor.execute_pivot_query(&revenue_pivot()).unwrap();
    assert_eq!(pivot.rows, vec!["country"]);
    assert_eq!(pivot.columns, vec!["year"]);
    assert_eq!(pivot.values, vec!["revenue"]);

    // 4 base cells + 2 row totals + 2 column totals + grand total.
    assert_eq!(pivot.table.count(), 9);

    let grid = pivot.grid();
    assert_eq!(grid.row_keys, vec![strs(&["FR"]), strs(&["US"]), strs(&["Total"])]);
    assert_eq!(
        grid.column_keys,
        vec![
            vec![Value::Int(2023)],
            vec![Value::Int(2024)],
            vec![Value::Str("Total".to_string())],
        ]
    );

    // FR row: 8, 10, 18. Totals column: 23, 30, 53.
    assert_eq!(grid.cells[0][0][0], Some(Value::Float(8.0)));
    assert_eq!(grid.cells[0][1][0], Some(Value::Float(10.0)));
    assert_eq!(grid.cells[0][2][0], Some(Value::Float(18.0)));
    assert_eq!(grid.cells[2][0][0], Some(Value::Float(23.0)));
    assert_eq!(grid.cells[2][2][0], Some(Value::Float(53.0)));
}

#[test]
fn test_rollup_in_pivot_is_rejected() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let mut pivot = revenue_pivot();
    pivot.query = pivot.query.with_rollup("country");

    assert!(matches!(
        executor.execute_pivot_query(&pivot),
        Err(ExecuteError::InvalidQuery(_))
    ));
    assert_eq!(engine.call_count(), 0);
}

#[test]
fn test_pivot_axes_must_cover_query_columns() {
    let executor = QueryExecutor::new(sales_engine());

    let mut pivot = revenue_pivot();
    pivot.columns = Vec::new();
    assert!(matches!(
        executor.execute_pivot_query(&pivot),
        Err(ExecuteError::InvalidQuery(_))
    ));
}

#[test]
fn test_hidden_totals_are_suppressed_from_the_grid() {
    let executor = QueryExecutor::new(sales_engine());

    let mut pivot = revenue_pivot();
    pivot.hidden_totals = vec!["country".to_string()];
    let result = executor.execute_pivot_query(&pivot).unwrap();

    let grid = result.grid();
    // Rows whose country cell is a total are gone; year totals survive.
    assert_eq!(grid.row_keys, vec![strs(&["FR"]), strs(&["US"])]);
    assert_eq!(grid.column_keys.len(), 3);
}

#[test]
fn test_pivot_flat_table_keeps_user_column_order() {
    let executor = QueryExecutor::new(sales_engine());

    let pivot = executor.execute_pivot_query(&revenue_pivot()).unwrap();
    let names: Vec<&str> = pivot
        .table
        .headers()
        .iter()
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(names, vec!["country", "year", "revenue"]);

    // No nulls leak into the flat view's grouping columns.
    assert!(column(&pivot.table, "country").iter().all(|v| !v.is_null()));
    assert!(column(&pivot.table, "year").iter().all(|v| !v.is_null()));
}
