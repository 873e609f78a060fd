//! Integration tests for the GROUP column-set reshape

mod common;

use common::{column, floats, sales_engine, strs};
use cubeplan::{
    ColumnSet, Criteria, GroupColumnSet, GroupDto, Measure, QueryDto, QueryExecutor,
};

fn regions() -> ColumnSet {
    ColumnSet::Group(GroupColumnSet {
        new_field: "region".to_string(),
        field: "country".to_string(),
        groups: vec![
            GroupDto {
                name: "atlantic".to_string(),
                values: vec![serde_json::json!("US"), serde_json::json!("FR")],
            },
            GroupDto {
                name: "europe".to_string(),
                values: vec![serde_json::json!("FR")],
            },
        ],
    })
}

#[test]
fn test_rows_replicate_per_group() {
    let executor = QueryExecutor::new(sales_engine());

    let query = QueryDto::from("sales")
        .with_criteria(Criteria::eq("year", serde_json::json!(2024)))
        .with_measure(Measure::sum("revenue", "revenue"))
        .with_column_set(regions());
    let result = executor.execute_query(&query).unwrap();

    // Groups in declaration order, member values in declaration order.
    assert_eq!(
        column(&result, "region"),
        strs(&["atlantic", "atlantic", "europe"])
    );
    assert_eq!(column(&result, "country"), strs(&["US", "FR", "FR"]));
    assert_eq!(column(&result, "revenue"), floats(&[20.0, 10.0, 10.0]));
}

#[test]
fn test_group_column_precedes_user_columns() {
    let executor = QueryExecutor::new(sales_engine());

    let query = QueryDto::from("sales")
        .with_column("year")
        .with_criteria(Criteria::eq("country", serde_json::json!("FR")))
        .with_measure(Measure::sum("revenue", "revenue"))
        .with_column_set(regions());
    let result = executor.execute_query(&query).unwrap();

    let names: Vec<&str> = result.headers().iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["region", "country", "year", "revenue"]);
}

#[test]
fn test_single_group_drops_the_synthetic_column() {
    let executor = QueryExecutor::new(sales_engine());

    let single = ColumnSet::Group(GroupColumnSet {
        new_field: "region".to_string(),
        field: "country".to_string(),
        groups: vec![GroupDto {
            name: "europe".to_string(),
            values: vec![serde_json::json!("FR")],
        }],
    });
    let query = QueryDto::from("sales")
        .with_criteria(Criteria::eq("year", serde_json::json!(2024)))
        .with_measure(Measure::sum("revenue", "revenue"))
        .with_column_set(single);
    let result = executor.execute_query(&query).unwrap();

    assert!(result.column("region").is_none());
    assert_eq!(column(&result, "country"), strs(&["FR"]));
    assert_eq!(column(&result, "revenue"), floats(&[10.0]));
}

#[test]
fn test_computed_measures_apply_after_the_reshape() {
    let executor = QueryExecutor::new(sales_engine());

    let query = QueryDto::from("sales")
        .with_criteria(Criteria::eq("year", serde_json::json!(2024)))
        .with_measure(Measure::sum("revenue", "revenue"))
        .with_measure(Measure::binary(
            "double",
            cubeplan::BinaryOperator::Add,
            Measure::reference("revenue"),
            Measure::reference("revenue"),
        ))
        .with_column_set(regions());
    let result = executor.execute_query(&query).unwrap();

    // One computed cell per reshaped row, not per source row.
    assert_eq!(result.count(), 3);
    assert_eq!(column(&result, "double"), floats(&[40.0, 20.0, 20.0]));
}
