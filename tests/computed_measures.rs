//! Integration tests for computed (arithmetic) measures

mod common;

use common::{column, floats, sales_engine};
use cubeplan::{BinaryOperator, Criteria, Measure, QueryDto, QueryExecutor, Value};

#[test]
fn test_margin_is_computed_from_fetched_operands() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let query = QueryDto::from("sales")
        .with_column("country")
        .with_criteria(Criteria::eq("year", serde_json::json!(2024)))
        .with_measure(Measure::sum("revenue", "revenue"))
        .with_measure(Measure::sum("cost", "cost"))
        .with_measure(Measure::binary(
            "margin",
            BinaryOperator::Sub,
            Measure::reference("revenue"),
            Measure::reference("cost"),
        ));
    let result = executor.execute_query(&query).unwrap();

    assert_eq!(column(&result, "margin"), floats(&[4.0, 10.0]));

    // Only the primitives travel to the backend; the margin is evaluated
    // locally.
    assert_eq!(engine.call_count(), 1);
    let mut aliases = engine.fetched_aliases(0);
    aliases.sort();
    assert_eq!(aliases, vec!["_contributors_count_", "cost", "revenue"]);
}

#[test]
fn test_nested_computed_measures() {
    let executor = QueryExecutor::new(sales_engine());

    // margin_ratio = (revenue - cost) / revenue
    let margin = Measure::binary(
        "margin",
        BinaryOperator::Sub,
        Measure::sum("revenue", "revenue"),
        Measure::sum("cost", "cost"),
    );
    let query = QueryDto::from("sales")
        .with_column("country")
        .with_criteria(Criteria::eq("year", serde_json::json!(2024)))
        .with_measure(Measure::binary(
            "margin_ratio",
            BinaryOperator::Div,
            margin,
            Measure::reference("revenue_total"),
        ))
        .with_measure(Measure::sum("revenue_total", "revenue"));
    let result = executor.execute_query(&query).unwrap();

    assert_eq!(column(&result, "margin_ratio"), floats(&[0.4, 0.5]));
}

#[test]
fn test_division_by_zero_yields_null() {
    let executor = QueryExecutor::new(sales_engine());

    let query = QueryDto::from("sales")
        .with_column("country")
        .with_measure(Measure::binary(
            "broken",
            BinaryOperator::Div,
            Measure::sum("revenue", "revenue"),
            Measure::constant("zero", serde_json::json!(0)),
        ));
    let result = executor.execute_query(&query).unwrap();

    assert_eq!(column(&result, "broken"), vec![Value::Null, Value::Null]);
}

#[test]
fn test_constant_measure_fills_the_column() {
    let executor = QueryExecutor::new(sales_engine());

    let query = QueryDto::from("sales")
        .with_column("country")
        .with_measure(Measure::constant("target", serde_json::json!(100)));
    let result = executor.execute_query(&query).unwrap();

    assert_eq!(
        column(&result, "target"),
        vec![Value::Int(100), Value::Int(100)]
    );
}

#[test]
fn test_shared_operand_is_fetched_once() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    // Both computed measures lean on the same sum; the backend sees it once.
    let query = QueryDto::from("sales")
        .with_column("country")
        .with_measure(Measure::sum("revenue", "revenue"))
        .with_measure(Measure::binary(
            "double",
            BinaryOperator::Add,
            Measure::reference("revenue"),
            Measure::reference("revenue"),
        ))
        .with_measure(Measure::binary(
            "half",
            BinaryOperator::Div,
            Measure::reference("revenue"),
            Measure::constant("two", serde_json::json!(2)),
        ));
    let result = executor.execute_query(&query).unwrap();

    assert_eq!(engine.call_count(), 1);
    let revenue_fetches = engine.fetched_aliases(0)
        .iter()
        .filter(|a| *a == "revenue")
        .count();
    assert_eq!(revenue_fetches, 1);
    assert_eq!(column(&result, "double"), floats(&[36.0, 70.0]));
    assert_eq!(column(&result, "half"), floats(&[9.0, 17.5]));
}
