//! Integration tests for the query cache: partial hits, invalidation,
//! per-principal partitions

mod common;

use common::{column, sales_engine};
use cubeplan::{
    CacheMode, CacheStats, Criteria, Measure, QueryDto, QueryExecutor, QueryOptions,
};

fn revenue_query() -> QueryDto {
    QueryDto::from("sales")
        .with_column("country")
        .with_criteria(Criteria::eq("year", serde_json::json!(2024)))
        .with_measure(Measure::sum("revenue", "revenue"))
}

#[test]
fn test_second_identical_query_hits_the_cache() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let first = executor.execute_query(&revenue_query()).unwrap();
    assert_eq!(engine.call_count(), 1);

    let mut stats = CacheStats::default();
    let options = QueryOptions {
        cache_stats: Some(&mut stats),
        ..QueryOptions::default()
    };
    let second = executor.execute_query_with(&revenue_query(), options).unwrap();

    // Same result, zero new backend calls, observable hits.
    assert_eq!(first, second);
    assert_eq!(engine.call_count(), 1);
    assert!(stats.hit_count >= 1);
}

#[test]
fn test_partial_hit_fetches_only_missing_measures() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    executor.execute_query(&revenue_query()).unwrap();
    assert_eq!(engine.call_count(), 1);

    let wider = revenue_query().with_measure(Measure::sum("cost", "cost"));
    let result = executor.execute_query(&wider).unwrap();

    assert_eq!(engine.call_count(), 2);
    let aliases = engine.fetched_aliases(1);
    assert!(aliases.iter().any(|a| a == "cost"));
    assert!(!aliases.iter().any(|a| a == "revenue"));
    // The cached revenue column still reaches the result.
    assert_eq!(column(&result, "revenue"), common::floats(&[10.0, 20.0]));
    assert_eq!(column(&result, "cost"), common::floats(&[6.0, 10.0]));
}

#[test]
fn test_invalidate_clears_before_the_query() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let first = executor.execute_query(&revenue_query()).unwrap();
    assert_eq!(engine.call_count(), 1);

    let invalidating = revenue_query().with_cache_mode(CacheMode::Invalidate);
    let second = executor.execute_query(&invalidating).unwrap();

    // Fresh backend traffic, identical result.
    assert_eq!(engine.call_count(), 2);
    assert_eq!(first, second);

    // And the re-fetched columns were cached again.
    executor.execute_query(&revenue_query()).unwrap();
    assert_eq!(engine.call_count(), 2);
}

#[test]
fn test_not_use_bypasses_the_cache_entirely() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let bypass = revenue_query().with_cache_mode(CacheMode::NotUse);
    executor.execute_query(&bypass).unwrap();
    executor.execute_query(&bypass).unwrap();
    assert_eq!(engine.call_count(), 2);

    // Nothing was cached along the way either.
    executor.execute_query(&revenue_query()).unwrap();
    assert_eq!(engine.call_count(), 3);
}

#[test]
fn test_grouping_measures_are_never_cached() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let query = revenue_query().with_rollup("country");
    executor.execute_query(&query).unwrap();
    executor.execute_query(&query).unwrap();

    // The second query still fetches: grouping measures are non-cacheable.
    assert_eq!(engine.call_count(), 2);
    let aliases = engine.fetched_aliases(1);
    assert!(aliases.iter().any(|a| a == "___grouping___country___"));
    // The cached sum does not travel again.
    assert!(!aliases.iter().any(|a| a == "revenue"));
}

#[test]
fn test_distinct_scopes_do_not_share_entries() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    executor.execute_query(&revenue_query()).unwrap();

    let other_filter = QueryDto::from("sales")
        .with_column("country")
        .with_criteria(Criteria::eq("year", serde_json::json!(2023)))
        .with_measure(Measure::sum("revenue", "revenue"));
    let result = executor.execute_query(&other_filter).unwrap();

    assert_eq!(engine.call_count(), 2);
    assert_eq!(column(&result, "revenue"), common::floats(&[8.0, 15.0]));
}

#[test]
fn test_cache_partitions_by_principal() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let alice = || QueryOptions {
        principal: Some("alice".to_string()),
        ..QueryOptions::default()
    };
    let bob = || QueryOptions {
        principal: Some("bob".to_string()),
        ..QueryOptions::default()
    };

    executor.execute_query_with(&revenue_query(), alice()).unwrap();
    assert_eq!(engine.call_count(), 1);

    // Bob's partition is cold even for the identical query.
    executor.execute_query_with(&revenue_query(), bob()).unwrap();
    assert_eq!(engine.call_count(), 2);

    // Alice invalidates only her own partition.
    let invalidating = revenue_query().with_cache_mode(CacheMode::Invalidate);
    executor.execute_query_with(&invalidating, alice()).unwrap();
    assert_eq!(engine.call_count(), 3);
    executor.execute_query_with(&revenue_query(), bob()).unwrap();
    assert_eq!(engine.call_count(), 3);
}

#[test]
fn test_use_then_use_roundtrip_is_stable() {
    let engine = sales_engine();
    let executor = QueryExecutor::new(engine.clone());

    let query = revenue_query()
        .with_rollup("country")
        .with_measure(Measure::avg("avg_cost", "cost"));
    let first = executor.execute_query(&query).unwrap();
    let second = executor.execute_query(&query).unwrap();
    assert_eq!(first, second);
}
