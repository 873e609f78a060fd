//! # cubeplan
//!
//! Query planning and execution core for multidimensional analytics.
//!
//! cubeplan compiles declarative queries (dimensions, measures, filters,
//! rollups, pivots) into a dependency graph of intermediate tabular results,
//! prefetches primitive aggregates from a backing [`QueryEngine`], evaluates
//! computed measures in dependency order, caches reusable columns across
//! queries, and shapes the final [`ColumnarTable`] or [`PivotTable`] for the
//! user.
//!
//! ## Usage
//!
//! ```ignore
//! use cubeplan::{Measure, QueryDto, QueryExecutor};
//!
//! let executor = QueryExecutor::new(engine);
//! let query = QueryDto::from("sales")
//!     .with_column("country")
//!     .with_rollup("country")
//!     .with_measure(Measure::sum("revenue", "revenue"));
//!
//! let result = executor.execute_query(&query)?;
//! println!("{}", result);
//! ```

pub mod cache;
pub mod engine;
pub mod executor;
pub mod loader;
pub mod measure;
pub mod plan;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod table;
pub mod value;

pub use cache::{CacheKey, CacheStats, EmptyQueryCache, GlobalCache, LruQueryCache, Principal, QueryCache};
pub use engine::{DatabaseQuery, Datastore, EngineError, EngineErrorKind, QueryEngine};
pub use executor::{
    default_query_limit, CancellationToken, ExecuteError, QueryExecutor, QueryOptions,
};
pub use loader::{BatchLoader, DataLoader, LoadError, TableWriter};
pub use measure::{Aggregation, BinaryOperator, ComparisonMethod, Measure, PeriodShift};
pub use plan::{DependencyGraph, ExecutionPlan, QueryPlanNodeKey, QueryScope};
pub use query::{
    CacheMode, ColumnSet, ConditionOp, Criteria, GroupColumnSet, GroupDto, Order, OrderBy,
    PivotQueryDto, QueryDto,
};
pub use resolver::{QueryResolver, ResolveError};
pub use schema::{Catalog, Field, FieldType, Store, TypedField};
pub use table::{ColumnarTable, Header, PivotTable};
pub use value::Value;
