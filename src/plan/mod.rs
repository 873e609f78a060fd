//! Query planning primitives
//!
//! A query compiles into a DAG of [`QueryPlanNodeKey`] nodes, one per
//! (scope, measure) pair. The [`ExecutionPlan`] walks the DAG in a stable
//! topological order, dependencies first.

mod error;
mod execution;
mod graph;
mod scope;

use crate::measure::CompiledMeasure;

pub use error::PlanError;
pub use execution::ExecutionPlan;
pub use graph::{DependencyGraph, GraphDependencyBuilder};
pub use scope::QueryScope;

/// Identity of one unit of work: a measure evaluated in a grouping scope.
/// Nodes with equal keys are fungible and merge in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPlanNodeKey {
    pub scope: QueryScope,
    pub measure: CompiledMeasure,
}

impl QueryPlanNodeKey {
    pub fn new(scope: QueryScope, measure: CompiledMeasure) -> Self {
        Self { scope, measure }
    }
}
