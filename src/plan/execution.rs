//! Topological execution of a dependency graph

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::hash::Hash;

use super::error::PlanError;
use super::graph::DependencyGraph;

/// A stable topological ordering of a [`DependencyGraph`].
///
/// Kahn's algorithm with ready nodes drained in insertion order, so the same
/// graph always executes in the same order.
pub struct ExecutionPlan<'a, N> {
    graph: &'a DependencyGraph<N>,
    order: Vec<usize>,
}

impl<'a, N: Eq + Hash + Clone> ExecutionPlan<'a, N> {
    pub fn new(graph: &'a DependencyGraph<N>) -> Result<Self, PlanError> {
        let n = graph.len();
        let mut remaining: Vec<usize> = (0..n).map(|i| graph.dependencies_of(i).len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            for &dep in graph.dependencies_of(i) {
                dependents[dep].push(i);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| remaining[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &dependent in &dependents[i] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != n {
            return Err(PlanError::CycleDetected);
        }
        Ok(Self { graph, order })
    }

    /// Nodes in execution order, dependencies first
    pub fn ordered(&self) -> impl Iterator<Item = &N> {
        self.order.iter().map(|&i| self.graph.node(i))
    }

    /// Invoke `f` once per node, dependencies first; the first error aborts
    pub fn execute<E>(&self, mut f: impl FnMut(&N) -> Result<(), E>) -> Result<(), E> {
        for node in self.ordered() {
            f(node)?;
        }
        Ok(())
    }
}
