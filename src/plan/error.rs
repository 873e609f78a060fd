//! Planning errors

use std::fmt;

#[derive(Debug)]
pub enum PlanError {
    /// The dependency graph contains a cycle. Measure trees cannot produce
    /// one by construction; seeing this means alias resolution let a
    /// self-reference through.
    CycleDetected,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::CycleDetected => {
                write!(f, "Dependency graph contains a cycle")
            }
        }
    }
}

impl std::error::Error for PlanError {}
