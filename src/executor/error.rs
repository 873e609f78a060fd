//! Execution errors

use std::fmt;

use crate::engine::EngineError;
use crate::plan::PlanError;
use crate::resolver::ResolveError;

#[derive(Debug)]
pub enum ExecuteError {
    /// The query failed validation; no backend call was made
    Resolve(ResolveError),
    /// The dependency graph could not be ordered
    Plan(PlanError),
    /// The backend failed
    Engine(EngineError),
    /// An unsupported request shape (rollup in a pivot query, mismatched
    /// pivot axes)
    InvalidQuery(String),
    /// The query's cancellation token was triggered
    Cancelled,
    /// The query's deadline elapsed
    Timeout,
    /// A pipeline invariant was broken
    Internal(String),
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::Resolve(e) => write!(f, "{}", e),
            ExecuteError::Plan(e) => write!(f, "{}", e),
            ExecuteError::Engine(e) => write!(f, "{}", e),
            ExecuteError::InvalidQuery(msg) => write!(f, "Invalid query: {}", msg),
            ExecuteError::Cancelled => write!(f, "Query was cancelled"),
            ExecuteError::Timeout => write!(f, "Query deadline elapsed"),
            ExecuteError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecuteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecuteError::Resolve(e) => Some(e),
            ExecuteError::Plan(e) => Some(e),
            ExecuteError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResolveError> for ExecuteError {
    fn from(e: ResolveError) -> Self {
        ExecuteError::Resolve(e)
    }
}

impl From<PlanError> for ExecuteError {
    fn from(e: PlanError) -> Self {
        ExecuteError::Plan(e)
    }
}

impl From<EngineError> for ExecuteError {
    fn from(e: EngineError) -> Self {
        ExecuteError::Engine(e)
    }
}
