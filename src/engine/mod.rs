//! Backend contract
//!
//! The planner talks to storage exclusively through [`QueryEngine`]: one call
//! per scope, returning a columnar table whose dimension columns are exactly
//! the scope's grouping columns followed by one column per requested measure,
//! with nulls in rolled-up dimensions of super-aggregate rows.

use std::fmt;

use crate::measure::CompiledMeasure;
use crate::plan::QueryScope;
use crate::schema::Catalog;

/// One backend fetch: a scope plus the primitive measures to materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseQuery {
    pub scope: QueryScope,
    pub measures: Vec<CompiledMeasure>,
}

impl DatabaseQuery {
    pub fn new(scope: QueryScope, measures: Vec<CompiledMeasure>) -> Self {
        Self { scope, measures }
    }
}

/// Schema catalog provider
pub trait Datastore: Send + Sync {
    fn catalog(&self) -> &Catalog;
}

/// The backing query engine
pub trait QueryEngine: Send + Sync {
    /// Materialize the primitive aggregates of one scope
    fn execute(&self, query: &DatabaseQuery) -> Result<crate::table::ColumnarTable, EngineError>;

    /// Pass a raw SQL string through to the backend
    fn execute_raw_sql(&self, sql: &str) -> Result<crate::table::ColumnarTable, EngineError>;

    fn datastore(&self) -> &dyn Datastore;
}

/// Classification of a backend failure, driving retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Worth retrying with backoff (eventual consistency, throttling)
    Transient,
    /// Retrying will not help
    Permanent,
    /// Object creation conflict
    AlreadyExists,
    /// The referenced table does not exist
    UnknownTable,
}

/// Error returned by a backend
#[derive(Debug, Clone)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::AlreadyExists,
            message: message.into(),
        }
    }

    pub fn unknown_table(name: &str) -> Self {
        Self {
            kind: EngineErrorKind::UnknownTable,
            message: format!("Unknown table '{}'", name),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EngineErrorKind::Transient => "transient",
            EngineErrorKind::Permanent => "permanent",
            EngineErrorKind::AlreadyExists => "already exists",
            EngineErrorKind::UnknownTable => "unknown table",
        };
        write!(f, "Backend error ({}): {}", kind, self.message)
    }
}

impl std::error::Error for EngineError {}
