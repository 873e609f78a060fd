//! Resolution errors

use std::fmt;

use crate::schema::FieldType;

#[derive(Debug)]
pub enum ResolveError {
    /// The query references a store absent from the catalog
    UnknownStore(String),
    /// The query references a field absent from its store
    UnknownField { store: String, field: String },
    /// A filter constant does not fit the field's type
    TypeMismatch {
        field: String,
        expected: FieldType,
        value: String,
    },
    /// Two measures of the query share an alias
    DuplicateAlias(String),
    /// A measure references an alias that no query measure defines
    UnresolvedMeasure(String),
    /// Alias references form a cycle through this alias
    CyclicMeasure(String),
    /// A rollup or grouping-set column is not among the grouped columns
    RollupColumnNotGrouped(String),
    /// A comparison measure is not computable in its scope
    InvalidComparison(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnknownStore(name) => {
                write!(f, "Unknown store '{}'", name)
            }
            ResolveError::UnknownField { store, field } => {
                write!(f, "Unknown field '{}' in store '{}'", field, store)
            }
            ResolveError::TypeMismatch { field, expected, value } => {
                write!(
                    f,
                    "Value '{}' does not match type {} of field '{}'",
                    value, expected, field
                )
            }
            ResolveError::DuplicateAlias(alias) => {
                write!(f, "Measure alias '{}' is used more than once", alias)
            }
            ResolveError::UnresolvedMeasure(alias) => {
                write!(f, "No measure with alias '{}' in this query", alias)
            }
            ResolveError::CyclicMeasure(alias) => {
                write!(f, "Measure alias references form a cycle through '{}'", alias)
            }
            ResolveError::RollupColumnNotGrouped(field) => {
                write!(f, "Rollup column '{}' is not part of the query columns", field)
            }
            ResolveError::InvalidComparison(msg) => {
                write!(f, "Invalid comparison measure: {}", msg)
            }
        }
    }
}

impl std::error::Error for ResolveError {}
