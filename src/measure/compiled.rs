//! Compiled measures
//!
//! Compiled forms are fully bound against the catalog: field strings became
//! [`TypedField`]s, alias references were inlined, filter constants became
//! [`Value`]s. They are structurally comparable and hashable so they can key
//! plan nodes and cache entries.

use std::fmt;

use crate::query::ConditionOp;
use crate::schema::{FieldType, TypedField};
use crate::value::Value;

use super::{Aggregation, BinaryOperator, ComparisonMethod};

/// Alias of the row-count measure fetched with every scope
pub const COUNT_ALIAS: &str = "_contributors_count_";

/// The row-count measure, added to every backend fetch
pub fn count_measure() -> CompiledMeasure {
    CompiledMeasure::Aggregated(CompiledAggregatedMeasure {
        alias: COUNT_ALIAS.to_string(),
        field: TypedField::synthetic("*", FieldType::Int),
        aggregation: Aggregation::Count,
        criteria: None,
    })
}

/// Alias under which the GROUPING() value of `field` travels.
///
/// The alias embeds the field name (dots flattened to underscores) so the
/// same field yields the same alias in every scope; that collision is exactly
/// why measures with such aliases are never cached.
pub fn grouping_alias(field: &str) -> String {
    format!("___grouping___{}___", field.replace('.', "_"))
}

/// Extract the field name from a grouping alias, if `alias` is one
pub fn field_from_grouping_alias(alias: &str) -> Option<&str> {
    alias
        .strip_prefix("___grouping___")
        .and_then(|rest| rest.strip_suffix("___"))
}

/// The GROUPING() measure for one rolled-up field
pub fn grouping_measure(field: &TypedField) -> CompiledMeasure {
    CompiledMeasure::Aggregated(CompiledAggregatedMeasure {
        alias: grouping_alias(&field.name),
        field: field.clone(),
        aggregation: Aggregation::Grouping,
        criteria: None,
    })
}

/// Compiled filter tree. Leaf constants are typed [`Value`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompiledCriteria {
    And(Vec<CompiledCriteria>),
    Or(Vec<CompiledCriteria>),
    Condition {
        field: TypedField,
        op: ConditionOp,
        value: Value,
    },
}

impl CompiledCriteria {
    /// Evaluate the filter against one row, where `lookup` resolves a field
    /// to its cell value.
    pub fn matches(&self, lookup: &dyn Fn(&TypedField) -> Option<Value>) -> bool {
        match self {
            CompiledCriteria::And(parts) => parts.iter().all(|c| c.matches(lookup)),
            CompiledCriteria::Or(parts) => parts.iter().any(|c| c.matches(lookup)),
            CompiledCriteria::Condition { field, op, value } => {
                let cell = lookup(field).unwrap_or(Value::Null);
                match op {
                    ConditionOp::IsNull => cell.is_null(),
                    ConditionOp::IsNotNull => !cell.is_null(),
                    ConditionOp::Eq => cell == *value,
                    ConditionOp::Ne => cell != *value,
                    ConditionOp::Lt => !cell.is_null() && cell.compare(value).is_lt(),
                    ConditionOp::Le => !cell.is_null() && cell.compare(value).is_le(),
                    ConditionOp::Gt => !cell.is_null() && cell.compare(value).is_gt(),
                    ConditionOp::Ge => !cell.is_null() && cell.compare(value).is_ge(),
                    ConditionOp::In => value_list_contains(value, &cell),
                    ConditionOp::NotIn => !cell.is_null() && !value_list_contains(value, &cell),
                }
            }
        }
    }
}

fn value_list_contains(list: &Value, cell: &Value) -> bool {
    match list {
        Value::IntList(items) => matches!(cell, Value::Int(i) if items.contains(i)),
        Value::StrList(items) => matches!(cell, Value::Str(s) if items.contains(s)),
        single => cell == single,
    }
}

/// Primitive aggregate, computed by the backend in a single aggregation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledAggregatedMeasure {
    pub alias: String,
    pub field: TypedField,
    pub aggregation: Aggregation,
    /// Measure-local filter, restricting the aggregated rows
    pub criteria: Option<CompiledCriteria>,
}

/// Arithmetic over two operand measures
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledBinaryMeasure {
    pub alias: String,
    pub op: BinaryOperator,
    pub left: Box<CompiledMeasure>,
    pub right: Box<CompiledMeasure>,
}

/// Period shift bound to a typed field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledPeriodShift {
    pub field: TypedField,
    pub offset: i64,
}

impl CompiledPeriodShift {
    /// Apply the shift to a period value. Integer periods shift
    /// arithmetically, dates by days; the total marker is left in place so
    /// super-aggregate rows compare against super-aggregate rows.
    pub fn apply(&self, value: &Value) -> Value {
        match value {
            Value::Int(i) => Value::Int(i + self.offset),
            Value::Date(d) => Value::Date(*d + chrono::Duration::days(self.offset)),
            Value::Total => Value::Total,
            _ => Value::Null,
        }
    }
}

/// Period-over-period comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledComparisonMeasure {
    pub alias: String,
    pub method: ComparisonMethod,
    pub measure: Box<CompiledMeasure>,
    pub shifts: Vec<CompiledPeriodShift>,
}

/// Constant column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledConstantMeasure {
    pub alias: String,
    pub value: Value,
}

/// Raw expression, handed to the backend verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledExpressionMeasure {
    pub alias: String,
    pub expression: String,
}

/// A fully resolved measure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompiledMeasure {
    Aggregated(CompiledAggregatedMeasure),
    Binary(CompiledBinaryMeasure),
    Comparison(CompiledComparisonMeasure),
    Constant(CompiledConstantMeasure),
    Expression(CompiledExpressionMeasure),
}

impl CompiledMeasure {
    pub fn alias(&self) -> &str {
        match self {
            CompiledMeasure::Aggregated(m) => &m.alias,
            CompiledMeasure::Binary(m) => &m.alias,
            CompiledMeasure::Comparison(m) => &m.alias,
            CompiledMeasure::Constant(m) => &m.alias,
            CompiledMeasure::Expression(m) => &m.alias,
        }
    }

    /// A primitive measure is one the backend computes directly
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            CompiledMeasure::Aggregated(_) | CompiledMeasure::Expression(_)
        )
    }

    /// Whether this is a GROUPING() measure
    pub fn is_grouping(&self) -> bool {
        matches!(
            self,
            CompiledMeasure::Aggregated(m) if m.aggregation == Aggregation::Grouping
        )
    }

    /// Result column type
    pub fn result_type(&self) -> FieldType {
        match self {
            CompiledMeasure::Aggregated(m) => match m.aggregation {
                Aggregation::Count | Aggregation::CountDistinct | Aggregation::Grouping => {
                    FieldType::Int
                }
                Aggregation::Avg => FieldType::Float,
                Aggregation::Sum | Aggregation::Min | Aggregation::Max => m.field.field_type,
            },
            CompiledMeasure::Binary(m) => match m.op {
                BinaryOperator::Div => FieldType::Float,
                _ => {
                    if m.left.result_type() == FieldType::Int
                        && m.right.result_type() == FieldType::Int
                    {
                        FieldType::Int
                    } else {
                        FieldType::Float
                    }
                }
            },
            CompiledMeasure::Comparison(m) => match m.method {
                ComparisonMethod::AbsoluteDifference => m.measure.result_type(),
                _ => FieldType::Float,
            },
            CompiledMeasure::Constant(m) => match m.value {
                Value::Int(_) => FieldType::Int,
                Value::Bool(_) => FieldType::Bool,
                Value::Str(_) => FieldType::Str,
                _ => FieldType::Float,
            },
            CompiledMeasure::Expression(_) => FieldType::Float,
        }
    }
}

impl fmt::Display for CompiledMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledMeasure::Aggregated(m) => {
                write!(f, "{}({}) AS {}", m.aggregation, m.field, m.alias)
            }
            CompiledMeasure::Binary(m) => {
                write!(f, "({} {} {}) AS {}", m.left.alias(), m.op, m.right.alias(), m.alias)
            }
            CompiledMeasure::Comparison(m) => {
                write!(f, "compare({}) AS {}", m.measure.alias(), m.alias)
            }
            CompiledMeasure::Constant(m) => write!(f, "{} AS {}", m.value, m.alias),
            CompiledMeasure::Expression(m) => write!(f, "{} AS {}", m.expression, m.alias),
        }
    }
}
