//! Measure definitions
//!
//! A [`Measure`] is the client-facing description of a value to compute:
//! either a primitive aggregate the backend evaluates directly, or a
//! calculation over other measures (arithmetic, period-over-period
//! comparison, constant). The resolver turns measures into
//! [`CompiledMeasure`]s with catalog-typed fields.

mod compiled;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::query::Criteria;

pub use compiled::{
    count_measure, field_from_grouping_alias, grouping_alias, grouping_measure, CompiledAggregatedMeasure,
    CompiledBinaryMeasure, CompiledComparisonMeasure, CompiledConstantMeasure, CompiledCriteria,
    CompiledExpressionMeasure, CompiledMeasure, CompiledPeriodShift, COUNT_ALIAS,
};

/// Aggregation functions for primitive measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    CountDistinct,
    /// SQL GROUPING(): 1 on super-aggregate rows where the field is rolled up
    Grouping,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Count => write!(f, "count"),
            Aggregation::CountDistinct => write!(f, "count_distinct"),
            Aggregation::Grouping => write!(f, "grouping"),
        }
    }
}

/// Error when parsing an aggregation string
#[derive(Debug, Clone)]
pub struct ParseAggregationError {
    pub input: String,
}

impl fmt::Display for ParseAggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown aggregation '{}'. Valid options: sum, avg, min, max, count, count_distinct, grouping",
            self.input
        )
    }
}

impl std::error::Error for ParseAggregationError {}

impl FromStr for Aggregation {
    type Err = ParseAggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "avg" | "average" => Ok(Aggregation::Avg),
            "min" | "minimum" => Ok(Aggregation::Min),
            "max" | "maximum" => Ok(Aggregation::Max),
            "count" => Ok(Aggregation::Count),
            "count_distinct" | "countdistinct" | "distinct_count" => Ok(Aggregation::CountDistinct),
            "grouping" => Ok(Aggregation::Grouping),
            _ => Err(ParseAggregationError { input: s.to_string() }),
        }
    }
}

impl<'de> Deserialize<'de> for Aggregation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Aggregation::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Aggregation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Binary arithmetic operator for computed measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Sub => write!(f, "-"),
            BinaryOperator::Mul => write!(f, "*"),
            BinaryOperator::Div => write!(f, "/"),
        }
    }
}

/// How a comparison measure combines the current value with its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMethod {
    AbsoluteDifference,
    RelativeDifference,
    Divide,
}

/// Reference-position transformation of one period field.
///
/// `offset` is applied to the row's period value to locate the reference row:
/// integer fields shift arithmetically, date fields shift by days.
#[derive(Debug, Clone, Deserialize)]
pub struct PeriodShift {
    pub field: String,
    pub offset: i64,
}

/// A measure: the polymorphic description of one value column of the result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    /// Primitive aggregate computed by the backend
    Aggregated {
        alias: String,
        field: String,
        aggregation: Aggregation,
        #[serde(default)]
        criteria: Option<Criteria>,
    },
    /// Arithmetic over two operand measures
    Binary {
        alias: String,
        op: BinaryOperator,
        left: Box<Measure>,
        right: Box<Measure>,
    },
    /// Period-over-period comparison of a base measure
    Comparison {
        alias: String,
        method: ComparisonMethod,
        measure: Box<Measure>,
        shifts: Vec<PeriodShift>,
    },
    /// Constant column
    Constant { alias: String, value: serde_json::Value },
    /// Raw expression evaluated by the backend
    Expression { alias: String, expression: String },
    /// Reference to another measure of the same query, by alias
    Ref(String),
}

impl Measure {
    /// The alias naming this measure's result column. `Ref` has none of its
    /// own; it borrows the referenced measure's.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Measure::Aggregated { alias, .. }
            | Measure::Binary { alias, .. }
            | Measure::Comparison { alias, .. }
            | Measure::Constant { alias, .. }
            | Measure::Expression { alias, .. } => Some(alias),
            Measure::Ref(_) => None,
        }
    }

    pub fn sum(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self::aggregated(alias, field, Aggregation::Sum)
    }

    pub fn avg(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self::aggregated(alias, field, Aggregation::Avg)
    }

    pub fn min(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self::aggregated(alias, field, Aggregation::Min)
    }

    pub fn max(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self::aggregated(alias, field, Aggregation::Max)
    }

    pub fn aggregated(
        alias: impl Into<String>,
        field: impl Into<String>,
        aggregation: Aggregation,
    ) -> Self {
        Measure::Aggregated {
            alias: alias.into(),
            field: field.into(),
            aggregation,
            criteria: None,
        }
    }

    pub fn binary(
        alias: impl Into<String>,
        op: BinaryOperator,
        left: Measure,
        right: Measure,
    ) -> Self {
        Measure::Binary {
            alias: alias.into(),
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comparison(
        alias: impl Into<String>,
        method: ComparisonMethod,
        measure: Measure,
        shifts: Vec<PeriodShift>,
    ) -> Self {
        Measure::Comparison {
            alias: alias.into(),
            method,
            measure: Box::new(measure),
            shifts,
        }
    }

    pub fn constant(alias: impl Into<String>, value: serde_json::Value) -> Self {
        Measure::Constant { alias: alias.into(), value }
    }

    pub fn reference(alias: impl Into<String>) -> Self {
        Measure::Ref(alias.into())
    }
}
