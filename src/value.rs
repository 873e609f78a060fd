//! Cell values
//!
//! A [`Value`] is the unit stored in table cells, filter constants and
//! constant measures. Columns are heterogeneous `Vec<Value>` so that rollup
//! super-aggregates can carry the total marker regardless of the column type.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime};

/// A single cell value.
///
/// `Total` is the internal marker written into grouping cells of rollup /
/// grouping-set super-aggregate rows. It is turned into a display string
/// ("Total" / "Grand Total") only by the post-processor.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Total,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    IntList(Vec<i64>),
    StrList(Vec<String>),
    /// Opaque object, kept as parsed JSON
    Object(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_total(&self) -> bool {
        matches!(self, Value::Total)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert a JSON literal (filter constant, constant measure, group
    /// member) into a `Value`. Integers stay integers; other numbers become
    /// floats; arrays of homogeneous scalars become lists; anything else is
    /// kept as an opaque object.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                if items.iter().all(|v| v.as_i64().is_some()) {
                    Value::IntList(items.iter().filter_map(|v| v.as_i64()).collect())
                } else if items.iter().all(|v| v.is_string()) {
                    Value::StrList(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    )
                } else {
                    Value::Object(json.clone())
                }
            }
            other => Value::Object(other.clone()),
        }
    }

    /// Inverse of [`Value::from_json`], used when a value must travel as
    /// JSON text (opaque-object fields in the loader).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Total => serde_json::Value::String("<total>".to_string()),
            Value::Int(i) => serde_json::json!(i),
            Value::Float(f) => serde_json::json!(f),
            Value::Bool(b) => serde_json::json!(b),
            Value::Str(s) => serde_json::json!(s),
            Value::Date(d) => serde_json::json!(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(d) => serde_json::json!(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::IntList(l) => serde_json::json!(l),
            Value::StrList(l) => serde_json::json!(l),
            Value::Object(o) => o.clone(),
        }
    }

    /// Rank used to order values of different kinds against each other.
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::DateTime(_) => 4,
            Value::Str(_) => 5,
            Value::IntList(_) => 6,
            Value::StrList(_) => 7,
            Value::Object(_) => 8,
            Value::Total => 9,
        }
    }

    /// Total order over values: nulls first, totals last, numbers compared
    /// across int/float, otherwise by kind then natural order.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Total, Value::Total) => Ordering::Equal,
            (Value::Total, _) => Ordering::Greater,
            (_, Value::Total) => Ordering::Less,
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Int(a), Value::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::Float(a), Value::Int(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::IntList(a), Value::IntList(b)) => a.cmp(b),
            (Value::StrList(a), Value::StrList(b)) => a.cmp(b),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

// Arithmetic used by the evaluator. Null propagates; int/int division
// promotes to float; division by zero yields null.

impl Value {
    pub fn add(&self, other: &Value) -> Value {
        numeric_op(self, other, |a, b| a + b, |a, b| Some(a + b))
    }

    pub fn sub(&self, other: &Value) -> Value {
        numeric_op(self, other, |a, b| a - b, |a, b| Some(a - b))
    }

    pub fn mul(&self, other: &Value) -> Value {
        numeric_op(self, other, |a, b| a * b, |a, b| Some(a * b))
    }

    pub fn div(&self, other: &Value) -> Value {
        match (self.as_f64(), other.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Value::Null,
            (Some(a), Some(b)) => Value::Float(a / b),
            _ => Value::Null,
        }
    }
}

fn numeric_op(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> Option<f64>,
) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => float_op(a, b).map(Value::Float).unwrap_or(Value::Null),
            _ => Value::Null,
        },
    }
}

// Structural equality. Floats compare by bit pattern so Value can be a hash
// map key (scope criteria, row keys).

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Total, Value::Total) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::IntList(a), Value::IntList(b)) => a == b,
            (Value::StrList(a), Value::StrList(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.kind_rank());
        match self {
            Value::Null | Value::Total => {}
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::IntList(l) => l.hash(state),
            Value::StrList(l) => l.hash(state),
            // serde_json::Value has no Hash; its canonical rendering does.
            Value::Object(o) => o.to_string().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Total => write!(f, "<total>"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
            Value::IntList(l) => {
                let parts: Vec<String> = l.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::StrList(l) => write!(f, "[{}]", l.join(", ")),
            Value::Object(o) => write!(f, "{}", o),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_numbers_across_kinds() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).compare(&Value::Int(3)), Ordering::Equal);
    }

    #[test]
    fn test_totals_sort_last_and_nulls_first() {
        assert_eq!(Value::Total.compare(&Value::Str("zz".into())), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Int(i64::MIN)), Ordering::Less);
        assert_eq!(Value::Total.compare(&Value::Total), Ordering::Equal);
    }

    #[test]
    fn test_division_semantics() {
        assert_eq!(Value::Int(10).div(&Value::Int(4)), Value::Float(2.5));
        assert_eq!(Value::Int(1).div(&Value::Int(0)), Value::Null);
        assert_eq!(Value::Null.div(&Value::Int(2)), Value::Null);
    }

    #[test]
    fn test_int_arithmetic_stays_int() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Value::Int(5));
        assert_eq!(Value::Int(2).mul(&Value::Float(3.0)), Value::Float(6.0));
    }

    #[test]
    fn test_null_propagation() {
        assert_eq!(Value::Null.add(&Value::Int(1)), Value::Null);
        assert_eq!(Value::Str("a".into()).sub(&Value::Int(1)), Value::Null);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from_json(&serde_json::json!(["a", "b"])),
            Value::StrList(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            Value::from_json(&serde_json::json!([1, 2])),
            Value::IntList(vec![1, 2])
        );
    }
}
