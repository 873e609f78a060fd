//! Field type definitions

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Supported field types in the datastore catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Boolean
    Bool,
    /// Calendar date
    Date,
    /// Date and time of day
    DateTime,
    /// Variable-length string
    Str,
    /// Repeated integer
    IntList,
    /// Repeated string
    StrList,
    /// Opaque object, serialized as JSON
    Object,
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Str
    }
}

impl FieldType {
    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Check if this is a temporal type
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }

    /// Check if this is a repeated type
    pub fn is_list(&self) -> bool {
        matches!(self, FieldType::IntList | FieldType::StrList)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Date => write!(f, "date"),
            FieldType::DateTime => write!(f, "datetime"),
            FieldType::Str => write!(f, "string"),
            FieldType::IntList => write!(f, "int_list"),
            FieldType::StrList => write!(f, "string_list"),
            FieldType::Object => write!(f, "object"),
        }
    }
}

/// Error when parsing a field type string
#[derive(Debug, Clone)]
pub struct ParseFieldTypeError {
    pub input: String,
}

impl fmt::Display for ParseFieldTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown field type '{}'. Valid options: int, float, bool, date, datetime, string, int_list, string_list, object",
            self.input
        )
    }
}

impl std::error::Error for ParseFieldTypeError {}

impl FromStr for FieldType {
    type Err = ParseFieldTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int" | "integer" | "long" | "bigint" => Ok(FieldType::Int),
            "float" | "double" => Ok(FieldType::Float),
            "bool" | "boolean" => Ok(FieldType::Bool),
            "date" => Ok(FieldType::Date),
            "datetime" | "timestamp" => Ok(FieldType::DateTime),
            "string" | "text" | "varchar" => Ok(FieldType::Str),
            "int_list" | "long_list" => Ok(FieldType::IntList),
            "string_list" | "text_list" => Ok(FieldType::StrList),
            "object" | "json" => Ok(FieldType::Object),
            _ => Err(ParseFieldTypeError { input: s.to_string() }),
        }
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldType::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for FieldType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_types() {
        assert_eq!("int".parse::<FieldType>().unwrap(), FieldType::Int);
        assert_eq!("LONG".parse::<FieldType>().unwrap(), FieldType::Int);
        assert_eq!("double".parse::<FieldType>().unwrap(), FieldType::Float);
        assert_eq!("string".parse::<FieldType>().unwrap(), FieldType::Str);
        assert_eq!("datetime".parse::<FieldType>().unwrap(), FieldType::DateTime);
        assert_eq!("string_list".parse::<FieldType>().unwrap(), FieldType::StrList);
    }

    #[test]
    fn test_parse_unknown() {
        assert!("decimal".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for ft in [
            FieldType::Int,
            FieldType::Float,
            FieldType::Bool,
            FieldType::Date,
            FieldType::DateTime,
            FieldType::Str,
            FieldType::IntList,
            FieldType::StrList,
            FieldType::Object,
        ] {
            assert_eq!(ft.to_string().parse::<FieldType>().unwrap(), ft);
        }
    }

    #[test]
    fn test_type_predicates() {
        assert!(FieldType::Int.is_numeric());
        assert!(!FieldType::Str.is_numeric());
        assert!(FieldType::Date.is_temporal());
        assert!(FieldType::StrList.is_list());
        assert!(!FieldType::Object.is_list());
    }
}
