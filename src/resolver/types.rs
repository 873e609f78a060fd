//! Resolved query types

use crate::schema::TypedField;
use crate::value::Value;

/// A GROUP column-set bound against the catalog.
///
/// `new_field` is the synthetic group column added by the reshape; `field` is
/// the source dimension whose values the groups enumerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGroupColumnSet {
    pub new_field: TypedField,
    pub field: TypedField,
    pub groups: Vec<(String, Vec<Value>)>,
}

impl CompiledGroupColumnSet {
    /// Group names in declaration order
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    /// Source values in declaration order, without duplicates
    pub fn ordered_values(&self) -> Vec<&Value> {
        let mut seen: Vec<&Value> = Vec::new();
        for (_, values) in &self.groups {
            for v in values {
                if !seen.contains(&v) {
                    seen.push(v);
                }
            }
        }
        seen
    }
}
