//! Query scopes

use crate::measure::CompiledCriteria;
use crate::schema::TypedField;

/// The grouping context in which a measure is evaluated: which store is
/// read, which columns group the rows, which of those are rolled up, and
/// which filter restricts the input.
///
/// Scopes compare structurally; two equal scopes describe the same backend
/// result and may share one fetch and one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryScope {
    pub store: String,
    pub columns: Vec<TypedField>,
    pub rollup: Vec<TypedField>,
    pub grouping_sets: Vec<Vec<TypedField>>,
    pub criteria: Option<CompiledCriteria>,
    pub limit: i64,
}

impl QueryScope {
    /// Identical scope with a different limit
    pub fn copy_with_new_limit(&self, limit: i64) -> Self {
        Self { limit, ..self.clone() }
    }

    /// Whether the backend will emit super-aggregate rows for this scope
    pub fn has_super_aggregates(&self) -> bool {
        !self.rollup.is_empty() || !self.grouping_sets.is_empty()
    }

    /// Every field that can be rolled up in a super-aggregate row: the
    /// rollup columns, plus any grouped column at least one grouping set
    /// leaves out. Declaration order, no duplicates.
    pub fn rolled_up_fields(&self) -> Vec<&TypedField> {
        let mut fields: Vec<&TypedField> = Vec::new();
        for f in &self.rollup {
            if !fields.contains(&f) {
                fields.push(f);
            }
        }
        if !self.grouping_sets.is_empty() {
            for f in &self.columns {
                if self.grouping_sets.iter().any(|set| !set.contains(f)) && !fields.contains(&f) {
                    fields.push(f);
                }
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn scope() -> QueryScope {
        QueryScope {
            store: "sales".to_string(),
            columns: vec![TypedField::new("sales", "country", FieldType::Str)],
            rollup: vec![TypedField::new("sales", "country", FieldType::Str)],
            grouping_sets: Vec::new(),
            criteria: None,
            limit: 100,
        }
    }

    #[test]
    fn test_copy_with_new_limit_only_changes_limit() {
        let a = scope();
        let b = a.copy_with_new_limit(101);
        assert_ne!(a, b);
        assert_eq!(a, b.copy_with_new_limit(100));
    }

    #[test]
    fn test_rolled_up_fields_dedup() {
        let mut s = scope();
        s.grouping_sets = vec![vec![TypedField::new("sales", "country", FieldType::Str)]];
        assert_eq!(s.rolled_up_fields().len(), 1);
        assert!(s.has_super_aggregates());
    }
}
