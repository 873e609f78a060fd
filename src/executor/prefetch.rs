//! Prefetch requirements
//!
//! [`prerequisites`] declares, per compiled-measure variant, which
//! (scope, measure) pairs must be materialized before the measure itself can
//! be evaluated. It never executes anything; the graph builder closes the
//! transitive requirement set by re-applying it to each discovered node.

use crate::measure::{
    grouping_measure, CompiledCriteria, CompiledMeasure, CompiledPeriodShift,
};
use crate::plan::QueryScope;

/// Immediate prerequisites of `measure` evaluated in `scope`, as an ordered
/// scope-to-measures mapping.
pub fn prerequisites(
    measure: &CompiledMeasure,
    scope: &QueryScope,
) -> Vec<(QueryScope, Vec<CompiledMeasure>)> {
    match measure {
        // Primitives need only themselves at the current scope; the node
        // itself already registers the scope.
        CompiledMeasure::Aggregated(_) | CompiledMeasure::Expression(_) => Vec::new(),
        CompiledMeasure::Constant(_) => Vec::new(),
        CompiledMeasure::Binary(m) => vec![(
            scope.clone(),
            vec![(*m.left).clone(), (*m.right).clone()],
        )],
        CompiledMeasure::Comparison(m) => {
            let base = (*m.measure).clone();
            let shifted = shifted_scope(scope, &m.shifts);
            if shifted == *scope {
                vec![(scope.clone(), vec![base])]
            } else {
                vec![
                    (scope.clone(), vec![base.clone()]),
                    (shifted, vec![base]),
                ]
            }
        }
    }
}

/// The scope holding a comparison's reference rows.
///
/// Period fields are appended to the grouping columns when absent, and
/// equality-style constants on period fields are shifted so the scope selects
/// the reference period instead of the current one.
pub fn shifted_scope(scope: &QueryScope, shifts: &[CompiledPeriodShift]) -> QueryScope {
    let mut columns = scope.columns.clone();
    for shift in shifts {
        if !columns.contains(&shift.field) {
            columns.push(shift.field.clone());
        }
    }
    let criteria = scope
        .criteria
        .as_ref()
        .map(|c| shift_criteria(c, shifts));
    QueryScope {
        columns,
        criteria,
        ..scope.clone()
    }
}

fn shift_criteria(criteria: &CompiledCriteria, shifts: &[CompiledPeriodShift]) -> CompiledCriteria {
    match criteria {
        CompiledCriteria::And(parts) => {
            CompiledCriteria::And(parts.iter().map(|c| shift_criteria(c, shifts)).collect())
        }
        CompiledCriteria::Or(parts) => {
            CompiledCriteria::Or(parts.iter().map(|c| shift_criteria(c, shifts)).collect())
        }
        CompiledCriteria::Condition { field, op, value } => {
            let value = match shifts.iter().find(|s| s.field == *field) {
                Some(shift) => shift.apply(value),
                None => value.clone(),
            };
            CompiledCriteria::Condition {
                field: field.clone(),
                op: *op,
                value,
            }
        }
    }
}

/// The GROUPING() measures implied by a scope's rollups and grouping sets,
/// one per rolled-up field in declaration order.
pub fn generate_grouping_measures(scope: &QueryScope) -> Vec<CompiledMeasure> {
    scope
        .rolled_up_fields()
        .into_iter()
        .map(grouping_measure)
        .collect()
}
