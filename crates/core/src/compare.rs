//! Assertion engine: attribute-by-attribute comparison.

use crate::types::{ExpectedState, Mismatch, MismatchReport, ObservedState};

/// Compares `expected` against `observed`.
///
/// - attributes observed but not expected are ignored
/// - expected attributes missing from `observed` are reported with `observed: None`
/// - equality is exact: no numeric tolerance, case-sensitive strings, no
///   cross-type coercion
///
/// Entries are ordered by attribute name, so the report does not depend on
/// the order in which `expected` was built.
pub fn compare(expected: &ExpectedState, observed: &ObservedState) -> MismatchReport {
    let entries = expected
        .iter()
        .filter_map(|(attribute, want)| match observed.get(attribute) {
            Some(got) if got == want => None,
            got => Some(Mismatch {
                attribute: attribute.to_owned(),
                expected: want.clone(),
                observed: got.cloned(),
            }),
        })
        .collect();
    MismatchReport::new(entries)
}
