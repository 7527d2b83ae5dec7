//! Mapping validation against the destination schema.

use std::collections::BTreeSet;

use obs_sync_synthese_models::schema;

use crate::SourceError;

/// Checks a set of declared destination columns against the `synthese`
/// schema: no unknown columns, and every required column covered.
///
/// Call with the union of a parser's mapping, constant, and dynamic
/// columns. No side effects — purely a set comparison.
///
/// # Errors
///
/// Returns [`SourceError::Config`] naming the offending columns.
pub fn validate_mapping(declared: &BTreeSet<String>) -> Result<(), SourceError> {
    let all = schema::all_columns();
    let required = schema::required_columns();

    let unknown: Vec<&str> = declared
        .iter()
        .map(String::as_str)
        .filter(|column| !all.contains(column))
        .collect();
    if !unknown.is_empty() {
        return Err(SourceError::Config(format!(
            "mapping references column(s) absent from the synthese schema: {}",
            unknown.join(", ")
        )));
    }

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| !declared.contains(*column))
        .collect();
    if !missing.is_empty() {
        return Err(SourceError::Config(format!(
            "mapping does not cover required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}
