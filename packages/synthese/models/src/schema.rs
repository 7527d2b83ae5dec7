//! Column metadata for the `synthese` destination table.
//!
//! Mappings are validated against these sets before a run touches the
//! network: every non-nullable column must be covered, and no mapping may
//! reference a column that does not exist.

use std::collections::BTreeSet;

/// Non-nullable, non-primary-key columns. Every parser must cover these
/// through its mapping, constant fields, or dynamic fields.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "cd_nom",
    "nom_cite",
    "observers",
    "date_min",
    "date_max",
    "id_dataset",
    "id_source",
];

/// Nullable typed columns.
pub const OPTIONAL_COLUMNS: &[&str] = &[
    "unique_id_sinp",
    "entity_source_pk_value",
    "count_min",
    "count_max",
    "altitude_min",
    "altitude_max",
    "comment_context",
    "comment_description",
    "the_geom_4326",
    "the_geom_local",
    "the_geom_point",
];

/// Coded-vocabulary columns. Each maps to a fixed vocabulary category —
/// see the nomenclature table in the source framework crate.
pub const NOMENCLATURE_COLUMNS: &[&str] = &[
    "id_nomenclature_geo_object_nature",
    "id_nomenclature_grp_typ",
    "id_nomenclature_obs_technique",
    "id_nomenclature_bio_status",
    "id_nomenclature_bio_condition",
    "id_nomenclature_naturalness",
    "id_nomenclature_exist_proof",
    "id_nomenclature_valid_status",
    "id_nomenclature_diffusion_level",
    "id_nomenclature_life_stage",
    "id_nomenclature_sex",
    "id_nomenclature_obj_count",
    "id_nomenclature_type_count",
    "id_nomenclature_sensitivity",
    "id_nomenclature_observation_status",
    "id_nomenclature_blurring",
    "id_nomenclature_source_status",
    "id_nomenclature_info_geo_type",
    "id_nomenclature_behaviour",
    "id_nomenclature_determination_method",
];

/// Returns the set of required destination columns.
#[must_use]
pub fn required_columns() -> BTreeSet<&'static str> {
    REQUIRED_COLUMNS.iter().copied().collect()
}

/// Returns the set of every destination column a mapping may reference.
#[must_use]
pub fn all_columns() -> BTreeSet<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .chain(OPTIONAL_COLUMNS)
        .chain(NOMENCLATURE_COLUMNS)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_is_subset_of_all() {
        let all = all_columns();
        for column in required_columns() {
            assert!(all.contains(column), "{column} missing from all_columns");
        }
    }

    #[test]
    fn no_duplicate_columns() {
        let total = REQUIRED_COLUMNS.len() + OPTIONAL_COLUMNS.len() + NOMENCLATURE_COLUMNS.len();
        assert_eq!(all_columns().len(), total);
    }

    #[test]
    fn nomenclature_columns_share_prefix() {
        for column in NOMENCLATURE_COLUMNS {
            assert!(column.starts_with("id_nomenclature_"), "{column}");
        }
    }
}
