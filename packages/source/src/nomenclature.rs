//! Coded-vocabulary (nomenclature) resolution.
//!
//! Destination columns named `id_nomenclature_*` store coded identifiers,
//! not free text. Each column belongs to a fixed vocabulary category,
//! given by [`COLUMN_MNEMONICS`]; the source label is resolved to its
//! coded identifier through a [`NomenclatureLookup`] collaborator.

use std::collections::BTreeMap;

use crate::SourceError;

/// Column-name prefix signalling a coded-vocabulary field.
pub const NOMENCLATURE_PREFIX: &str = "id_nomenclature_";

/// Static table mapping each coded-vocabulary destination column to its
/// vocabulary category mnemonic.
pub const COLUMN_MNEMONICS: &[(&str, &str)] = &[
    ("id_nomenclature_geo_object_nature", "NAT_OBJ_GEO"),
    ("id_nomenclature_grp_typ", "TYP_GRP"),
    ("id_nomenclature_obs_technique", "METH_OBS"),
    ("id_nomenclature_bio_status", "STATUT_BIO"),
    ("id_nomenclature_bio_condition", "ETA_BIO"),
    ("id_nomenclature_naturalness", "NATURALITE"),
    ("id_nomenclature_exist_proof", "PREUVE_EXIST"),
    ("id_nomenclature_valid_status", "STATUT_VALID"),
    ("id_nomenclature_diffusion_level", "NIV_PRECIS"),
    ("id_nomenclature_life_stage", "STADE_VIE"),
    ("id_nomenclature_sex", "SEXE"),
    ("id_nomenclature_obj_count", "OBJ_DENBR"),
    ("id_nomenclature_type_count", "TYP_DENBR"),
    ("id_nomenclature_sensitivity", "SENSIBILITE"),
    ("id_nomenclature_observation_status", "STATUT_OBS"),
    ("id_nomenclature_blurring", "DEE_FLOU"),
    ("id_nomenclature_source_status", "STATUT_SOURCE"),
    ("id_nomenclature_info_geo_type", "TYP_INF_GEO"),
    ("id_nomenclature_behaviour", "OCC_COMPORTEMENT"),
    ("id_nomenclature_determination_method", "METH_DETERMIN"),
];

/// Returns `true` if a destination column stores a coded-vocabulary
/// identifier.
#[must_use]
pub fn is_nomenclature_column(column: &str) -> bool {
    column.starts_with(NOMENCLATURE_PREFIX)
}

/// Returns the vocabulary category mnemonic for a destination column.
#[must_use]
pub fn mnemonic_for_column(column: &str) -> Option<&'static str> {
    COLUMN_MNEMONICS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, mnemonic)| *mnemonic)
}

/// Resolves a (category, label) pair to a coded identifier.
///
/// Implemented by the nomenclature store; in-memory implementations are
/// used in tests.
pub trait NomenclatureLookup {
    /// Returns the coded identifier for `label` within the category named
    /// by `mnemonic`, or `None` when the label is unknown.
    fn resolve(&self, mnemonic: &str, label: &str) -> Option<i64>;
}

/// In-memory [`NomenclatureLookup`], for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryNomenclatures {
    entries: BTreeMap<(String, String), i64>,
}

impl MemoryNomenclatures {
    /// Creates an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one (mnemonic, label) → identifier entry.
    pub fn insert(&mut self, mnemonic: &str, label: &str, id: i64) {
        self.entries
            .insert((mnemonic.to_string(), label.to_string()), id);
    }
}

impl NomenclatureLookup for MemoryNomenclatures {
    fn resolve(&self, mnemonic: &str, label: &str) -> Option<i64> {
        self.entries
            .get(&(mnemonic.to_string(), label.to_string()))
            .copied()
    }
}

/// Resolves a mapped coded-vocabulary column value.
///
/// The category comes from the static table; an unregistered column is a
/// configuration error the operator must fix by extending the table. An
/// unknown label is recoverable: a diagnostic is logged and the column is
/// left unset.
///
/// # Errors
///
/// Returns [`SourceError::Config`] when the column has no registered
/// category mnemonic.
pub fn resolve_column(
    lookup: &dyn NomenclatureLookup,
    column: &str,
    label: &str,
) -> Result<Option<i64>, SourceError> {
    let mnemonic = mnemonic_for_column(column).ok_or_else(|| {
        SourceError::Config(format!(
            "no vocabulary category registered for column '{column}'; \
             extend the column-mnemonic table to import it",
        ))
    })?;

    let resolved = lookup.resolve(mnemonic, label);
    if resolved.is_none() {
        log::warn!("no nomenclature entry for label '{label}' in category {mnemonic}");
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obs_sync_synthese_models::schema;

    #[test]
    fn every_schema_column_has_a_mnemonic() {
        for column in schema::NOMENCLATURE_COLUMNS {
            assert!(
                mnemonic_for_column(column).is_some(),
                "{column} missing from COLUMN_MNEMONICS"
            );
        }
        assert_eq!(COLUMN_MNEMONICS.len(), schema::NOMENCLATURE_COLUMNS.len());
    }

    #[test]
    fn resolves_known_label() {
        let mut lookup = MemoryNomenclatures::new();
        lookup.insert("SEXE", "Femelle", 168);
        let resolved = resolve_column(&lookup, "id_nomenclature_sex", "Femelle").unwrap();
        assert_eq!(resolved, Some(168));
    }

    #[test]
    fn unknown_label_resolves_to_none() {
        let lookup = MemoryNomenclatures::new();
        let resolved = resolve_column(&lookup, "id_nomenclature_sex", "???").unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn unregistered_column_is_a_config_error() {
        let lookup = MemoryNomenclatures::new();
        let err = resolve_column(&lookup, "id_nomenclature_brand_new", "x").unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }
}
