#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Destination schema metadata and the normalized observation record.
//!
//! Every remote data source produces [`SyntheseRecord`]s that conform to
//! the `synthese` destination table. The [`schema`] module describes that
//! table's columns so mappings can be validated before any network call.

pub mod schema;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors raised while assembling a [`SyntheseRecord`] from mapped fields.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A required destination column was absent from the assembled fields.
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    /// A column value could not be coerced to the destination type.
    #[error("column '{column}' has incompatible value: {value}")]
    BadValue {
        /// Destination column name.
        column: &'static str,
        /// The offending value, rendered as JSON.
        value: String,
    },
}

/// One observation normalized to the `synthese` destination schema.
///
/// Geometry columns hold `GeoJSON` strings; whichever representation the
/// source provides natively, the record builder derives the other one plus
/// the centroid before the record reaches the sink. Coded-vocabulary
/// columns live in [`Self::nomenclatures`], keyed by destination column
/// name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheseRecord {
    /// Taxon code (`cd_nom` in the taxonomic referential).
    pub cd_nom: String,
    /// Taxon name as cited by the source.
    pub nom_cite: String,
    /// Observer name(s), free text.
    pub observers: String,
    /// Start of the observation period, as provided by the source.
    pub date_min: String,
    /// End of the observation period, as provided by the source.
    pub date_max: String,
    /// Destination dataset identifier.
    pub id_dataset: i64,
    /// Destination source identifier.
    pub id_source: i64,
    /// SINP permanent identifier, when the source carries one.
    pub unique_id_sinp: Option<String>,
    /// Primary key of the record in the source system.
    pub entity_source_pk_value: Option<String>,
    /// Minimum headcount.
    pub count_min: Option<i64>,
    /// Maximum headcount.
    pub count_max: Option<i64>,
    /// Minimum altitude in meters.
    pub altitude_min: Option<i64>,
    /// Maximum altitude in meters.
    pub altitude_max: Option<i64>,
    /// Free-text context comment.
    pub comment_context: Option<String>,
    /// Free-text description comment.
    pub comment_description: Option<String>,
    /// Geometry in WGS84 (`GeoJSON`).
    pub the_geom_4326: Option<String>,
    /// Geometry in the deployment-local projection (`GeoJSON`).
    pub the_geom_local: Option<String>,
    /// Centroid point in WGS84 (`GeoJSON`).
    pub the_geom_point: Option<String>,
    /// Resolved coded-vocabulary identifiers, keyed by the
    /// `id_nomenclature_*` destination column name.
    pub nomenclatures: BTreeMap<String, i64>,
    /// Side bag of additional source fields with no typed column.
    pub additional_data: Option<serde_json::Value>,
}

impl SyntheseRecord {
    /// Assembles a record from the field map produced by a record builder.
    ///
    /// Mapped, constant, and dynamic values all arrive as JSON values;
    /// text columns accept any scalar (numbers are rendered), integer
    /// columns accept numbers and numeric strings.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if a required column is missing or a value
    /// cannot be coerced to the destination type.
    pub fn from_fields(
        mut fields: BTreeMap<String, serde_json::Value>,
        nomenclatures: BTreeMap<String, i64>,
        additional_data: Option<serde_json::Value>,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            cd_nom: take_text(&mut fields, "cd_nom")?,
            nom_cite: take_text(&mut fields, "nom_cite")?,
            observers: take_text(&mut fields, "observers")?,
            date_min: take_text(&mut fields, "date_min")?,
            date_max: take_text(&mut fields, "date_max")?,
            id_dataset: take_integer(&mut fields, "id_dataset")?,
            id_source: take_integer(&mut fields, "id_source")?,
            unique_id_sinp: take_optional_text(&mut fields, "unique_id_sinp"),
            entity_source_pk_value: take_optional_text(&mut fields, "entity_source_pk_value"),
            count_min: take_optional_integer(&mut fields, "count_min")?,
            count_max: take_optional_integer(&mut fields, "count_max")?,
            altitude_min: take_optional_integer(&mut fields, "altitude_min")?,
            altitude_max: take_optional_integer(&mut fields, "altitude_max")?,
            comment_context: take_optional_text(&mut fields, "comment_context"),
            comment_description: take_optional_text(&mut fields, "comment_description"),
            the_geom_4326: take_optional_text(&mut fields, "the_geom_4326"),
            the_geom_local: take_optional_text(&mut fields, "the_geom_local"),
            the_geom_point: take_optional_text(&mut fields, "the_geom_point"),
            nomenclatures,
            additional_data,
        })
    }
}

/// Renders a JSON scalar as the text stored in a string column.
fn text_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn take_text(
    fields: &mut BTreeMap<String, serde_json::Value>,
    column: &'static str,
) -> Result<String, RecordError> {
    let value = fields
        .remove(column)
        .ok_or(RecordError::MissingColumn(column))?;
    text_value(&value).ok_or_else(|| RecordError::BadValue {
        column,
        value: value.to_string(),
    })
}

fn take_optional_text(
    fields: &mut BTreeMap<String, serde_json::Value>,
    column: &'static str,
) -> Option<String> {
    fields.remove(column).and_then(|v| text_value(&v))
}

fn take_integer(
    fields: &mut BTreeMap<String, serde_json::Value>,
    column: &'static str,
) -> Result<i64, RecordError> {
    let value = fields
        .remove(column)
        .ok_or(RecordError::MissingColumn(column))?;
    integer_value(&value).ok_or_else(|| RecordError::BadValue {
        column,
        value: value.to_string(),
    })
}

fn take_optional_integer(
    fields: &mut BTreeMap<String, serde_json::Value>,
    column: &'static str,
) -> Result<Option<i64>, RecordError> {
    match fields.remove(column) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => integer_value(&value)
            .map(Some)
            .ok_or_else(|| RecordError::BadValue {
                column,
                value: value.to_string(),
            }),
    }
}

/// Coerces a JSON value to an integer, accepting numeric strings.
fn integer_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One row of per-parser run bookkeeping, keyed by parser name.
///
/// Created lazily the first time a parser runs and updated exactly once
/// per successful run, in the same transaction as the record inserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParserRecord {
    /// Unique parser name.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Timestamp of the last successful run, if any.
    pub last_import: Option<DateTime<Utc>>,
    /// Cumulative row count across all runs.
    pub nb_row_total: i64,
    /// Row count of the most recent run.
    pub nb_row_last_import: Option<i64>,
    /// Scheduling cadence in days; `None` means manual runs only.
    pub schedule_frequency: Option<i64>,
}

impl ParserRecord {
    /// Returns `true` if a scheduled run is due at `now`.
    ///
    /// Parsers without a `schedule_frequency` are never due; parsers that
    /// never ran are always due.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(frequency) = self.schedule_frequency else {
            return false;
        };
        self.last_import
            .is_none_or(|last| (now - last).num_days() >= frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn required_fields() -> BTreeMap<String, serde_json::Value> {
        let mut fields = BTreeMap::new();
        fields.insert("cd_nom".to_string(), serde_json::json!("60630"));
        fields.insert("nom_cite".to_string(), serde_json::json!("Lutra lutra"));
        fields.insert("observers".to_string(), serde_json::json!("A. Dupont"));
        fields.insert("date_min".to_string(), serde_json::json!("2024-05-01"));
        fields.insert("date_max".to_string(), serde_json::json!("2024-05-01"));
        fields.insert("id_dataset".to_string(), serde_json::json!(1));
        fields.insert("id_source".to_string(), serde_json::json!("12"));
        fields
    }

    #[test]
    fn builds_from_required_fields() {
        let record =
            SyntheseRecord::from_fields(required_fields(), BTreeMap::new(), None).unwrap();
        assert_eq!(record.cd_nom, "60630");
        assert_eq!(record.id_dataset, 1);
        // numeric strings coerce into integer columns
        assert_eq!(record.id_source, 12);
        assert!(record.the_geom_4326.is_none());
    }

    #[test]
    fn numeric_taxon_code_renders_as_text() {
        let mut fields = required_fields();
        fields.insert("cd_nom".to_string(), serde_json::json!(60630));
        let record = SyntheseRecord::from_fields(fields, BTreeMap::new(), None).unwrap();
        assert_eq!(record.cd_nom, "60630");
    }

    #[test]
    fn missing_required_column_fails() {
        let mut fields = required_fields();
        fields.remove("observers");
        let err = SyntheseRecord::from_fields(fields, BTreeMap::new(), None).unwrap_err();
        assert!(matches!(err, RecordError::MissingColumn("observers")));
    }

    #[test]
    fn bad_integer_value_fails() {
        let mut fields = required_fields();
        fields.insert("count_min".to_string(), serde_json::json!("many"));
        let err = SyntheseRecord::from_fields(fields, BTreeMap::new(), None).unwrap_err();
        assert!(matches!(err, RecordError::BadValue { column: "count_min", .. }));
    }

    #[test]
    fn parser_without_frequency_is_never_due() {
        let record = ParserRecord {
            name: "demo".to_string(),
            description: None,
            last_import: None,
            nb_row_total: 0,
            nb_row_last_import: None,
            schedule_frequency: None,
        };
        assert!(!record.is_due(Utc::now()));
    }

    #[test]
    fn scheduled_parser_is_due_after_frequency_elapses() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = ParserRecord {
            name: "demo".to_string(),
            description: None,
            last_import: Some(last),
            nb_row_total: 10,
            nb_row_last_import: Some(10),
            schedule_frequency: Some(7),
        };
        assert!(!record.is_due(last + chrono::Duration::days(3)));
        assert!(record.is_due(last + chrono::Duration::days(7)));
        // never-ran parsers with a schedule are always due
        let fresh = ParserRecord {
            last_import: None,
            ..record
        };
        assert!(fresh.is_due(last));
    }
}
