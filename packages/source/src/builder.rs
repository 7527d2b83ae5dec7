//! Builds one destination record per raw source row.
//!
//! Processing order matters and is fixed: constants, then dynamic
//! fields, then additional (side-bag) fields, then the remaining mapped
//! columns, then geometry. Later steps never overwrite a column an
//! earlier step assigned.

use std::collections::{BTreeMap, BTreeSet};

use geo::Geometry;
use obs_sync_synthese_models::SyntheseRecord;

use crate::json::value_at_path;
use crate::nomenclature::{self, NomenclatureLookup};
use crate::parser_def::{
    GEOM_LOCAL_COLUMN, GEOM_POINT_COLUMN, GEOM_WGS84_COLUMN, ParserDefinition,
};
use crate::{RawRow, SourceError};

/// Turns raw rows into [`SyntheseRecord`]s according to a parser
/// definition.
pub struct RecordBuilder<'a> {
    def: &'a ParserDefinition,
    /// Geometry column the source fills natively (local vs WGS84),
    /// decided once per run from the parser and deployment SRIDs.
    native_geometry_column: &'static str,
    nomenclatures: &'a dyn NomenclatureLookup,
}

impl<'a> RecordBuilder<'a> {
    /// Creates a builder for one run.
    pub fn new(
        def: &'a ParserDefinition,
        local_srid: i32,
        nomenclatures: &'a dyn NomenclatureLookup,
    ) -> Self {
        Self {
            def,
            native_geometry_column: def.geometry_column(local_srid),
            nomenclatures,
        }
    }

    /// Builds a record from one raw row.
    ///
    /// Returns `Ok(None)` when the row is rejected by the late filter —
    /// an expected, silent skip.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] for an unregistered
    /// coded-vocabulary column and [`SourceError::Record`] when the
    /// assembled fields do not satisfy the destination schema.
    pub fn build(&self, row: &RawRow) -> Result<Option<SyntheseRecord>, SourceError> {
        if let (RawRow::Xml(feature), Some(filter)) = (row, &self.def.late_filter)
            && !filter(feature)
        {
            return Ok(None);
        }

        let mut fields: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        let mut nomenclature_ids: BTreeMap<String, i64> = BTreeMap::new();
        let mut assigned: BTreeSet<&str> = BTreeSet::new();

        // 1. constants, assigned verbatim
        for (column, value) in &self.def.constant_fields {
            assign(&mut fields, &mut nomenclature_ids, column, value.clone());
            assigned.insert(column);
        }

        // 2. dynamic fields
        for (column, compute) in &self.def.dynamic_fields {
            if let Some(value) = compute(row) {
                assign(&mut fields, &mut nomenclature_ids, column, value);
            }
            assigned.insert(column);
        }

        // 3. additional fields, collected into the side bag
        let mut extra = serde_json::Map::new();
        for (field, locator) in &self.def.additional_fields {
            if let Some(value) = self.extract(row, locator) {
                extra.insert(field.clone(), value);
            }
        }

        // 4. remaining mapped columns
        for (column, locator) in &self.def.mapping {
            if assigned.contains(column.as_str()) || is_geometry_column(column) {
                continue;
            }
            if nomenclature::is_nomenclature_column(column) {
                let Some(label) = self.extract(row, locator).and_then(label_text) else {
                    log::warn!("no source value for coded column '{column}'");
                    continue;
                };
                if let Some(id) =
                    nomenclature::resolve_column(self.nomenclatures, column, &label)?
                {
                    nomenclature_ids.insert(column.clone(), id);
                }
            } else if let Some(value) = self.extract(row, locator) {
                fields.insert(column.clone(), value);
            }
        }

        // 5-6. geometry extraction and reconciliation
        self.apply_geometry(row, &mut fields);

        let additional_data = if extra.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(extra))
        };

        let record = SyntheseRecord::from_fields(fields, nomenclature_ids, additional_data)?;
        Ok(Some(record))
    }

    /// Extracts the value at a source locator, format-specific.
    fn extract(&self, row: &RawRow, locator: &str) -> Option<serde_json::Value> {
        match row {
            RawRow::Json(value) => value_at_path(value, locator)
                .filter(|v| !v.is_null())
                .cloned(),
            RawRow::Xml(feature) => {
                xml_locator_value(feature, locator).map(serde_json::Value::String)
            }
        }
    }

    /// Extracts the native geometry, then derives the other
    /// representation and the centroid. Columns already assigned by
    /// constants or dynamic fields are left untouched. A row without
    /// extractable geometry proceeds without geometry columns.
    fn apply_geometry(&self, row: &RawRow, fields: &mut BTreeMap<String, serde_json::Value>) {
        let Some(locator) = self.def.mapping.get(self.native_geometry_column) else {
            // definition imports no geometry
            return;
        };

        let native = match row {
            RawRow::Json(value) => value_at_path(value, locator).and_then(|geometry_value| {
                obs_sync_geometry::from_geojson_value(geometry_value)
                    .map_err(|e| log::warn!("unusable GeoJSON geometry at '{locator}': {e}"))
                    .ok()
            }),
            RawRow::Xml(feature) => crate::wfs::extract_gml_geometry(feature, locator),
        };
        let Some(native) = native else {
            log::warn!(
                "[{}] no geometry extracted, importing row without geometry",
                self.def.name
            );
            return;
        };

        let (wgs84, local) = if self.native_geometry_column == GEOM_LOCAL_COLUMN {
            (obs_sync_geometry::local_to_wgs84(&native), native)
        } else {
            (native.clone(), obs_sync_geometry::wgs84_to_local(&native))
        };

        set_if_absent(fields, GEOM_LOCAL_COLUMN, geojson_value(&local));
        set_if_absent(fields, GEOM_WGS84_COLUMN, geojson_value(&wgs84));
        if let Some(center) = obs_sync_geometry::centroid(&wgs84) {
            set_if_absent(
                fields,
                GEOM_POINT_COLUMN,
                geojson_value(&Geometry::Point(center)),
            );
        }
    }
}

/// Routes a value to the nomenclature map or the plain field map,
/// depending on the column. Constants and dynamic fields carry coded
/// identifiers directly.
fn assign(
    fields: &mut BTreeMap<String, serde_json::Value>,
    nomenclature_ids: &mut BTreeMap<String, i64>,
    column: &str,
    value: serde_json::Value,
) {
    if nomenclature::is_nomenclature_column(column) {
        if let Some(id) = value.as_i64() {
            nomenclature_ids.insert(column.to_string(), id);
        } else {
            log::warn!("coded column '{column}' assigned a non-integer constant, ignoring");
        }
    } else {
        fields.insert(column.to_string(), value);
    }
}

fn is_geometry_column(column: &str) -> bool {
    column == GEOM_LOCAL_COLUMN || column == GEOM_WGS84_COLUMN || column == GEOM_POINT_COLUMN
}

fn set_if_absent(
    fields: &mut BTreeMap<String, serde_json::Value>,
    column: &str,
    value: serde_json::Value,
) {
    fields
        .entry(column.to_string())
        .or_insert(value);
}

fn geojson_value(geom: &Geometry<f64>) -> serde_json::Value {
    serde_json::Value::String(obs_sync_geometry::to_geojson_string(geom))
}

/// Renders an extracted value as a vocabulary label.
fn label_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolves an XML locator against a feature node.
///
/// `"tag"` finds a tag by local name anywhere under the node;
/// `"tag:default"` supplies a fallback when the tag is absent or empty.
/// An absent tag with no default resolves to the locator string itself.
fn xml_locator_value(feature: &crate::xml::XmlElement, locator: &str) -> Option<String> {
    let (key, default) = locator
        .split_once(':')
        .map_or((locator, None), |(key, default)| (key, Some(default)));

    feature.find(key).map_or_else(
        || Some(default.unwrap_or(key).to_string()),
        |tag| {
            let text = tag.trimmed_text();
            if text.is_empty() {
                default.map(str::to_string)
            } else {
                Some(text.to_string())
            }
        },
    )
}
