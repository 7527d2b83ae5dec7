//! Partner GeoNature instance, paginated JSON export API.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::RawRow;
use crate::parser_def::{FetcherConfig, ParserDefinition};

/// Occurrence export of a partner GeoNature instance.
///
/// The export serves WGS84 `GeoJSON` geometries and declares a `total`
/// count, so runs report percentage progress. Incremental pulls filter
/// on the previous import date server-side.
#[must_use]
pub fn geonature_occurrences() -> ParserDefinition {
    ParserDefinition {
        name: "geonature-occurrences".to_string(),
        description: "Occurrence records from the partner GeoNature export API".to_string(),
        url: "https://geonature.ecrins-parcnational.fr/api/synthese/export_observations"
            .to_string(),
        srid: 4326,
        limit: 100,
        schedule_frequency: Some(7),
        api_filters: BTreeMap::from([("format".to_string(), "json".to_string())]),
        fetcher: FetcherConfig::Json {
            page_param: "page".to_string(),
            limit_param: "limit".to_string(),
            start_page: 0,
            items_path: Some("items".to_string()),
            total_path: Some("total".to_string()),
            since_param: Some("date_min".to_string()),
        },
        mapping: BTreeMap::from([
            ("cd_nom".to_string(), "cd_nom".to_string()),
            ("nom_cite".to_string(), "nom_cite".to_string()),
            ("observers".to_string(), "observers".to_string()),
            ("date_min".to_string(), "date_min".to_string()),
            ("count_min".to_string(), "count_min".to_string()),
            ("count_max".to_string(), "count_max".to_string()),
            ("the_geom_4326".to_string(), "geometry".to_string()),
            (
                "id_nomenclature_life_stage".to_string(),
                "life_stage".to_string(),
            ),
            ("id_nomenclature_sex".to_string(), "sex".to_string()),
        ]),
        constant_fields: BTreeMap::from([
            ("id_dataset".to_string(), serde_json::json!(1)),
            ("id_source".to_string(), serde_json::json!(2)),
        ]),
        dynamic_fields: BTreeMap::from([
            // the export omits date_max for single-day observations
            (
                "date_max".to_string(),
                Arc::new(|row: &RawRow| match row {
                    RawRow::Json(value) => value
                        .get("date_max")
                        .filter(|v| !v.is_null())
                        .or_else(|| value.get("date_min"))
                        .cloned(),
                    RawRow::Xml(_) => None,
                }) as crate::parser_def::DynamicField,
            ),
            (
                "entity_source_pk_value".to_string(),
                Arc::new(|row: &RawRow| match row {
                    RawRow::Json(value) => value
                        .get("id_synthese")
                        .map(|id| serde_json::Value::String(id.to_string())),
                    RawRow::Xml(_) => None,
                }) as crate::parser_def::DynamicField,
            ),
        ]),
        additional_fields: BTreeMap::from([
            ("precision".to_string(), "precision".to_string()),
            ("determiner".to_string(), "determiner".to_string()),
        ]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordBuilder;
    use crate::nomenclature::MemoryNomenclatures;

    #[test]
    fn definition_validates() {
        geonature_occurrences().validate().unwrap();
    }

    #[test]
    fn date_max_falls_back_to_date_min() {
        let def = geonature_occurrences();
        let lookup = MemoryNomenclatures::new();
        let builder = RecordBuilder::new(&def, 2154, &lookup);

        let row = RawRow::Json(serde_json::json!({
            "id_synthese": 991,
            "cd_nom": "60630",
            "nom_cite": "Lutra lutra",
            "observers": "A. Dupont",
            "date_min": "2024-05-01",
            "date_max": null,
        }));
        let record = builder.build(&row).unwrap().unwrap();
        assert_eq!(record.date_max, "2024-05-01");
        assert_eq!(record.entity_source_pk_value.as_deref(), Some("991"));
    }
}
