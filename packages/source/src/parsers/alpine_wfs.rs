//! Regional atlas WFS service, Lambert-93 geometries.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::parser_def::{FetcherConfig, LateFilter, ParserDefinition};

/// Protected-species observations from the regional atlas WFS.
///
/// The service cannot filter by department server-side, so a late filter
/// keeps only features from Hautes-Alpes (05). Geometries arrive as GML
/// in Lambert-93; locators use the `tag:default` fallback syntax for
/// fields the layer leaves out.
#[must_use]
pub fn alpine_protected_species() -> ParserDefinition {
    let hautes_alpes_only: LateFilter = Arc::new(|feature| {
        feature
            .find("code_dept")
            .is_some_and(|tag| tag.trimmed_text() == "05")
    });

    ParserDefinition {
        name: "alpine-protected-species".to_string(),
        description: "Protected species observations from the regional atlas WFS".to_string(),
        url: "https://ws.carmencarto.fr/WFS/119/fxx_inpn".to_string(),
        srid: 2154,
        limit: 5000,
        schedule_frequency: Some(30),
        fetcher: FetcherConfig::wfs("ms:especes_protegees", "2.0.0"),
        mapping: BTreeMap::from([
            ("cd_nom".to_string(), "cd_nom".to_string()),
            (
                "nom_cite".to_string(),
                "nom_complet:Taxon not cited".to_string(),
            ),
            (
                "observers".to_string(),
                "observateur:Atlas contributor".to_string(),
            ),
            ("date_min".to_string(), "date_obs".to_string()),
            ("date_max".to_string(), "date_obs".to_string()),
            ("the_geom_local".to_string(), "geometrie".to_string()),
            (
                "id_nomenclature_obs_technique".to_string(),
                "technique_obs".to_string(),
            ),
        ]),
        constant_fields: BTreeMap::from([
            ("id_dataset".to_string(), serde_json::json!(3)),
            ("id_source".to_string(), serde_json::json!(5)),
            (
                "id_nomenclature_source_status".to_string(),
                serde_json::json!(75),
            ),
        ]),
        additional_fields: BTreeMap::from([(
            "commune".to_string(),
            "nom_commune:unknown".to_string(),
        )]),
        late_filter: Some(hautes_alpes_only),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn definition_validates() {
        alpine_protected_species().validate().unwrap();
    }

    #[test]
    fn late_filter_keeps_only_department_05() {
        let def = alpine_protected_species();
        let filter = def.late_filter.expect("definition declares a late filter");

        let inside = parse_document("<obs><code_dept>05</code_dept></obs>").unwrap();
        let outside = parse_document("<obs><code_dept>38</code_dept></obs>").unwrap();
        let missing = parse_document("<obs/>").unwrap();

        assert!(filter(&inside));
        assert!(!filter(&outside));
        assert!(!filter(&missing));
    }
}
