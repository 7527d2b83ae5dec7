//! Declarative parser definition.
//!
//! A [`ParserDefinition`] captures everything unique about one remote
//! data source: where to fetch, how to page, and how destination columns
//! are filled — literal constants, computed dynamic fields, extra-data
//! side fields, and plain source-locator mappings. A single generic
//! pipeline consumes these definitions; adding a source means declaring
//! one, not writing new import code.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::nomenclature;
use crate::validate::validate_mapping;
use crate::xml::XmlElement;
use crate::{RawRow, SourceError};

/// Default page size for paginated sources.
pub const DEFAULT_LIMIT: u64 = 100;

/// Destination column holding the local-projection geometry.
pub const GEOM_LOCAL_COLUMN: &str = "the_geom_local";

/// Destination column holding the WGS84 geometry.
pub const GEOM_WGS84_COLUMN: &str = "the_geom_4326";

/// Destination column holding the derived WGS84 centroid.
pub const GEOM_POINT_COLUMN: &str = "the_geom_point";

/// A computed destination value: a pure function of the raw row.
/// Returning `None` leaves the column unset.
pub type DynamicField = Arc<dyn Fn(&RawRow) -> Option<serde_json::Value> + Send + Sync>;

/// A post-fetch, pre-emission predicate for WFS features, used when the
/// remote protocol cannot express the filter itself. Rejected rows are
/// skipped silently.
pub type LateFilter = Arc<dyn Fn(&XmlElement) -> bool + Send + Sync>;

/// How to fetch raw rows from the remote source.
#[derive(Debug, Clone)]
pub enum FetcherConfig {
    /// Paginated JSON REST API.
    Json {
        /// Query parameter carrying the page cursor.
        page_param: String,
        /// Query parameter carrying the page size.
        limit_param: String,
        /// Initial page cursor value.
        start_page: u64,
        /// Dot-separated path to the items array; `None` means the
        /// response body is the array itself.
        items_path: Option<String>,
        /// Dot-separated path to a declared total row count, fed to
        /// progress reporting when present.
        total_path: Option<String>,
        /// Query parameter that receives the previous run's import
        /// timestamp, enabling incremental pulls.
        since_param: Option<String>,
    },
    /// WFS `GetFeature` endpoint. One request, no pagination — WFS paging
    /// is too unreliable across server implementations.
    Wfs {
        /// Feature type name (`TYPENAME`).
        layer: String,
        /// WFS protocol version (decides `count` vs `maxFeatures`).
        version: String,
    },
}

impl FetcherConfig {
    /// A JSON fetcher with the conventional `page`/`limit` parameters,
    /// starting at page 0.
    #[must_use]
    pub fn json() -> Self {
        Self::Json {
            page_param: "page".to_string(),
            limit_param: "limit".to_string(),
            start_page: 0,
            items_path: None,
            total_path: None,
            since_param: None,
        }
    }

    /// A WFS fetcher for the given layer and protocol version.
    #[must_use]
    pub fn wfs(layer: &str, version: &str) -> Self {
        Self::Wfs {
            layer: layer.to_string(),
            version: version.to_string(),
        }
    }
}

/// A complete declarative description of one remote data source.
#[derive(Clone)]
pub struct ParserDefinition {
    /// Unique parser name, also the run-bookkeeping key.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Source endpoint URL.
    pub url: String,
    /// SRID of the geometries the source serves.
    pub srid: i32,
    /// Page size for JSON sources; feature cap for WFS sources
    /// (0 = uncapped).
    pub limit: u64,
    /// Extra query parameters sent with every request.
    pub api_filters: BTreeMap<String, String>,
    /// Scheduling cadence in days; `None` means manual runs only.
    pub schedule_frequency: Option<i64>,
    /// Wire-format strategy.
    pub fetcher: FetcherConfig,
    /// Destination column → source locator.
    pub mapping: BTreeMap<String, String>,
    /// Destination column → literal value, assigned verbatim.
    pub constant_fields: BTreeMap<String, serde_json::Value>,
    /// Destination column → computed value.
    pub dynamic_fields: BTreeMap<String, DynamicField>,
    /// Extra-data field name → source locator; collected into the
    /// record's side bag instead of a typed column.
    pub additional_fields: BTreeMap<String, String>,
    /// Optional WFS late filter; `None` accepts everything.
    pub late_filter: Option<LateFilter>,
}

impl Default for ParserDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            url: String::new(),
            srid: obs_sync_geometry::WGS84_SRID,
            limit: DEFAULT_LIMIT,
            api_filters: BTreeMap::new(),
            schedule_frequency: None,
            fetcher: FetcherConfig::json(),
            mapping: BTreeMap::new(),
            constant_fields: BTreeMap::new(),
            dynamic_fields: BTreeMap::new(),
            additional_fields: BTreeMap::new(),
            late_filter: None,
        }
    }
}

impl fmt::Debug for ParserDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserDefinition")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("srid", &self.srid)
            .field("limit", &self.limit)
            .field("fetcher", &self.fetcher)
            .field("mapping", &self.mapping)
            .field("constant_fields", &self.constant_fields)
            .field(
                "dynamic_fields",
                &self.dynamic_fields.keys().collect::<Vec<_>>(),
            )
            .field("additional_fields", &self.additional_fields)
            .field("late_filter", &self.late_filter.is_some())
            .finish_non_exhaustive()
    }
}

impl ParserDefinition {
    /// Short label of the wire-format strategy, for listings and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.fetcher {
            FetcherConfig::Json { .. } => "JSON",
            FetcherConfig::Wfs { .. } => "WFS",
        }
    }

    /// The set of destination columns this definition fills: mapping,
    /// constants, and dynamic fields combined. This union — not the
    /// mapping alone — is what gets validated, since required columns may
    /// be satisfied by constants or dynamic fields.
    #[must_use]
    pub fn declared_columns(&self) -> BTreeSet<String> {
        self.mapping
            .keys()
            .chain(self.constant_fields.keys())
            .chain(self.dynamic_fields.keys())
            .cloned()
            .collect()
    }

    /// The geometry column the source fills natively, decided by
    /// comparing its SRID against the deployment-local one.
    #[must_use]
    pub fn geometry_column(&self, local_srid: i32) -> &'static str {
        if self.srid == local_srid {
            GEOM_LOCAL_COLUMN
        } else {
            GEOM_WGS84_COLUMN
        }
    }

    /// Validates the definition: name present, mapping consistent with
    /// the destination schema, every mapped coded-vocabulary column
    /// backed by a registered category, and fetcher settings usable.
    ///
    /// Runs once per parser instantiation, before any network call.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] describing the first problem
    /// found.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.name.is_empty() {
            return Err(SourceError::Config("parser name is empty".to_string()));
        }
        if self.url.is_empty() {
            return Err(SourceError::Config(format!(
                "parser '{}' has no source URL",
                self.name
            )));
        }
        if matches!(self.fetcher, FetcherConfig::Json { .. }) && self.limit == 0 {
            return Err(SourceError::Config(format!(
                "parser '{}' is paginated but has a zero page size",
                self.name
            )));
        }

        validate_mapping(&self.declared_columns())?;

        for column in self.mapping.keys() {
            if nomenclature::is_nomenclature_column(column)
                && nomenclature::mnemonic_for_column(column).is_none()
            {
                return Err(SourceError::Config(format!(
                    "no vocabulary category registered for column '{column}'; \
                     extend the column-mnemonic table to import it",
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json_def() -> ParserDefinition {
        ParserDefinition {
            name: "test".to_string(),
            url: "https://example.org/api".to_string(),
            mapping: BTreeMap::from([
                ("cd_nom".to_string(), "species".to_string()),
                ("nom_cite".to_string(), "species_name".to_string()),
                ("observers".to_string(), "observer".to_string()),
                ("date_min".to_string(), "date".to_string()),
                ("date_max".to_string(), "date".to_string()),
            ]),
            constant_fields: BTreeMap::from([
                ("id_dataset".to_string(), serde_json::json!(1)),
                ("id_source".to_string(), serde_json::json!(1)),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn valid_definition_passes() {
        minimal_json_def().validate().unwrap();
    }

    #[test]
    fn constants_count_toward_required_coverage() {
        let def = minimal_json_def();
        // id_dataset / id_source are only covered by constants
        assert!(def.declared_columns().contains("id_dataset"));
        def.validate().unwrap();
    }

    #[test]
    fn dynamic_fields_count_toward_required_coverage() {
        let mut def = minimal_json_def();
        def.constant_fields.remove("id_dataset");
        assert!(def.validate().is_err());

        def.dynamic_fields.insert(
            "id_dataset".to_string(),
            Arc::new(|_| Some(serde_json::json!(1))),
        );
        def.validate().unwrap();
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let mut def = minimal_json_def();
        def.mapping.remove("observers");
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("observers"), "{err}");
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut def = minimal_json_def();
        def.mapping
            .insert("no_such_column".to_string(), "x".to_string());
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("no_such_column"), "{err}");
    }

    #[test]
    fn zero_page_size_is_rejected_for_json() {
        let mut def = minimal_json_def();
        def.limit = 0;
        assert!(def.validate().is_err());
    }

    #[test]
    fn geometry_column_follows_srid() {
        let mut def = minimal_json_def();
        def.srid = 2154;
        assert_eq!(def.geometry_column(2154), GEOM_LOCAL_COLUMN);
        assert_eq!(def.geometry_column(32620), GEOM_WGS84_COLUMN);
    }
}
