#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Parser framework for pulling observation records from remote sources.
//!
//! Each remote source is described by a declarative
//! [`parser_def::ParserDefinition`] — URL, field mapping, constants,
//! dynamic fields — and registered in [`registry`]. The framework drives
//! one of two row sources (paginated JSON or WFS/XML), builds one
//! [`obs_sync_synthese_models::SyntheseRecord`] per raw row through
//! [`builder::RecordBuilder`], and leaves persistence to the caller.

pub mod builder;
pub mod json;
pub mod nomenclature;
pub mod parser_def;
pub mod parsers;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod validate;
pub mod wfs;
pub mod xml;

use chrono::{DateTime, Utc};
use obs_sync_synthese_models::RecordError;

use crate::json::JsonSource;
use crate::parser_def::{FetcherConfig, ParserDefinition};
use crate::retry::RetryPolicy;
use crate::wfs::WfsSource;
use crate::xml::XmlElement;

/// Errors that can occur while fetching or building records.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Terminal fetch failure: non-retryable status, or retries exhausted.
    #[error("fetch failed for {url}: HTTP {status}")]
    Fetch {
        /// Requested URL.
        url: String,
        /// Last HTTP status code observed.
        status: u16,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The response parsed but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// Invalid parser configuration.
    #[error("invalid parser configuration: {0}")]
    Config(String),

    /// A built record did not satisfy the destination schema.
    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

/// Per-run fetch options, decided by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Timestamp of the previous successful run, injected into sources
    /// that declare a `since` query parameter.
    pub since: Option<DateTime<Utc>>,
}

/// Provides the deployment-local spatial reference identifier.
///
/// Looked up once per parser instantiation to decide which geometry
/// representation the source provides natively.
pub trait CrsProvider {
    /// SRID of the deployment-local projection.
    fn local_srid(&self) -> i32;
}

/// One raw unit of source data, before mapping.
///
/// Transient: rows exist only inside the pull loop and are never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// A decoded JSON object from a paginated API.
    Json(serde_json::Value),
    /// One feature subtree from a WFS `GetFeature` document.
    Xml(XmlElement),
}

/// A lazy, per-run sequence of raw source rows.
pub enum RowSource {
    /// Paginated JSON API.
    Json(JsonSource),
    /// Single-request WFS document.
    Wfs(WfsSource),
}

impl RowSource {
    /// Opens the row source described by a parser definition.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the definition's fetcher
    /// settings are unusable (e.g. a zero page size on a JSON source).
    pub fn open(
        def: &ParserDefinition,
        options: &FetchOptions,
        policy: RetryPolicy,
    ) -> Result<Self, SourceError> {
        match &def.fetcher {
            FetcherConfig::Json { .. } => Ok(Self::Json(JsonSource::open(def, options, policy)?)),
            FetcherConfig::Wfs { .. } => Ok(Self::Wfs(WfsSource::open(def, policy)?)),
        }
    }

    /// Pulls the next batch of raw rows, or `None` when the source is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if a fetch or a parse fails; fetch errors
    /// are terminal for the run.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RawRow>>, SourceError> {
        match self {
            Self::Json(source) => source.next_batch().await,
            Self::Wfs(source) => source.next_batch().await,
        }
    }

    /// Total row count declared by the source, when known (JSON sources
    /// with a total field, after the first page). Purely informational.
    #[must_use]
    pub const fn expected_total(&self) -> Option<u64> {
        match self {
            Self::Json(source) => source.expected_total(),
            Self::Wfs(_) => None,
        }
    }
}
