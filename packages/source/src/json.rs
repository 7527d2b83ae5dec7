//! Paginated JSON row source.
//!
//! Requests pages with `{...api_filters, page_param: page, limit_param:
//! limit}` until the source returns a short page. A source that never
//! returns one keeps the loop alive by design — caller-supplied
//! `api_filters` are the only protection.

use crate::parser_def::{FetcherConfig, ParserDefinition};
use crate::retry::{self, RetryPolicy};
use crate::{FetchOptions, RawRow, SourceError};

/// Timestamp format for the incremental `since` query parameter.
const SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Pagination state: tracks the page cursor and detects exhaustion.
#[derive(Debug, Clone)]
pub struct PageCursor {
    page: u64,
    limit: u64,
    done: bool,
}

impl PageCursor {
    /// Creates a cursor starting at `start_page` with the given page
    /// size.
    #[must_use]
    pub const fn new(start_page: u64, limit: u64) -> Self {
        Self {
            page: start_page,
            limit,
            done: false,
        }
    }

    /// Returns the page to request next, or `None` once exhausted.
    #[must_use]
    pub const fn next_request(&self) -> Option<u64> {
        if self.done { None } else { Some(self.page) }
    }

    /// Records the row count of the page just received; a short page
    /// (strictly fewer rows than the page size) ends the sequence.
    pub const fn record_page(&mut self, count: u64) {
        if count < self.limit {
            self.done = true;
        } else {
            self.page += 1;
        }
    }
}

/// Lazily pulls pages of JSON rows from a remote API.
pub struct JsonSource {
    client: reqwest::Client,
    policy: RetryPolicy,
    url: String,
    /// Query parameters constant across pages.
    base_query: Vec<(String, String)>,
    page_param: String,
    cursor: PageCursor,
    items_path: Option<String>,
    total_path: Option<String>,
    expected_total: Option<u64>,
    label: String,
}

impl JsonSource {
    /// Builds the source from a JSON parser definition.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if called on a non-JSON definition
    /// or with a zero page size.
    pub fn open(
        def: &ParserDefinition,
        options: &FetchOptions,
        policy: RetryPolicy,
    ) -> Result<Self, SourceError> {
        let FetcherConfig::Json {
            page_param,
            limit_param,
            start_page,
            items_path,
            total_path,
            since_param,
        } = &def.fetcher
        else {
            return Err(SourceError::Config(format!(
                "parser '{}' is not a JSON source",
                def.name
            )));
        };
        if def.limit == 0 {
            return Err(SourceError::Config(format!(
                "parser '{}' is paginated but has a zero page size",
                def.name
            )));
        }

        let mut base_query: Vec<(String, String)> = def
            .api_filters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        base_query.push((limit_param.clone(), def.limit.to_string()));

        if let (Some(param), Some(since)) = (since_param, options.since) {
            base_query.push((param.clone(), since.format(SINCE_FORMAT).to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            policy,
            url: def.url.clone(),
            base_query,
            page_param: page_param.clone(),
            cursor: PageCursor::new(*start_page, def.limit),
            items_path: items_path.clone(),
            total_path: total_path.clone(),
            expected_total: None,
            label: def.name.clone(),
        })
    }

    /// Fetches the next page of rows, or `None` once the source reported
    /// a short page.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on fetch failure, malformed JSON, or an
    /// items path that does not lead to an array.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RawRow>>, SourceError> {
        let Some(page) = self.cursor.next_request() else {
            return Ok(None);
        };

        let mut query = self.base_query.clone();
        query.push((self.page_param.clone(), page.to_string()));

        let body = retry::fetch_text(&self.client, &self.url, &query, &self.policy).await?;
        let value: serde_json::Value = serde_json::from_str(&body)?;

        if self.expected_total.is_none()
            && let Some(path) = &self.total_path
        {
            self.expected_total = value_at_path(&value, path).and_then(read_count);
        }

        let items = items_array(&value, self.items_path.as_deref())?;
        self.cursor.record_page(items.len() as u64);

        log::info!(
            "[{}] page {page}: {} row(s){}",
            self.label,
            items.len(),
            self.expected_total
                .map(|total| format!(" of {total} expected"))
                .unwrap_or_default(),
        );

        Ok(Some(items.into_iter().map(RawRow::Json).collect()))
    }

    /// Total row count declared by the source, known after the first
    /// page when a total path is configured.
    #[must_use]
    pub const fn expected_total(&self) -> Option<u64> {
        self.expected_total
    }
}

/// Walks a dot-separated path through nested JSON objects.
pub(crate) fn value_at_path<'a>(
    value: &'a serde_json::Value,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Locates the items array in a page body.
fn items_array(
    value: &serde_json::Value,
    items_path: Option<&str>,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let located = match items_path {
        Some(path) => value_at_path(value, path).ok_or_else(|| {
            SourceError::Decode(format!("items path '{path}' not found in response"))
        })?,
        None => value,
    };
    located
        .as_array()
        .cloned()
        .ok_or_else(|| SourceError::Decode("items location is not an array".to_string()))
}

/// Reads a count that may arrive as a number or a numeric string.
fn read_count(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
