#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for importing observation records from remote sources into
//! the `synthese` store.
//!
//! [`run_parser`] drives one end-to-end import: validate the definition,
//! pull raw rows, build records, insert, and update the run bookkeeping.
//! A run is all-or-nothing — every insert and the history update commit
//! together, and any failure rolls the whole run back.

pub mod progress;

use std::sync::Arc;
use std::time::Instant;

use duckdb::Connection;
use obs_sync_database::{nomenclature_db, parser_db, synthese_db};
use obs_sync_source::builder::RecordBuilder;
use obs_sync_source::parser_def::ParserDefinition;
use obs_sync_source::progress::ProgressCallback;
use obs_sync_source::retry::RetryPolicy;
use obs_sync_source::{CrsProvider as _, FetchOptions, RowSource, registry};

/// Records staged between inserts inside the run transaction.
const INSERT_BUFFER_ROWS: usize = 500;

/// Options for one import run.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Execute the full pipeline but withhold the final commit.
    pub dry_run: bool,
    /// Stop after importing this many records (for testing).
    pub limit: Option<u64>,
    /// Progress sink; `None` reports nothing.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Parser name.
    pub parser: String,
    /// Records inserted (or staged, for a dry run).
    pub rows_imported: u64,
    /// Raw rows pulled from the source.
    pub rows_fetched: u64,
    /// Rows skipped by the late filter or dropped for other reasons.
    pub rows_skipped: u64,
    /// Whether the final commit was withheld.
    pub dry_run: bool,
}

/// Returns every registered parser definition.
#[must_use]
pub fn all_parsers() -> Vec<ParserDefinition> {
    registry::all_parsers()
}

/// Returns the parsers selected by the `--parsers` CLI flag or the
/// `OBS_SYNC_PARSERS` environment variable (comma-separated names).
/// With neither set, every registered parser is returned.
#[must_use]
pub fn enabled_parsers(cli_filter: Option<String>) -> Vec<ParserDefinition> {
    let filter = cli_filter.or_else(|| std::env::var("OBS_SYNC_PARSERS").ok());

    let all = all_parsers();
    let Some(filter_str) = filter else {
        return all;
    };

    let names: Vec<&str> = filter_str.split(',').map(str::trim).collect();
    let selected: Vec<ParserDefinition> = all
        .into_iter()
        .filter(|def| names.contains(&def.name.as_str()))
        .collect();

    if selected.is_empty() {
        log::warn!(
            "No matching parsers for filter {:?}. Available: {}",
            names,
            all_parsers()
                .iter()
                .map(|def| def.name.clone())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    selected
}

/// Runs one end-to-end import for a parser definition.
///
/// The mapping is validated before any network call. All inserts and the
/// history update happen inside a single transaction: a failed run
/// leaves no partial state, and a dry run rolls back instead of
/// committing (so the reported count comes from the exact code path a
/// real run takes).
///
/// # Errors
///
/// Returns an error on invalid configuration, terminal fetch failure,
/// record-build failure, or a store error. The transaction is rolled
/// back in every error case.
pub async fn run_parser(
    conn: &Connection,
    def: &ParserDefinition,
    options: &RunOptions,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let start = Instant::now();
    log::info!("Starting import '{}' ({})", def.name, def.kind());

    // fail fast, before any network call
    def.validate()?;

    let local_srid = nomenclature_db::DbSettings::new(conn).local_srid();
    let parser_record =
        parser_db::get_or_create(conn, &def.name, &def.description, def.schedule_frequency)?;

    if let Some(last_import) = parser_record.last_import {
        log::info!("'{}' last imported at {last_import}", def.name);
    }

    let fetch_options = FetchOptions {
        since: parser_record.last_import,
    };
    let mut source = RowSource::open(def, &fetch_options, RetryPolicy::from_env())?;

    let nomenclatures = nomenclature_db::DbNomenclatures::new(conn);
    let builder = RecordBuilder::new(def, local_srid, &nomenclatures);
    let progress = options
        .progress
        .clone()
        .unwrap_or_else(obs_sync_source::progress::null_progress);

    conn.execute_batch("BEGIN")?;
    let imported = match import_rows(conn, &mut source, &builder, options, &progress).await {
        Ok(counts) => counts,
        Err(e) => {
            conn.execute_batch("ROLLBACK")?;
            return Err(e);
        }
    };
    let (rows_imported, rows_fetched, rows_skipped) = imported;

    if options.dry_run {
        conn.execute_batch("ROLLBACK")?;
        log::info!(
            "Dry run: {rows_imported} row(s) would be imported for '{}', nothing committed",
            def.name
        );
    } else {
        let now = chrono::Utc::now();
        let count = i64::try_from(rows_imported).unwrap_or(i64::MAX);
        if let Err(e) = parser_db::update_history(conn, &def.name, now, count) {
            conn.execute_batch("ROLLBACK")?;
            return Err(e.into());
        }
        conn.execute_batch("COMMIT")?;
    }

    progress.finish(&format!("{rows_imported} row(s) imported"));
    log::info!(
        "Successfully imported {rows_imported} row(s) for '{}' \
         ({rows_fetched} fetched, {rows_skipped} skipped) in {:.1}s",
        def.name,
        start.elapsed().as_secs_f64()
    );

    Ok(RunSummary {
        parser: def.name.clone(),
        rows_imported,
        rows_fetched,
        rows_skipped,
        dry_run: options.dry_run,
    })
}

/// The fetch/build/insert loop, executed inside the run transaction.
/// Returns `(imported, fetched, skipped)` counts.
async fn import_rows(
    conn: &Connection,
    source: &mut RowSource,
    builder: &RecordBuilder<'_>,
    options: &RunOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(u64, u64, u64), Box<dyn std::error::Error>> {
    let mut staged = Vec::with_capacity(INSERT_BUFFER_ROWS);
    let mut rows_imported = 0u64;
    let mut rows_fetched = 0u64;
    let mut rows_skipped = 0u64;
    let mut total_declared = false;

    'pull: while let Some(batch) = source.next_batch().await? {
        if !total_declared && let Some(total) = source.expected_total() {
            progress.set_total(total);
            total_declared = true;
        }

        for row in &batch {
            rows_fetched += 1;
            match builder.build(row)? {
                Some(record) => {
                    staged.push(record);
                    rows_imported += 1;
                    if staged.len() >= INSERT_BUFFER_ROWS {
                        synthese_db::insert_records(conn, &staged)?;
                        staged.clear();
                    }
                }
                None => rows_skipped += 1,
            }
            if options.limit.is_some_and(|limit| rows_imported >= limit) {
                log::info!("Reached limit of {rows_imported} row(s)");
                break 'pull;
            }
        }
        progress.inc(batch.len() as u64);
    }

    synthese_db::insert_records(conn, &staged)?;
    Ok((rows_imported, rows_fetched, rows_skipped))
}

/// Runs every scheduled parser that is due.
///
/// Parsers are due when they have a schedule cadence and their last
/// import is absent or older than the cadence in days. Failures are
/// logged per parser and do not stop the sweep.
///
/// # Errors
///
/// Returns an error only when the bookkeeping rows cannot be read or
/// created; individual run failures are logged and skipped.
pub async fn run_scheduled(
    conn: &Connection,
    cli_filter: Option<String>,
) -> Result<u64, Box<dyn std::error::Error>> {
    let now = chrono::Utc::now();
    let mut runs = 0u64;

    for def in enabled_parsers(cli_filter) {
        let Some(_frequency) = def.schedule_frequency else {
            continue;
        };
        let record =
            parser_db::get_or_create(conn, &def.name, &def.description, def.schedule_frequency)?;
        if !record.is_due(now) {
            log::info!("'{}' is not due yet, skipping", def.name);
            continue;
        }

        match run_parser(conn, &def, &RunOptions::default()).await {
            Ok(summary) => {
                runs += 1;
                log::info!(
                    "Scheduled run of '{}' imported {} row(s)",
                    summary.parser,
                    summary.rows_imported
                );
            }
            Err(e) => log::error!("Scheduled run of '{}' failed: {e}", def.name),
        }
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_selects_by_name() {
        let selected = enabled_parsers(Some("geonature-occurrences".to_string()));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "geonature-occurrences");
    }

    #[test]
    fn unknown_filter_selects_nothing() {
        assert!(enabled_parsers(Some("nope".to_string())).is_empty());
    }

    #[test]
    fn no_filter_selects_everything() {
        // guard against env leakage from the host
        if std::env::var("OBS_SYNC_PARSERS").is_err() {
            assert_eq!(enabled_parsers(None).len(), all_parsers().len());
        }
    }
}
