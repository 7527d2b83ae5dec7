//! Per-parser run bookkeeping, keyed by parser name.

use chrono::{DateTime, Utc};
use duckdb::Connection;
use obs_sync_synthese_models::ParserRecord;

use crate::DbError;

/// Timestamp format used when binding `last_import`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Looks up the bookkeeping row for a parser.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn find(conn: &Connection, name: &str) -> Result<Option<ParserRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name, description, last_import::TEXT, nb_row_total, \
                nb_row_last_import, schedule_frequency \
         FROM parsers WHERE name = ?",
    )?;

    let row = stmt.query_row([name], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Option<i64>>(4)?,
            row.get::<_, Option<i64>>(5)?,
        ))
    });

    match row {
        Ok((name, description, last_import, nb_row_total, nb_row_last_import, frequency)) => {
            Ok(Some(ParserRecord {
                name,
                description,
                last_import: last_import.as_deref().and_then(parse_timestamp),
                nb_row_total,
                nb_row_last_import,
                schedule_frequency: frequency,
            }))
        }
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns the bookkeeping row for a parser, creating it on first use.
///
/// A fresh row carries the description and schedule cadence from the
/// definition and null counts.
///
/// # Errors
///
/// Returns [`DbError`] if a statement fails.
pub fn get_or_create(
    conn: &Connection,
    name: &str,
    description: &str,
    schedule_frequency: Option<i64>,
) -> Result<ParserRecord, DbError> {
    if let Some(record) = find(conn, name)? {
        return Ok(record);
    }

    conn.execute(
        "INSERT INTO parsers (name, description, schedule_frequency) VALUES (?, ?, ?)",
        duckdb::params![name, description, schedule_frequency],
    )?;
    log::info!("registered parser '{name}'");

    find(conn, name)?.ok_or_else(|| DbError::Conversion {
        message: format!("parser '{name}' vanished after creation"),
    })
}

/// Records a successful run: sets `last_import`, replaces the last-run
/// count, and adds it to the cumulative total.
///
/// Runs inside the caller's transaction, alongside the record inserts.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub fn update_history(
    conn: &Connection,
    name: &str,
    last_import: DateTime<Utc>,
    nb_rows: i64,
) -> Result<(), DbError> {
    conn.execute(
        "UPDATE parsers SET last_import = ?, nb_row_last_import = ?, \
                nb_row_total = nb_row_total + ? \
         WHERE name = ?",
        duckdb::params![
            last_import.format(TIMESTAMP_FORMAT).to_string(),
            nb_rows,
            nb_rows,
            name
        ],
    )?;
    Ok(())
}

/// Returns every bookkeeping row, ordered by name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn list(conn: &Connection) -> Result<Vec<ParserRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name, description, last_import::TEXT, nb_row_total, \
                nb_row_last_import, schedule_frequency \
         FROM parsers ORDER BY name",
    )?;

    let mut rows = stmt.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let last_import: Option<String> = row.get(2)?;
        records.push(ParserRecord {
            name: row.get(0)?,
            description: row.get(1)?,
            last_import: last_import.as_deref().and_then(parse_timestamp),
            nb_row_total: row.get(3)?,
            nb_row_last_import: row.get(4)?,
            schedule_frequency: row.get(5)?,
        });
    }
    Ok(records)
}

/// Parses a `DuckDB` timestamp text cast into a UTC datetime, trying the
/// formats the cast can produce (with and without fractional seconds).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    use chrono::NaiveDateTime;

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn creates_row_lazily_with_null_counts() {
        let conn = open_in_memory().unwrap();
        assert!(find(&conn, "demo").unwrap().is_none());

        let record = get_or_create(&conn, "demo", "Demo parser", Some(7)).unwrap();
        assert_eq!(record.name, "demo");
        assert_eq!(record.description.as_deref(), Some("Demo parser"));
        assert!(record.last_import.is_none());
        assert_eq!(record.nb_row_total, 0);
        assert_eq!(record.nb_row_last_import, None);
        assert_eq!(record.schedule_frequency, Some(7));

        // second call returns the existing row untouched
        let again = get_or_create(&conn, "demo", "changed", None).unwrap();
        assert_eq!(again.description.as_deref(), Some("Demo parser"));
    }

    #[test]
    fn history_accumulates_across_runs() {
        let conn = open_in_memory().unwrap();
        get_or_create(&conn, "demo", "", None).unwrap();

        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        update_history(&conn, "demo", first, 120).unwrap();
        let record = find(&conn, "demo").unwrap().unwrap();
        assert_eq!(record.last_import, Some(first));
        assert_eq!(record.nb_row_last_import, Some(120));
        assert_eq!(record.nb_row_total, 120);

        let second = Utc.with_ymd_and_hms(2024, 5, 8, 8, 0, 0).unwrap();
        update_history(&conn, "demo", second, 0).unwrap();
        let record = find(&conn, "demo").unwrap().unwrap();
        // an empty incremental run advances last_import but not the total
        assert_eq!(record.last_import, Some(second));
        assert_eq!(record.nb_row_last_import, Some(0));
        assert_eq!(record.nb_row_total, 120);
    }

    #[test]
    fn lists_rows_ordered_by_name() {
        let conn = open_in_memory().unwrap();
        get_or_create(&conn, "zebra", "", None).unwrap();
        get_or_create(&conn, "alpha", "", Some(1)).unwrap();

        let names: Vec<String> = list(&conn).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "zebra"]);
    }
}
