//! Nomenclature lookups and deployment settings backed by the store.

use duckdb::Connection;
use obs_sync_source::CrsProvider;
use obs_sync_source::nomenclature::NomenclatureLookup;

use crate::DbError;

/// Settings key holding the deployment-local SRID.
const LOCAL_SRID_KEY: &str = "local_srid";

/// Registers one vocabulary entry.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails (including duplicate
/// (mnemonic, label) pairs).
pub fn insert_nomenclature(
    conn: &Connection,
    mnemonic: &str,
    label: &str,
    id_nomenclature: i64,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO nomenclatures (mnemonic, label, id_nomenclature) VALUES (?, ?, ?)",
        duckdb::params![mnemonic, label, id_nomenclature],
    )?;
    Ok(())
}

/// Store-backed [`NomenclatureLookup`].
pub struct DbNomenclatures<'a> {
    conn: &'a Connection,
}

impl<'a> DbNomenclatures<'a> {
    /// Wraps a connection.
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl NomenclatureLookup for DbNomenclatures<'_> {
    fn resolve(&self, mnemonic: &str, label: &str) -> Option<i64> {
        let result = self
            .conn
            .prepare(
                "SELECT id_nomenclature FROM nomenclatures WHERE mnemonic = ? AND label = ?",
            )
            .and_then(|mut stmt| stmt.query_row([mnemonic, label], |row| row.get(0)));

        match result {
            Ok(id) => Some(id),
            Err(duckdb::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                log::error!("nomenclature lookup failed for ({mnemonic}, {label}): {e}");
                None
            }
        }
    }
}

/// Store-backed [`CrsProvider`]: reads the deployment-local SRID from the
/// settings table, defaulting to Lambert-93.
pub struct DbSettings<'a> {
    conn: &'a Connection,
}

impl<'a> DbSettings<'a> {
    /// Wraps a connection.
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CrsProvider for DbSettings<'_> {
    fn local_srid(&self) -> i32 {
        let result = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?")
            .and_then(|mut stmt| stmt.query_row([LOCAL_SRID_KEY], |row| row.get::<_, String>(0)));

        match result {
            Ok(value) => value
                .parse()
                .unwrap_or(obs_sync_geometry::LOCAL_REFERENCE_SRID),
            Err(_) => obs_sync_geometry::LOCAL_REFERENCE_SRID,
        }
    }
}

/// Sets the deployment-local SRID.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_local_srid(conn: &Connection, srid: i32) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
        duckdb::params![LOCAL_SRID_KEY, srid.to_string()],
    )?;
    Ok(())
}
