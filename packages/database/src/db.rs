//! Connection management and schema creation.

use std::path::Path;

use duckdb::Connection;

use crate::DbError;

/// Default database location, overridable via `OBS_SYNC_DB`.
const DEFAULT_DB_PATH: &str = "data/obs_sync.duckdb";

/// Opens (or creates) the store at `path` and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Opens the store at the path given by the `OBS_SYNC_DB` environment
/// variable, falling back to `data/obs_sync.duckdb`.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_from_env() -> Result<Connection, DbError> {
    let path = std::env::var("OBS_SYNC_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    open(Path::new(&path))
}

/// Opens an in-memory store with the schema created. Used by tests.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Creates every table the store needs, idempotently.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS synthese_id_seq;

         CREATE TABLE IF NOT EXISTS synthese (
             id_synthese BIGINT PRIMARY KEY DEFAULT nextval('synthese_id_seq'),
             unique_id_sinp TEXT,
             entity_source_pk_value TEXT,
             cd_nom TEXT NOT NULL,
             nom_cite TEXT NOT NULL,
             observers TEXT NOT NULL,
             date_min TEXT NOT NULL,
             date_max TEXT NOT NULL,
             id_dataset BIGINT NOT NULL,
             id_source BIGINT NOT NULL,
             count_min BIGINT,
             count_max BIGINT,
             altitude_min BIGINT,
             altitude_max BIGINT,
             comment_context TEXT,
             comment_description TEXT,
             the_geom_4326 TEXT,
             the_geom_local TEXT,
             the_geom_point TEXT,
             id_nomenclature_geo_object_nature BIGINT,
             id_nomenclature_grp_typ BIGINT,
             id_nomenclature_obs_technique BIGINT,
             id_nomenclature_bio_status BIGINT,
             id_nomenclature_bio_condition BIGINT,
             id_nomenclature_naturalness BIGINT,
             id_nomenclature_exist_proof BIGINT,
             id_nomenclature_valid_status BIGINT,
             id_nomenclature_diffusion_level BIGINT,
             id_nomenclature_life_stage BIGINT,
             id_nomenclature_sex BIGINT,
             id_nomenclature_obj_count BIGINT,
             id_nomenclature_type_count BIGINT,
             id_nomenclature_sensitivity BIGINT,
             id_nomenclature_observation_status BIGINT,
             id_nomenclature_blurring BIGINT,
             id_nomenclature_source_status BIGINT,
             id_nomenclature_info_geo_type BIGINT,
             id_nomenclature_behaviour BIGINT,
             id_nomenclature_determination_method BIGINT,
             additional_data TEXT
         );

         CREATE TABLE IF NOT EXISTS parsers (
             name TEXT PRIMARY KEY,
             description TEXT,
             last_import TIMESTAMP,
             nb_row_total BIGINT NOT NULL DEFAULT 0,
             nb_row_last_import BIGINT,
             schedule_frequency BIGINT
         );

         CREATE TABLE IF NOT EXISTS nomenclatures (
             mnemonic TEXT NOT NULL,
             label TEXT NOT NULL,
             id_nomenclature BIGINT NOT NULL,
             PRIMARY KEY (mnemonic, label)
         );

         CREATE TABLE IF NOT EXISTS settings (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );",
    )?;

    Ok(())
}
