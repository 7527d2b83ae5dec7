//! Batched inserts into the `synthese` destination table.

use duckdb::Connection;
use obs_sync_synthese_models::SyntheseRecord;

use crate::DbError;

/// Rows per INSERT chunk.
const CHUNK_SIZE: usize = 500;

/// Values per row in the INSERT, the trailing sequence default included.
const VALUES_PER_ROW: usize = 40;

/// Insert column list; `id_synthese` comes from the sequence default.
const INSERT_COLUMNS: &str = "unique_id_sinp, entity_source_pk_value, cd_nom, nom_cite, \
     observers, date_min, date_max, id_dataset, id_source, \
     count_min, count_max, altitude_min, altitude_max, \
     comment_context, comment_description, \
     the_geom_4326, the_geom_local, the_geom_point, \
     id_nomenclature_geo_object_nature, id_nomenclature_grp_typ, \
     id_nomenclature_obs_technique, id_nomenclature_bio_status, \
     id_nomenclature_bio_condition, id_nomenclature_naturalness, \
     id_nomenclature_exist_proof, id_nomenclature_valid_status, \
     id_nomenclature_diffusion_level, id_nomenclature_life_stage, \
     id_nomenclature_sex, id_nomenclature_obj_count, \
     id_nomenclature_type_count, id_nomenclature_sensitivity, \
     id_nomenclature_observation_status, id_nomenclature_blurring, \
     id_nomenclature_source_status, id_nomenclature_info_geo_type, \
     id_nomenclature_behaviour, id_nomenclature_determination_method, \
     additional_data, id_synthese";

/// Nomenclature columns in bind order.
const NOMENCLATURE_BIND_ORDER: &[&str] = &[
    "id_nomenclature_geo_object_nature",
    "id_nomenclature_grp_typ",
    "id_nomenclature_obs_technique",
    "id_nomenclature_bio_status",
    "id_nomenclature_bio_condition",
    "id_nomenclature_naturalness",
    "id_nomenclature_exist_proof",
    "id_nomenclature_valid_status",
    "id_nomenclature_diffusion_level",
    "id_nomenclature_life_stage",
    "id_nomenclature_sex",
    "id_nomenclature_obj_count",
    "id_nomenclature_type_count",
    "id_nomenclature_sensitivity",
    "id_nomenclature_observation_status",
    "id_nomenclature_blurring",
    "id_nomenclature_source_status",
    "id_nomenclature_info_geo_type",
    "id_nomenclature_behaviour",
    "id_nomenclature_determination_method",
];

/// Inserts a batch of records with chunked multi-row INSERT statements.
///
/// Transaction boundaries belong to the caller: the run orchestrator
/// wraps all inserts plus the history update in a single transaction.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn insert_records(conn: &Connection, records: &[SyntheseRecord]) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut total_inserted = 0u64;

    for chunk in records.chunks(CHUNK_SIZE) {
        let mut sql = format!("INSERT INTO synthese ({INSERT_COLUMNS}) VALUES ");
        for (i, _) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            sql.push_str(&"?, ".repeat(VALUES_PER_ROW - 1));
            sql.push_str("nextval('synthese_id_seq'))");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;
        for record in chunk {
            param_idx = bind_record(&mut stmt, param_idx, record)?;
        }

        let rows = stmt.raw_execute()?;
        total_inserted += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total_inserted)
}

/// Binds one record's columns starting at `param_idx`; returns the next
/// free parameter index.
fn bind_record(
    stmt: &mut duckdb::Statement<'_>,
    mut param_idx: usize,
    record: &SyntheseRecord,
) -> Result<usize, DbError> {
    stmt.raw_bind_parameter(param_idx, record.unique_id_sinp.as_deref())?;
    stmt.raw_bind_parameter(param_idx + 1, record.entity_source_pk_value.as_deref())?;
    stmt.raw_bind_parameter(param_idx + 2, &record.cd_nom)?;
    stmt.raw_bind_parameter(param_idx + 3, &record.nom_cite)?;
    stmt.raw_bind_parameter(param_idx + 4, &record.observers)?;
    stmt.raw_bind_parameter(param_idx + 5, &record.date_min)?;
    stmt.raw_bind_parameter(param_idx + 6, &record.date_max)?;
    stmt.raw_bind_parameter(param_idx + 7, record.id_dataset)?;
    stmt.raw_bind_parameter(param_idx + 8, record.id_source)?;
    stmt.raw_bind_parameter(param_idx + 9, record.count_min)?;
    stmt.raw_bind_parameter(param_idx + 10, record.count_max)?;
    stmt.raw_bind_parameter(param_idx + 11, record.altitude_min)?;
    stmt.raw_bind_parameter(param_idx + 12, record.altitude_max)?;
    stmt.raw_bind_parameter(param_idx + 13, record.comment_context.as_deref())?;
    stmt.raw_bind_parameter(param_idx + 14, record.comment_description.as_deref())?;
    stmt.raw_bind_parameter(param_idx + 15, record.the_geom_4326.as_deref())?;
    stmt.raw_bind_parameter(param_idx + 16, record.the_geom_local.as_deref())?;
    stmt.raw_bind_parameter(param_idx + 17, record.the_geom_point.as_deref())?;
    param_idx += 18;

    for column in NOMENCLATURE_BIND_ORDER {
        stmt.raw_bind_parameter(param_idx, record.nomenclatures.get(*column).copied())?;
        param_idx += 1;
    }

    stmt.raw_bind_parameter(
        param_idx,
        record.additional_data.as_ref().map(ToString::to_string),
    )?;
    Ok(param_idx + 1)
}

/// Returns the number of rows in the `synthese` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_records(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM synthese")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::db::open_in_memory;

    fn sample_record(pk: &str) -> SyntheseRecord {
        SyntheseRecord {
            cd_nom: "60630".to_string(),
            nom_cite: "Lutra lutra".to_string(),
            observers: "A. Dupont".to_string(),
            date_min: "2024-05-01".to_string(),
            date_max: "2024-05-01".to_string(),
            id_dataset: 1,
            id_source: 2,
            unique_id_sinp: None,
            entity_source_pk_value: Some(pk.to_string()),
            count_min: Some(1),
            count_max: Some(3),
            altitude_min: None,
            altitude_max: None,
            comment_context: None,
            comment_description: None,
            the_geom_4326: Some(r#"{"type":"Point","coordinates":[2.35,48.85]}"#.to_string()),
            the_geom_local: None,
            the_geom_point: None,
            nomenclatures: BTreeMap::from([("id_nomenclature_sex".to_string(), 168)]),
            additional_data: Some(serde_json::json!({"precision": 10})),
        }
    }

    #[test]
    fn inserts_and_counts_records() {
        let conn = open_in_memory().unwrap();
        let records = vec![sample_record("1"), sample_record("2")];
        let inserted = insert_records(&conn, &records).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(count_records(&conn).unwrap(), 2);
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let conn = open_in_memory().unwrap();
        assert_eq!(insert_records(&conn, &[]).unwrap(), 0);
    }

    #[test]
    fn stored_values_round_trip() {
        let conn = open_in_memory().unwrap();
        insert_records(&conn, &[sample_record("42")]).unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT cd_nom, id_nomenclature_sex, additional_data, entity_source_pk_value \
                 FROM synthese",
            )
            .unwrap();
        let (cd_nom, sex, extra, pk): (String, Option<i64>, Option<String>, Option<String>) = stmt
            .query_row([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .unwrap();
        assert_eq!(cd_nom, "60630");
        assert_eq!(sex, Some(168));
        assert_eq!(extra.as_deref(), Some(r#"{"precision":10}"#));
        assert_eq!(pk.as_deref(), Some("42"));
    }

    #[test]
    fn rollback_leaves_no_rows() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch("BEGIN").unwrap();
        insert_records(&conn, &[sample_record("1")]).unwrap();
        conn.execute_batch("ROLLBACK").unwrap();
        assert_eq!(count_records(&conn).unwrap(), 0);
    }
}
