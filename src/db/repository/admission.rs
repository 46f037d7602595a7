use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{decode_local, decode_utc, encode_local, encode_utc};
use crate::db::DatabaseError;
use crate::models::enums::{AttemptStatus, SourceSystem};
use crate::models::{Admission, AdmissionRecord};

/// Insert or refresh an admission. A stored end is never cleared or
/// replaced; only an unset end can be filled in.
pub fn upsert_admission(conn: &Connection, admission: &Admission) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO admission (source_system, admission_id, patient_id, department,
         admitted_at, discharged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(source_system, admission_id) DO UPDATE SET
            patient_id = excluded.patient_id,
            department = excluded.department,
            admitted_at = excluded.admitted_at,
            discharged_at = COALESCE(admission.discharged_at, excluded.discharged_at)",
        params![
            admission.source_system.as_str(),
            admission.admission_id,
            admission.patient_id,
            admission.department,
            encode_local(&admission.admitted_at),
            admission.discharged_at.as_ref().map(encode_local),
        ],
    )?;
    Ok(())
}

pub fn record_admission_attempt(
    conn: &Connection,
    source_system: SourceSystem,
    admission_id: &str,
    status: AttemptStatus,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE admission SET last_attempt_at = ?1, last_attempt_status = ?2
         WHERE source_system = ?3 AND admission_id = ?4",
        params![
            encode_utc(at),
            status.as_str(),
            source_system.as_str(),
            admission_id
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "admission".into(),
            id: admission_id.into(),
        });
    }
    Ok(())
}

type AdmissionRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn record_from_row(row: AdmissionRow) -> Result<AdmissionRecord, DatabaseError> {
    let (source, admission_id, patient_id, department, admitted, discharged, attempt_at, attempt_status) =
        row;
    Ok(AdmissionRecord {
        admission: Admission {
            admission_id,
            patient_id,
            department,
            admitted_at: decode_local("admitted_at", &admitted)?,
            discharged_at: discharged
                .as_deref()
                .map(|v| decode_local("discharged_at", v))
                .transpose()?,
            source_system: SourceSystem::from_str(&source)?,
        },
        last_attempt_at: attempt_at
            .as_deref()
            .map(|v| decode_utc("last_attempt_at", v))
            .transpose()?,
        last_attempt_status: attempt_status
            .as_deref()
            .map(AttemptStatus::from_str)
            .transpose()?,
    })
}

fn query_admission(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Option<AdmissionRecord>, DatabaseError> {
    let sql = format!(
        "SELECT source_system, admission_id, patient_id, department, admitted_at,
         discharged_at, last_attempt_at, last_attempt_status
         FROM admission {where_clause} LIMIT 1"
    );
    let row = conn
        .query_row(&sql, params, |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })
        .optional()?;
    row.map(record_from_row).transpose()
}

pub fn get_admission(
    conn: &Connection,
    source_system: SourceSystem,
    admission_id: &str,
) -> Result<Option<AdmissionRecord>, DatabaseError> {
    query_admission(
        conn,
        "WHERE source_system = ?1 AND admission_id = ?2",
        &[&source_system.as_str(), &admission_id],
    )
}

/// Look an admission up by encounter id alone, newest stay first.
pub fn find_admission(
    conn: &Connection,
    admission_id: &str,
) -> Result<Option<AdmissionRecord>, DatabaseError> {
    query_admission(
        conn,
        "WHERE admission_id = ?1 ORDER BY admitted_at DESC",
        &[&admission_id],
    )
}
