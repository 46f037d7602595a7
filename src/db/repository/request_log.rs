use rusqlite::{params, Connection};

use super::{decode_utc, encode_utc};
use crate::db::DatabaseError;
use crate::models::RequestLogEntry;

pub fn insert_request_log(conn: &Connection, entry: &RequestLogEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO request_log (logged_at, method, endpoint, status, runtime_ms, api_version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            encode_utc(&entry.logged_at),
            entry.method,
            entry.endpoint,
            entry.status,
            entry.runtime_ms as i64,
            entry.api_version,
        ],
    )?;
    Ok(())
}

/// Most recent requests first.
pub fn list_recent_requests(conn: &Connection, limit: usize) -> Result<Vec<RequestLogEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT logged_at, method, endpoint, status, runtime_ms, api_version
         FROM request_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u16>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(logged_at, method, endpoint, status, runtime_ms, api_version)| {
            Ok(RequestLogEntry {
                logged_at: decode_utc("logged_at", &logged_at)?,
                method,
                endpoint,
                status,
                runtime_ms: runtime_ms.max(0) as u64,
                api_version,
            })
        })
        .collect()
}
