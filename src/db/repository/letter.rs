use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{decode_utc, encode_utc};
use crate::db::DatabaseError;
use crate::models::enums::{Environment, LetterOutcome};
use crate::models::{GeneratedLetter, LetterSection};

const LETTER_COLUMNS: &str = "id, admission_id, department, environment, generated_at, outcome,
     sections, raw_response, input_tokens, error_detail, is_current";

struct LetterRow {
    id: String,
    admission_id: String,
    department: String,
    environment: String,
    generated_at: String,
    outcome: String,
    sections: String,
    raw_response: Option<String>,
    input_tokens: Option<i64>,
    error_detail: Option<String>,
    is_current: bool,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<LetterRow> {
    Ok(LetterRow {
        id: row.get(0)?,
        admission_id: row.get(1)?,
        department: row.get(2)?,
        environment: row.get(3)?,
        generated_at: row.get(4)?,
        outcome: row.get(5)?,
        sections: row.get(6)?,
        raw_response: row.get(7)?,
        input_tokens: row.get(8)?,
        error_detail: row.get(9)?,
        is_current: row.get(10)?,
    })
}

fn letter_from_row(row: LetterRow) -> Result<GeneratedLetter, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidEnum {
        field: "generated_letter.id".into(),
        value: row.id.clone(),
    })?;
    let sections: Vec<LetterSection> = serde_json::from_str(&row.sections)?;
    Ok(GeneratedLetter {
        id,
        admission_id: row.admission_id,
        department: row.department,
        environment: Environment::from_str(&row.environment)?,
        generated_at: decode_utc("generated_at", &row.generated_at)?,
        outcome: LetterOutcome::from_str(&row.outcome)?,
        sections,
        raw_response: row.raw_response,
        input_tokens: row.input_tokens.map(|n| n.max(0) as usize),
        error_detail: row.error_detail,
        is_current: row.is_current,
    })
}

fn query_letters(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<GeneratedLetter>, DatabaseError> {
    let sql = format!("SELECT {LETTER_COLUMNS} FROM generated_letter {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(letter_from_row).collect()
}

fn query_one(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Option<GeneratedLetter>, DatabaseError> {
    let sql = format!("SELECT {LETTER_COLUMNS} FROM generated_letter {where_clause} LIMIT 1");
    let row = conn.query_row(&sql, params, read_row).optional()?;
    row.map(letter_from_row).transpose()
}

/// Insert a letter row. Returns false when a letter for the same admission
/// and generation timestamp already exists.
pub fn insert_letter(
    conn: &Connection,
    letter: &GeneratedLetter,
    is_current: bool,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO generated_letter (id, admission_id, department, environment,
         generated_at, outcome, sections, raw_response, input_tokens, error_detail, is_current)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            letter.id.to_string(),
            letter.admission_id,
            letter.department,
            letter.environment.as_str(),
            encode_utc(&letter.generated_at),
            letter.outcome.as_str(),
            serde_json::to_string(&letter.sections)?,
            letter.raw_response,
            letter.input_tokens.map(|n| n as i64),
            letter.error_detail,
            is_current,
        ],
    )?;
    Ok(inserted == 1)
}

pub fn get_letter(conn: &Connection, id: &Uuid) -> Result<Option<GeneratedLetter>, DatabaseError> {
    query_one(conn, "WHERE id = ?1", &[&id.to_string()])
}

pub fn find_letter_at(
    conn: &Connection,
    admission_id: &str,
    generated_at: &DateTime<Utc>,
) -> Result<Option<GeneratedLetter>, DatabaseError> {
    query_one(
        conn,
        "WHERE admission_id = ?1 AND generated_at = ?2",
        &[&admission_id, &encode_utc(generated_at)],
    )
}

pub fn get_current_letter(
    conn: &Connection,
    admission_id: &str,
) -> Result<Option<GeneratedLetter>, DatabaseError> {
    query_one(conn, "WHERE admission_id = ?1 AND is_current = 1", &[&admission_id])
}

pub fn get_latest_successful_letter(
    conn: &Connection,
    admission_id: &str,
) -> Result<Option<GeneratedLetter>, DatabaseError> {
    query_one(
        conn,
        "WHERE admission_id = ?1 AND outcome = ?2 ORDER BY generated_at DESC",
        &[&admission_id, &LetterOutcome::Success.as_str()],
    )
}

/// All letters for an admission, newest first.
pub fn list_letters(
    conn: &Connection,
    admission_id: &str,
) -> Result<Vec<GeneratedLetter>, DatabaseError> {
    query_letters(
        conn,
        "WHERE admission_id = ?1 ORDER BY generated_at DESC",
        &[&admission_id],
    )
}

pub fn demote_current_letter(conn: &Connection, admission_id: &str) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE generated_letter SET is_current = 0 WHERE admission_id = ?1 AND is_current = 1",
        params![admission_id],
    )?;
    Ok(updated)
}

/// Delete every letter generated strictly before `cutoff`.
pub fn delete_letters_before(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM generated_letter WHERE generated_at < ?1",
        params![encode_utc(cutoff)],
    )?;
    if deleted > 0 {
        repair_current_pointers(conn)?;
    }
    Ok(deleted)
}

pub fn delete_letters_by_environment(
    conn: &Connection,
    environment: Environment,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM generated_letter WHERE environment = ?1",
        params![environment.as_str()],
    )?;
    if deleted > 0 {
        repair_current_pointers(conn)?;
    }
    Ok(deleted)
}

/// After a bulk delete, mark the newest remaining letter current for every
/// admission that lost its current row.
fn repair_current_pointers(conn: &Connection) -> Result<usize, DatabaseError> {
    let promoted = conn.execute(
        "UPDATE generated_letter SET is_current = 1
         WHERE id IN (
            SELECT g.id FROM generated_letter g
            WHERE NOT EXISTS (
                SELECT 1 FROM generated_letter c
                WHERE c.admission_id = g.admission_id AND c.is_current = 1
            )
            AND g.generated_at = (
                SELECT MAX(m.generated_at) FROM generated_letter m
                WHERE m.admission_id = g.admission_id
            )
         )",
        [],
    )?;
    Ok(promoted)
}
