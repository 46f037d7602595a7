use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{decode_utc, encode_utc};
use crate::db::DatabaseError;
use crate::models::Feedback;

pub fn insert_feedback(conn: &Connection, feedback: &Feedback) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO feedback (id, admission_id, letter_id, question, answer, rating, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            feedback.id.to_string(),
            feedback.admission_id,
            feedback.letter_id.map(|id| id.to_string()),
            feedback.question,
            feedback.answer,
            feedback.rating,
            encode_utc(&feedback.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_feedback(conn: &Connection, admission_id: &str) -> Result<Vec<Feedback>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, admission_id, letter_id, question, answer, rating, created_at
         FROM feedback WHERE admission_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt
        .query_map(params![admission_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<i32>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, admission_id, letter_id, question, answer, rating, created_at)| {
            Ok(Feedback {
                id: parse_uuid("feedback.id", &id)?,
                admission_id,
                letter_id: letter_id
                    .as_deref()
                    .map(|v| parse_uuid("feedback.letter_id", v))
                    .transpose()?,
                question,
                answer,
                rating,
                created_at: decode_utc("created_at", &created_at)?,
            })
        })
        .collect()
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidEnum {
        field: field.into(),
        value: value.into(),
    })
}
