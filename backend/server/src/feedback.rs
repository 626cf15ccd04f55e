use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::AppError,
    utils::{is_valid_email, normalize_email, require},
};

const ALL_FIELDS: &str = "Please fill out all fields.";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct FeedbackRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Feedback {
    pub feedback_id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

pub fn submit_feedback(conn: &Connection, request: &FeedbackRequest) -> Result<i64, AppError> {
    let name = require(request.name.as_deref(), ALL_FIELDS)?;
    let email = normalize_email(&require(request.email.as_deref(), ALL_FIELDS)?);
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::validation(ALL_FIELDS))?;

    if !is_valid_email(&email) {
        return Err(AppError::validation("Please enter a valid email address."));
    }

    conn.execute(
        "INSERT INTO feedback (name, email, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, message, Utc::now()],
    )?;
    let feedback_id = conn.last_insert_rowid();
    info!(feedback_id, "Feedback received");

    Ok(feedback_id)
}

pub fn list_feedback(conn: &Connection) -> Result<Vec<Feedback>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT feedback_id, name, email, message, created_at
         FROM feedback ORDER BY created_at DESC, feedback_id DESC",
    )?;
    let feedback = stmt
        .query_map([], |row| {
            Ok(Feedback {
                feedback_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                message: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(feedback)
}
