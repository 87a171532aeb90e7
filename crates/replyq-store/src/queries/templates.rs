// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply template operations.
//!
//! Keywords are stored as one comma-separated column.

use replyq_core::{ReplyqError, Template};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

fn template_from_row(row: &Row<'_>) -> Result<Template, rusqlite::Error> {
    let keywords: String = row.get(1)?;
    Ok(Template {
        id: row.get(0)?,
        keywords: split_keywords(&keywords),
        response: row.get(2)?,
        is_active: row.get(3)?,
        usage_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Insert an active template. Returns the new id.
pub async fn insert_template(
    db: &Database,
    keywords: &[&str],
    response: &str,
) -> Result<i64, ReplyqError> {
    let keywords = keywords.join(",");
    let response = response.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO templates (keywords, response) VALUES (?1, ?2)",
                params![keywords, response],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Active templates in creation order (created_at, then id).
pub async fn active_templates(db: &Database) -> Result<Vec<Template>, ReplyqError> {
    db.connection()
        .call(|conn| -> Result<Vec<Template>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, keywords, response, is_active, usage_count, created_at
                 FROM templates WHERE is_active = 1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map([], template_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Add one to a template's usage counter in a single statement.
pub async fn increment_usage(db: &Database, id: i64) -> Result<usize, ReplyqError> {
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE templates SET usage_count = usage_count + 1 WHERE id = ?1",
                params![id],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Deactivate a template without deleting it.
pub async fn set_active(db: &Database, id: i64, active: bool) -> Result<usize, ReplyqError> {
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE templates SET is_active = ?2 WHERE id = ?1",
                params![id, active],
            )
        })
        .await
        .map_err(map_tr_err)
}
