//! Audit trail queries. Rows are append-only; nothing here mutates or
//! deletes existing entries.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use strongroom_core::types::{AccessLogEntry, AccessMethod, Outcome};

use super::Database;
use crate::error::Result;

impl Database {
    /// Append one audit entry.
    pub async fn insert_log_entry(&self, entry: &AccessLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_log (
                artifact_id, artifact_name, user_id, source_addr, location,
                method, outcome, deny_reason, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.artifact_id.map(|id| id.to_string()))
        .bind(&entry.artifact_name)
        .bind(&entry.user_id)
        .bind(&entry.source_addr)
        .bind(&entry.location)
        .bind(entry.method.as_str())
        .bind(entry.outcome.as_str())
        .bind(&entry.deny_reason)
        .bind(entry.created_at.timestamp())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// All entries for one user, newest first.
    pub async fn log_entries_for_user(&self, user_id: &str) -> Result<Vec<AccessLogEntry>> {
        let rows = sqlx::query(
            "SELECT artifact_id, artifact_name, user_id, source_addr, location, \
             method, outcome, deny_reason, created_at \
             FROM access_log WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(log_entry_from_row).collect())
    }

    /// One page of the global trail, newest first.
    pub async fn log_entries_page(&self, limit: i64, offset: i64) -> Result<Vec<AccessLogEntry>> {
        let rows = sqlx::query(
            "SELECT artifact_id, artifact_name, user_id, source_addr, location, \
             method, outcome, deny_reason, created_at \
             FROM access_log ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(log_entry_from_row).collect())
    }

    /// Aggregate entry counts grouped by outcome.
    pub async fn log_counts_by_outcome(&self) -> Result<Vec<(String, i64)>> {
        let rows =
            sqlx::query("SELECT outcome, COUNT(*) AS n FROM access_log GROUP BY outcome")
                .fetch_all(self.pool())
                .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("outcome"), r.get::<i64, _>("n")))
            .collect())
    }
}

fn log_entry_from_row(row: &SqliteRow) -> AccessLogEntry {
    let artifact_id = row
        .get::<Option<String>, _>("artifact_id")
        .and_then(|s| Uuid::parse_str(&s).ok());

    AccessLogEntry {
        artifact_id,
        artifact_name: row.get("artifact_name"),
        user_id: row.get("user_id"),
        source_addr: row.get("source_addr"),
        location: row.get("location"),
        method: AccessMethod::parse(row.get::<String, _>("method").as_str()),
        outcome: Outcome::parse(row.get::<String, _>("outcome").as_str()),
        deny_reason: row.get("deny_reason"),
        created_at: chrono::DateTime::from_timestamp(row.get("created_at"), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH),
    }
}
