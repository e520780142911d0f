//! Artifact metadata queries.
//!
//! Policy mutations are deliberately narrow: each statement touches only
//! its own column so concurrent owners of different fields cannot lose
//! updates to a whole-record replace. The download counter is advanced
//! with an increment-and-fetch in SQL, never read-modify-write in
//! process memory.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use strongroom_core::types::{AccessPolicy, Artifact};

use super::Database;
use crate::error::Result;

const ARTIFACT_COLUMNS: &str = "id, owner_id, display_name, size_bytes, mime_type, \
     storage_locator, created_at, shared_with, is_public, public_token, \
     requires_password, password_hash, expires_at, auto_delete, max_downloads, download_count";

impl Database {
    /// Insert a new artifact record.
    pub async fn insert_artifact(&self, artifact: &Artifact) -> Result<()> {
        let shared_with = serde_json::to_string(&artifact.policy.shared_with)
            .unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            r#"
            INSERT INTO artifacts (
                id, owner_id, display_name, size_bytes, mime_type,
                storage_locator, created_at, shared_with, is_public, public_token,
                requires_password, password_hash, expires_at, auto_delete,
                max_downloads, download_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(artifact.id.to_string())
        .bind(&artifact.owner_id)
        .bind(&artifact.display_name)
        .bind(artifact.size_bytes)
        .bind(&artifact.mime_type)
        .bind(&artifact.storage_locator)
        .bind(artifact.created_at.timestamp())
        .bind(shared_with)
        .bind(artifact.policy.is_public)
        .bind(&artifact.policy.public_token)
        .bind(artifact.policy.requires_password)
        .bind(&artifact.policy.password_hash)
        .bind(artifact.policy.expires_at.map(|t| t.timestamp()))
        .bind(artifact.policy.auto_delete)
        .bind(artifact.policy.max_downloads)
        .bind(artifact.policy.download_count)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Fetch an artifact by id.
    pub async fn get_artifact(&self, id: &Uuid) -> Result<Option<Artifact>> {
        let row = sqlx::query(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(artifact_from_row).transpose()
    }

    /// Fetch an artifact by its active public token.
    pub async fn get_artifact_by_public_token(&self, token: &str) -> Result<Option<Artifact>> {
        let row = sqlx::query(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE public_token = ? AND is_public = 1"
        ))
        .bind(token)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(artifact_from_row).transpose()
    }

    /// Delete an artifact record. Returns whether a row was removed.
    pub async fn delete_artifact(&self, id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically advance the download counter, returning the new value.
    ///
    /// Returns `None` when the artifact no longer exists.
    pub async fn increment_download_count(&self, id: &Uuid) -> Result<Option<i64>> {
        let row = sqlx::query(
            "UPDATE artifacts SET download_count = download_count + 1 \
             WHERE id = ? RETURNING download_count",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| r.get::<i64, _>("download_count")))
    }

    /// Replace the set of users granted authenticated access.
    pub async fn set_shared_with(&self, id: &Uuid, users: &[String]) -> Result<()> {
        let json = serde_json::to_string(users).unwrap_or_else(|_| "[]".to_string());
        sqlx::query("UPDATE artifacts SET shared_with = ? WHERE id = ?")
            .bind(json)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Activate or revoke the public link. `is_public` is derived from
    /// token presence, keeping the pair consistent in one statement.
    pub async fn set_public_token(&self, id: &Uuid, token: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE artifacts SET is_public = ?, public_token = ? WHERE id = ?")
            .bind(token.is_some())
            .bind(token)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Set or clear the password hash; `requires_password` follows.
    pub async fn set_password_hash(&self, id: &Uuid, hash: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE artifacts SET requires_password = ?, password_hash = ? WHERE id = ?")
            .bind(hash.is_some())
            .bind(hash)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Set or clear the expiry timestamp.
    pub async fn set_expires_at(&self, id: &Uuid, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE artifacts SET expires_at = ? WHERE id = ?")
            .bind(expires_at.map(|t| t.timestamp()))
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Toggle the reaper flag.
    pub async fn set_auto_delete(&self, id: &Uuid, auto_delete: bool) -> Result<()> {
        sqlx::query("UPDATE artifacts SET auto_delete = ? WHERE id = ?")
            .bind(auto_delete)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Set or clear the download ceiling.
    pub async fn set_max_downloads(&self, id: &Uuid, max: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE artifacts SET max_downloads = ? WHERE id = ?")
            .bind(max)
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Artifacts the reaper should sweep: auto-delete enabled and expiry
    /// already lapsed.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Artifact>> {
        let rows = sqlx::query(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM artifacts \
             WHERE auto_delete = 1 AND expires_at IS NOT NULL AND expires_at < ?"
        ))
        .bind(now.timestamp())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(artifact_from_row).collect()
    }
}

fn artifact_from_row(row: &SqliteRow) -> Result<Artifact> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let shared_with: String = row.get("shared_with");
    let shared_with: Vec<String> = serde_json::from_str(&shared_with).unwrap_or_else(|e| {
        tracing::warn!(artifact_id = %id, error = %e, "invalid shared_with JSON, treating as empty");
        Vec::new()
    });

    Ok(Artifact {
        id,
        owner_id: row.get("owner_id"),
        display_name: row.get("display_name"),
        size_bytes: row.get("size_bytes"),
        mime_type: row.get("mime_type"),
        storage_locator: row.get("storage_locator"),
        created_at: timestamp(row.get("created_at")),
        policy: AccessPolicy {
            shared_with,
            is_public: row.get("is_public"),
            public_token: row.get("public_token"),
            requires_password: row.get("requires_password"),
            password_hash: row.get("password_hash"),
            expires_at: row.get::<Option<i64>, _>("expires_at").map(timestamp),
            auto_delete: row.get("auto_delete"),
            max_downloads: row.get("max_downloads"),
            download_count: row.get("download_count"),
        },
    })
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
