//! The audit log collaborator.
//!
//! `append` is fire-and-forget from the orchestrator's perspective: a
//! failed write is reported to operational telemetry and swallowed, so
//! it can never change the outcome of a retrieval or upload. The read
//! side serves reporting and does propagate errors.

use strongroom_core::types::AccessLogEntry;

use crate::database::Database;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct AuditLog {
    db: Database,
}

impl AuditLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an entry. Errors are absorbed here, never propagated.
    pub async fn append(&self, entry: AccessLogEntry) {
        if let Err(e) = self.db.insert_log_entry(&entry).await {
            tracing::warn!(
                error = %e,
                artifact = %entry.artifact_name,
                outcome = entry.outcome.as_str(),
                "audit log write failed, entry dropped"
            );
        }
    }

    /// Chronological entries for one user, newest first.
    pub async fn entries_for_user(&self, user_id: &str) -> Result<Vec<AccessLogEntry>> {
        self.db.log_entries_for_user(user_id).await
    }

    /// One page of the global trail, newest first.
    pub async fn entries_page(&self, limit: i64, offset: i64) -> Result<Vec<AccessLogEntry>> {
        self.db.log_entries_page(limit, offset).await
    }

    /// Aggregate counts grouped by outcome.
    pub async fn counts_by_outcome(&self) -> Result<Vec<(String, i64)>> {
        self.db.log_counts_by_outcome().await
    }
}
