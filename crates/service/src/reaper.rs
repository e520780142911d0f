//! The expiry reaper: a periodic sweep deleting artifacts whose
//! retention policy has lapsed.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::database::Database;
use crate::error::Result;
use crate::store::ArtifactStore;

#[derive(Debug, Clone)]
pub struct ExpiryReaper {
    db: Database,
    store: ArtifactStore,
}

impl ExpiryReaper {
    pub fn new(db: Database, store: ArtifactStore) -> Self {
        Self { db, store }
    }

    /// One sweep pass. Deletes every artifact with `auto_delete` set and
    /// `expires_at` in the past: backing bytes first, then metadata.
    ///
    /// Each artifact is independent — a failure on one is logged and
    /// does not abort the rest. Re-running against an already-cleaned
    /// set is a no-op. Returns the number of artifacts removed.
    pub async fn sweep(&self) -> Result<u64> {
        let expired = self.db.list_expired(Utc::now()).await?;
        let mut deleted = 0u64;

        for artifact in expired {
            if let Err(e) = self.store.delete(&artifact.storage_locator).await {
                tracing::warn!(
                    artifact_id = %artifact.id,
                    error = %e,
                    "failed to delete expired artifact bytes, skipping"
                );
                continue;
            }
            match self.db.delete_artifact(&artifact.id).await {
                Ok(_) => {
                    tracing::info!(artifact_id = %artifact.id, "expired artifact reaped");
                    deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        artifact_id = %artifact.id,
                        error = %e,
                        "failed to delete expired artifact metadata, skipping"
                    );
                }
            }
        }

        Ok(deleted)
    }

    /// Run the sweep on a fixed interval until shutdown is signalled.
    pub async fn run(self, period: Duration, mut shutdown_rx: watch::Receiver<()>) {
        let mut interval_timer = tokio::time::interval(period);
        interval_timer.tick().await; // Skip first immediate tick

        tracing::info!(period_secs = period.as_secs(), "expiry reaper started");

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    match self.sweep().await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!(deleted = n, "expiry sweep finished"),
                        Err(e) => tracing::error!(error = %e, "expiry sweep failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("expiry reaper shutting down");
                    break;
                }
            }
        }
    }
}
