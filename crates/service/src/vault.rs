//! The vault facade: upload, retrieval orchestration, policy updates,
//! deletion, and the expiry sweep entry point.
//!
//! Retrieval composes the policy evaluator, the artifact store, the
//! audit log, and a per-request temporary file whose lifetime is tied
//! to the returned handle — cleanup is scoped acquisition/release, not
//! best-effort.

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use uuid::Uuid;

use strongroom_core::crypto::{decrypt_stream, hash_password};
use strongroom_core::policy;
use strongroom_core::types::{AccessLogEntry, AccessPolicy, Artifact, RequestContext};
use strongroom_core::{DenyReason, Verdict};

use crate::audit::AuditLog;
use crate::database::Database;
use crate::error::{Result, VaultError};
use crate::store::ArtifactStore;

/// Deny-reason marker for infrastructure failures that happen after the
/// policy allowed the request; distinct from any policy denial so a
/// storage fault can never read as a successful or policy-denied
/// download in the trail.
pub const STORAGE_FAILURE_MARKER: &str = "storage_error";

/// How a retrieval addresses an artifact.
#[derive(Debug, Clone)]
pub enum ArtifactRef {
    Id(Uuid),
    PublicToken(String),
}

impl ArtifactRef {
    /// The stand-in name an unresolved reference leaves in the audit
    /// trail. Only a short token prefix is recorded: a near-miss or
    /// revoked token must not be recoverable from the log.
    fn as_log_name(&self) -> String {
        match self {
            ArtifactRef::Id(id) => id.to_string(),
            ArtifactRef::PublicToken(token) => {
                let prefix: String = token.chars().take(8).collect();
                format!("token:{prefix}..")
            }
        }
    }
}

/// Metadata accompanying an upload. The stream arrives already
/// validated; the engine does not parse HTTP multipart itself.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub display_name: String,
    pub mime_type: String,
}

/// Policy options applied at upload time.
#[derive(Debug, Clone, Default)]
pub struct PolicyOptions {
    pub shared_with: Vec<String>,
    pub public: bool,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_delete: bool,
    pub max_downloads: Option<i64>,
}

/// Field-level policy changes. The outer `Option` means "leave alone";
/// the inner one distinguishes set from clear.
#[derive(Debug, Clone, Default)]
pub struct PolicyChanges {
    pub shared_with: Option<Vec<String>>,
    pub public: Option<bool>,
    pub password: Option<Option<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub auto_delete: Option<bool>,
    pub max_downloads: Option<Option<i64>>,
}

/// What an upload returns to the caller.
#[derive(Debug, Clone)]
pub struct ArtifactSummary {
    pub id: Uuid,
    pub public_token: Option<String>,
}

/// Owner-facing view of the current policy.
#[derive(Debug, Clone)]
pub struct PolicySummary {
    pub shared_with: Vec<String>,
    pub is_public: bool,
    pub public_token: Option<String>,
    pub requires_password: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_delete: bool,
    pub max_downloads: Option<i64>,
    pub download_count: i64,
}

impl From<&AccessPolicy> for PolicySummary {
    fn from(policy: &AccessPolicy) -> Self {
        Self {
            shared_with: policy.shared_with.clone(),
            is_public: policy.is_public,
            public_token: policy.public_token.clone(),
            requires_password: policy.requires_password,
            expires_at: policy.expires_at,
            auto_delete: policy.auto_delete,
            max_downloads: policy.max_downloads,
            download_count: policy.download_count,
        }
    }
}

/// A successfully served download.
///
/// Reads plaintext from a per-request temporary file; the file is
/// removed when the handle drops, whether the caller streamed it to
/// completion or disconnected mid-way.
#[derive(Debug)]
pub struct RetrievedFile {
    pub display_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    file: tokio::fs::File,
    _temp: NamedTempFile,
}

impl AsyncRead for RetrievedFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

/// The encrypted storage and access-control engine.
#[derive(Debug, Clone)]
pub struct Vault {
    db: Database,
    store: ArtifactStore,
    audit: AuditLog,
}

impl Vault {
    pub fn new(db: Database, store: ArtifactStore, audit: AuditLog) -> Self {
        Self { db, store, audit }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Encrypt and persist an uploaded stream, then create its metadata
    /// record. The bytes land first; if the metadata insert fails the
    /// stored object is rolled back so the two stay atomic.
    pub async fn create_artifact<R>(
        &self,
        owner_id: &str,
        reader: R,
        meta: UploadMeta,
        opts: PolicyOptions,
    ) -> Result<ArtifactSummary>
    where
        R: AsyncRead + Unpin,
    {
        let id = Uuid::new_v4();
        let (locator, size) = self.store.put(&id, reader).await?;

        let public_token = opts.public.then(generate_public_token);
        let password_hash = match &opts.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let artifact = Artifact {
            id,
            owner_id: owner_id.to_string(),
            display_name: meta.display_name,
            size_bytes: size as i64,
            mime_type: meta.mime_type,
            storage_locator: locator.clone(),
            created_at: Utc::now(),
            policy: AccessPolicy {
                shared_with: dedup(opts.shared_with),
                is_public: opts.public,
                public_token: public_token.clone(),
                requires_password: opts.password.is_some(),
                password_hash,
                expires_at: opts.expires_at,
                auto_delete: opts.auto_delete,
                max_downloads: opts.max_downloads,
                download_count: 0,
            },
        };

        if let Err(e) = self.db.insert_artifact(&artifact).await {
            let _ = self.store.delete(&locator).await;
            return Err(e);
        }

        tracing::info!(artifact_id = %id, owner = %owner_id, size, "artifact created");
        Ok(ArtifactSummary { id, public_token })
    }

    /// Serve one download end-to-end.
    ///
    /// Every attempt — allowed or not — leaves exactly one audit entry.
    /// The download counter advances exactly once per served download,
    /// via an atomic increment against the persisted record.
    pub async fn retrieve(
        &self,
        file_ref: ArtifactRef,
        ctx: &RequestContext,
    ) -> Result<RetrievedFile> {
        // when addressed by token, the token doubles as the supplied
        // credential for the evaluator
        let mut ctx = ctx.clone();
        if let ArtifactRef::PublicToken(token) = &file_ref {
            if ctx.public_token.is_none() {
                ctx.public_token = Some(token.clone());
            }
        }

        let artifact = match &file_ref {
            ArtifactRef::Id(id) => self.db.get_artifact(id).await?,
            ArtifactRef::PublicToken(token) => {
                self.db.get_artifact_by_public_token(token).await?
            }
        };
        let Some(artifact) = artifact else {
            self.audit
                .append(AccessLogEntry::unresolved(&file_ref.as_log_name(), &ctx))
                .await;
            return Err(VaultError::Denied(DenyReason::NotFound));
        };

        let method = match policy::evaluate(&artifact, &ctx, Utc::now()) {
            Verdict::Allow { method } => method,
            Verdict::Deny { reason } => {
                self.audit
                    .append(AccessLogEntry::failure(&artifact, &ctx, reason.as_code()))
                    .await;
                tracing::debug!(
                    artifact_id = %artifact.id,
                    reason = reason.as_code(),
                    "retrieval denied"
                );
                return Err(VaultError::Denied(reason));
            }
        };

        // storage or container faults after the allow are a second,
        // distinct failure class: logged as a failed attempt, never as
        // a success
        let retrieved = match self.decrypt_to_temp(&artifact).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                tracing::error!(
                    artifact_id = %artifact.id,
                    error = %e,
                    "storage failure while serving allowed retrieval"
                );
                self.audit
                    .append(AccessLogEntry::failure(&artifact, &ctx, STORAGE_FAILURE_MARKER))
                    .await;
                return Err(e);
            }
        };

        match self.db.increment_download_count(&artifact.id).await {
            Ok(Some(count)) => {
                tracing::debug!(artifact_id = %artifact.id, download_count = count, "artifact served");
            }
            Ok(None) => {
                // deleted between the allow and the increment
                self.audit
                    .append(AccessLogEntry::unresolved(&file_ref.as_log_name(), &ctx))
                    .await;
                return Err(VaultError::Denied(DenyReason::NotFound));
            }
            Err(e) => {
                tracing::error!(artifact_id = %artifact.id, error = %e, "download counter update failed");
                self.audit
                    .append(AccessLogEntry::failure(&artifact, &ctx, STORAGE_FAILURE_MARKER))
                    .await;
                return Err(e);
            }
        }

        self.audit
            .append(AccessLogEntry::success(&artifact, &ctx, method))
            .await;

        Ok(retrieved)
    }

    /// Decrypt the artifact's container into a temporary file unique to
    /// this request, so concurrent downloads of one artifact never
    /// collide.
    async fn decrypt_to_temp(&self, artifact: &Artifact) -> Result<RetrievedFile> {
        let ciphertext = self.store.open_for_read(&artifact.storage_locator).await?;

        let temp = NamedTempFile::new()?;
        let mut out = tokio::fs::File::from_std(temp.reopen()?);
        let size = decrypt_stream(self.store.key(), ciphertext, &mut out).await?;
        out.flush().await?;

        let file = tokio::fs::File::from_std(temp.reopen()?);
        Ok(RetrievedFile {
            display_name: artifact.display_name.clone(),
            mime_type: artifact.mime_type.clone(),
            size_bytes: size,
            file,
            _temp: temp,
        })
    }

    /// Apply owner-controlled policy changes, field by field.
    ///
    /// Enabling the public link mints a fresh token; disabling clears it,
    /// after which requests bearing the old token resolve to `NotFound`.
    pub async fn update_policy(
        &self,
        id: &Uuid,
        owner_id: &str,
        changes: PolicyChanges,
    ) -> Result<PolicySummary> {
        let artifact = self
            .db
            .get_artifact(id)
            .await?
            .ok_or(VaultError::Denied(DenyReason::NotFound))?;
        if artifact.owner_id != owner_id {
            return Err(VaultError::Denied(DenyReason::Unauthorized));
        }

        if let Some(shared_with) = changes.shared_with {
            self.db.set_shared_with(id, &dedup(shared_with)).await?;
        }
        if let Some(public) = changes.public {
            let token = public.then(generate_public_token);
            self.db.set_public_token(id, token.as_deref()).await?;
        }
        if let Some(password) = changes.password {
            let hash = match &password {
                Some(password) => Some(hash_password(password)?),
                None => None,
            };
            self.db.set_password_hash(id, hash.as_deref()).await?;
        }
        if let Some(expires_at) = changes.expires_at {
            self.db.set_expires_at(id, expires_at).await?;
        }
        if let Some(auto_delete) = changes.auto_delete {
            self.db.set_auto_delete(id, auto_delete).await?;
        }
        if let Some(max_downloads) = changes.max_downloads {
            self.db.set_max_downloads(id, max_downloads).await?;
        }

        let updated = self
            .db
            .get_artifact(id)
            .await?
            .ok_or(VaultError::Denied(DenyReason::NotFound))?;
        tracing::info!(artifact_id = %id, "access policy updated");
        Ok(PolicySummary::from(&updated.policy))
    }

    /// Delete an artifact: backing bytes first (idempotent), then the
    /// metadata record. Audit entries survive with their name snapshot.
    pub async fn delete_artifact(&self, id: &Uuid, owner_id: &str) -> Result<()> {
        let artifact = self
            .db
            .get_artifact(id)
            .await?
            .ok_or(VaultError::Denied(DenyReason::NotFound))?;
        if artifact.owner_id != owner_id {
            return Err(VaultError::Denied(DenyReason::Unauthorized));
        }

        self.store.delete(&artifact.storage_locator).await?;
        self.db.delete_artifact(id).await?;
        tracing::info!(artifact_id = %id, owner = %owner_id, "artifact deleted");
        Ok(())
    }
}

/// Mint an opaque unguessable public-link token.
fn generate_public_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn dedup(mut users: Vec<String>) -> Vec<String> {
    users.sort();
    users.dedup();
    users
}
