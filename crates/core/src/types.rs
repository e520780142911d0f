//! Domain types shared between the evaluator and the service layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored encrypted file and its policy metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub owner_id: String,
    pub display_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    /// Opaque reference to the encrypted bytes in the artifact store.
    pub storage_locator: String,
    pub created_at: DateTime<Utc>,
    pub policy: AccessPolicy,
}

/// Owner-controlled access policy embedded in an artifact.
///
/// Invariants: `public_token` is present iff `is_public`; `password_hash`
/// is present iff `requires_password`; `download_count` never decreases
/// and is incremented exactly once per successfully served download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// User identifiers granted authenticated access.
    pub shared_with: Vec<String>,
    pub is_public: bool,
    /// Opaque unguessable string, present iff a public link is active.
    pub public_token: Option<String>,
    pub requires_password: bool,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Consumed by the expiry reaper.
    pub auto_delete: bool,
    pub max_downloads: Option<i64>,
    pub download_count: i64,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            shared_with: Vec::new(),
            is_public: false,
            public_token: None,
            requires_password: false,
            password_hash: None,
            expires_at: None,
            auto_delete: false,
            max_downloads: None,
            download_count: 0,
        }
    }
}

impl AccessPolicy {
    pub fn is_shared_with(&self, user_id: &str) -> bool {
        self.shared_with.iter().any(|u| u == user_id)
    }
}

/// The credentials a retrieval request arrives with.
///
/// Identity is resolved by the caller (the identity provider is outside
/// the engine); `location` is a pre-resolved opaque string for the
/// audit trail.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub public_token: Option<String>,
    pub source_addr: String,
    pub location: Option<String>,
}

/// How a request was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMethod {
    Authenticated,
    Public,
}

impl AccessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::Authenticated => "authenticated",
            AccessMethod::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "public" => AccessMethod::Public,
            _ => AccessMethod::Authenticated,
        }
    }
}

/// Outcome of a retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fail,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Fail => "fail",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Outcome::Success,
            _ => Outcome::Fail,
        }
    }
}

/// Immutable record of one retrieval attempt.
///
/// The artifact reference is weak: `artifact_name` is a snapshot kept so
/// log integrity survives artifact deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub artifact_id: Option<Uuid>,
    pub artifact_name: String,
    pub user_id: Option<String>,
    pub source_addr: String,
    pub location: Option<String>,
    pub method: AccessMethod,
    pub outcome: Outcome,
    pub deny_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AccessLogEntry {
    /// Entry for a successfully served download.
    pub fn success(artifact: &Artifact, ctx: &RequestContext, method: AccessMethod) -> Self {
        Self {
            artifact_id: Some(artifact.id),
            artifact_name: artifact.display_name.clone(),
            user_id: ctx.user_id.clone(),
            source_addr: ctx.source_addr.clone(),
            location: ctx.location.clone(),
            method,
            outcome: Outcome::Success,
            deny_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Entry for a denied or failed attempt against a resolved artifact.
    pub fn failure(artifact: &Artifact, ctx: &RequestContext, reason: &str) -> Self {
        Self {
            artifact_id: Some(artifact.id),
            artifact_name: artifact.display_name.clone(),
            user_id: ctx.user_id.clone(),
            source_addr: ctx.source_addr.clone(),
            location: ctx.location.clone(),
            method: derive_method(ctx),
            outcome: Outcome::Fail,
            deny_reason: Some(reason.to_string()),
            created_at: Utc::now(),
        }
    }

    /// Entry for an attempt whose reference never resolved; the
    /// requested reference stands in for the name snapshot.
    pub fn unresolved(requested: &str, ctx: &RequestContext) -> Self {
        Self {
            artifact_id: None,
            artifact_name: requested.to_string(),
            user_id: ctx.user_id.clone(),
            source_addr: ctx.source_addr.clone(),
            location: ctx.location.clone(),
            method: derive_method(ctx),
            outcome: Outcome::Fail,
            deny_reason: Some(crate::DenyReason::NotFound.as_code().to_string()),
            created_at: Utc::now(),
        }
    }
}

fn derive_method(ctx: &RequestContext) -> AccessMethod {
    if ctx.user_id.is_some() {
        AccessMethod::Authenticated
    } else {
        AccessMethod::Public
    }
}
