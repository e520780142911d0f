//! Error types for the vault service.

use strongroom_core::crypto::{CodecError, KeyError, PasswordError};
use strongroom_core::DenyReason;

/// Errors that can occur when working with the vault.
///
/// `Denied` covers the expected, user-facing outcomes; the remaining
/// variants are infrastructure failures that callers surface as a
/// generic server failure. Audit write failures never appear here at
/// all: the audit log swallows them.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The retrieval or mutation was denied by policy
    #[error("access denied: {0}")]
    Denied(DenyReason),

    /// The encrypted container is truncated or corrupt
    #[error("malformed encrypted container")]
    MalformedContainer,

    /// Object storage error
    #[error("object storage error: {0}")]
    Storage(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Password hashing error
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// Master key error
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

impl From<CodecError> for VaultError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::MalformedContainer => VaultError::MalformedContainer,
            CodecError::Io(e) => VaultError::Io(e),
        }
    }
}

impl VaultError {
    /// Whether this error is an expected policy denial rather than an
    /// infrastructure failure.
    pub fn is_denial(&self) -> bool {
        matches!(self, VaultError::Denied(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            VaultError::Denied(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
