//! Denial reasons shared by the policy evaluator and the service layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a retrieval attempt was denied.
///
/// Each reason carries a stable machine-readable code that is safe to
/// return to callers; detailed diagnostics stay in operational logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The artifact (or public token) did not resolve. Also returned for
    /// public-token mismatches so that token probing cannot distinguish
    /// "wrong token" from "no such artifact".
    NotFound,
    /// An authenticated identity was presented but holds no grant.
    Unauthorized,
    /// The artifact requires a password and none was supplied.
    PasswordRequired,
    /// The supplied password did not verify.
    PasswordInvalid,
    /// The `max_downloads` ceiling has been reached.
    QuotaExceeded,
    /// The artifact's `expires_at` has passed.
    Expired,
}

impl DenyReason {
    /// Stable wire code for this reason.
    pub fn as_code(&self) -> &'static str {
        match self {
            DenyReason::NotFound => "not_found",
            DenyReason::Unauthorized => "unauthorized",
            DenyReason::PasswordRequired => "password_required",
            DenyReason::PasswordInvalid => "password_invalid",
            DenyReason::QuotaExceeded => "quota_exceeded",
            DenyReason::Expired => "expired",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}
