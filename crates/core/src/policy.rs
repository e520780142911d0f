//! The access policy evaluator.
//!
//! One pure function decides every retrieval attempt, so that the
//! password/expiry/quota conditions cannot diverge between call sites.
//! Evaluation follows a single canonical order and short-circuits on
//! the first failing check.

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use crate::crypto::verify_password;
use crate::error::DenyReason;
use crate::types::{AccessMethod, Artifact, RequestContext};

/// The evaluator's decision for one retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow { method: AccessMethod },
    Deny { reason: DenyReason },
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }

    fn deny(reason: DenyReason) -> Self {
        Verdict::Deny { reason }
    }
}

/// Decide whether a request may retrieve an artifact.
///
/// Check order, first failure wins:
/// 1. authorization gate: authenticated path (owner or shared) when an
///    identity is present, public path (active link and matching token)
///    otherwise — a public-path miss is `NotFound`, never `Unauthorized`,
///    so token probing cannot confirm existence
/// 2. quota (`max_downloads` / `download_count`)
/// 3. expiry (`expires_at`)
/// 4. password (`PasswordRequired` when absent, `PasswordInvalid` on
///    mismatch)
///
/// Performs no mutation and no I/O; deterministic given its inputs.
pub fn evaluate(artifact: &Artifact, ctx: &RequestContext, now: DateTime<Utc>) -> Verdict {
    let method = match &ctx.user_id {
        Some(user_id) => {
            if user_id == &artifact.owner_id || artifact.policy.is_shared_with(user_id) {
                AccessMethod::Authenticated
            } else {
                return Verdict::deny(DenyReason::Unauthorized);
            }
        }
        None => {
            if !public_token_matches(artifact, ctx) {
                return Verdict::deny(DenyReason::NotFound);
            }
            AccessMethod::Public
        }
    };

    if let Some(max) = artifact.policy.max_downloads {
        if artifact.policy.download_count >= max {
            return Verdict::deny(DenyReason::QuotaExceeded);
        }
    }

    if let Some(expires_at) = artifact.policy.expires_at {
        if now > expires_at {
            return Verdict::deny(DenyReason::Expired);
        }
    }

    if artifact.policy.requires_password {
        let Some(supplied) = &ctx.password else {
            return Verdict::deny(DenyReason::PasswordRequired);
        };
        let Some(hash) = &artifact.policy.password_hash else {
            // requires_password without a stored hash violates the policy
            // invariant; fail closed
            tracing::warn!(artifact_id = %artifact.id, "password required but no hash stored");
            return Verdict::deny(DenyReason::PasswordInvalid);
        };
        match verify_password(supplied, hash) {
            Ok(true) => {}
            Ok(false) => return Verdict::deny(DenyReason::PasswordInvalid),
            Err(e) => {
                tracing::warn!(artifact_id = %artifact.id, error = %e, "unparseable password hash");
                return Verdict::deny(DenyReason::PasswordInvalid);
            }
        }
    }

    Verdict::Allow { method }
}

/// Constant-time comparison of the supplied token against the active one.
fn public_token_matches(artifact: &Artifact, ctx: &RequestContext) -> bool {
    if !artifact.policy.is_public {
        return false;
    }
    match (&ctx.public_token, &artifact.policy.public_token) {
        (Some(supplied), Some(active)) => supplied
            .as_bytes()
            .ct_eq(active.as_bytes())
            .into(),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::hash_password;
    use crate::types::AccessPolicy;
    use chrono::Duration;
    use uuid::Uuid;

    fn artifact(policy: AccessPolicy) -> Artifact {
        Artifact {
            id: Uuid::new_v4(),
            owner_id: "alice".into(),
            display_name: "report.pdf".into(),
            size_bytes: 10,
            mime_type: "application/pdf".into(),
            storage_locator: "artifacts/test".into(),
            created_at: Utc::now(),
            policy,
        }
    }

    fn user_ctx(user_id: &str) -> RequestContext {
        RequestContext {
            user_id: Some(user_id.into()),
            source_addr: "10.0.0.1".into(),
            ..Default::default()
        }
    }

    fn token_ctx(token: &str) -> RequestContext {
        RequestContext {
            public_token: Some(token.into()),
            source_addr: "10.0.0.1".into(),
            ..Default::default()
        }
    }

    fn deny_reason(verdict: Verdict) -> DenyReason {
        match verdict {
            Verdict::Deny { reason } => reason,
            Verdict::Allow { .. } => panic!("expected deny, got allow"),
        }
    }

    #[test]
    fn test_owner_is_allowed() {
        let a = artifact(AccessPolicy::default());
        let verdict = evaluate(&a, &user_ctx("alice"), Utc::now());
        assert_eq!(
            verdict,
            Verdict::Allow {
                method: AccessMethod::Authenticated
            }
        );
    }

    #[test]
    fn test_shared_user_is_allowed() {
        let a = artifact(AccessPolicy {
            shared_with: vec!["bob".into()],
            ..Default::default()
        });
        assert!(evaluate(&a, &user_ctx("bob"), Utc::now()).is_allow());
    }

    #[test]
    fn test_stranger_is_unauthorized() {
        let a = artifact(AccessPolicy {
            shared_with: vec!["bob".into()],
            ..Default::default()
        });
        let verdict = evaluate(&a, &user_ctx("carol"), Utc::now());
        assert_eq!(deny_reason(verdict), DenyReason::Unauthorized);
    }

    #[test]
    fn test_public_path_with_matching_token() {
        let a = artifact(AccessPolicy {
            is_public: true,
            public_token: Some("tok123".into()),
            ..Default::default()
        });
        let verdict = evaluate(&a, &token_ctx("tok123"), Utc::now());
        assert_eq!(
            verdict,
            Verdict::Allow {
                method: AccessMethod::Public
            }
        );
    }

    #[test]
    fn test_public_path_mismatch_is_not_found() {
        // wrong token must not leak existence via a different error
        let a = artifact(AccessPolicy {
            is_public: true,
            public_token: Some("tok123".into()),
            ..Default::default()
        });
        let verdict = evaluate(&a, &token_ctx("tok124"), Utc::now());
        assert_eq!(deny_reason(verdict), DenyReason::NotFound);
    }

    #[test]
    fn test_token_against_private_artifact_is_not_found() {
        let a = artifact(AccessPolicy::default());
        let verdict = evaluate(&a, &token_ctx("anything"), Utc::now());
        assert_eq!(deny_reason(verdict), DenyReason::NotFound);
    }

    #[test]
    fn test_no_identity_no_token_is_not_found() {
        let a = artifact(AccessPolicy {
            is_public: true,
            public_token: Some("tok123".into()),
            ..Default::default()
        });
        let ctx = RequestContext {
            source_addr: "10.0.0.1".into(),
            ..Default::default()
        };
        assert_eq!(deny_reason(evaluate(&a, &ctx, Utc::now())), DenyReason::NotFound);
    }

    #[test]
    fn test_authenticated_stranger_with_valid_token_is_unauthorized() {
        // the public path applies only when no identity is presented
        let a = artifact(AccessPolicy {
            is_public: true,
            public_token: Some("tok123".into()),
            ..Default::default()
        });
        let mut ctx = user_ctx("carol");
        ctx.public_token = Some("tok123".into());
        assert_eq!(
            deny_reason(evaluate(&a, &ctx, Utc::now())),
            DenyReason::Unauthorized
        );
    }

    #[test]
    fn test_quota_exceeded() {
        let a = artifact(AccessPolicy {
            max_downloads: Some(1),
            download_count: 1,
            ..Default::default()
        });
        assert_eq!(
            deny_reason(evaluate(&a, &user_ctx("alice"), Utc::now())),
            DenyReason::QuotaExceeded
        );
    }

    #[test]
    fn test_expired_even_for_owner() {
        let a = artifact(AccessPolicy {
            expires_at: Some(Utc::now() - Duration::days(1)),
            ..Default::default()
        });
        assert_eq!(
            deny_reason(evaluate(&a, &user_ctx("alice"), Utc::now())),
            DenyReason::Expired
        );
    }

    #[test]
    fn test_not_yet_expired() {
        let a = artifact(AccessPolicy {
            expires_at: Some(Utc::now() + Duration::days(1)),
            ..Default::default()
        });
        assert!(evaluate(&a, &user_ctx("alice"), Utc::now()).is_allow());
    }

    #[test]
    fn test_password_required_then_invalid_then_ok() {
        let a = artifact(AccessPolicy {
            requires_password: true,
            password_hash: Some(hash_password("abcd").unwrap()),
            ..Default::default()
        });

        let mut ctx = user_ctx("alice");
        assert_eq!(
            deny_reason(evaluate(&a, &ctx, Utc::now())),
            DenyReason::PasswordRequired
        );

        ctx.password = Some("abce".into());
        assert_eq!(
            deny_reason(evaluate(&a, &ctx, Utc::now())),
            DenyReason::PasswordInvalid
        );

        ctx.password = Some("abcd".into());
        assert!(evaluate(&a, &ctx, Utc::now()).is_allow());
    }

    #[test]
    fn test_empty_password_matches_empty() {
        let a = artifact(AccessPolicy {
            requires_password: true,
            password_hash: Some(hash_password("").unwrap()),
            ..Default::default()
        });
        let mut ctx = user_ctx("alice");
        ctx.password = Some(String::new());
        assert!(evaluate(&a, &ctx, Utc::now()).is_allow());
    }

    #[test]
    fn test_quota_checked_before_expiry_and_password() {
        // check order is canonical: quota wins over expiry and password
        let a = artifact(AccessPolicy {
            max_downloads: Some(1),
            download_count: 1,
            expires_at: Some(Utc::now() - Duration::days(1)),
            requires_password: true,
            password_hash: Some(hash_password("abcd").unwrap()),
            ..Default::default()
        });
        assert_eq!(
            deny_reason(evaluate(&a, &user_ctx("alice"), Utc::now())),
            DenyReason::QuotaExceeded
        );
    }

    #[test]
    fn test_expiry_checked_before_password() {
        let a = artifact(AccessPolicy {
            expires_at: Some(Utc::now() - Duration::days(1)),
            requires_password: true,
            password_hash: Some(hash_password("abcd").unwrap()),
            ..Default::default()
        });
        assert_eq!(
            deny_reason(evaluate(&a, &user_ctx("alice"), Utc::now())),
            DenyReason::Expired
        );
    }

    #[test]
    fn test_missing_hash_fails_closed() {
        let a = artifact(AccessPolicy {
            requires_password: true,
            password_hash: None,
            ..Default::default()
        });
        let mut ctx = user_ctx("alice");
        ctx.password = Some("anything".into());
        assert_eq!(
            deny_reason(evaluate(&a, &ctx, Utc::now())),
            DenyReason::PasswordInvalid
        );
    }
}
