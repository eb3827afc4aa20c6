// jobforge-core/src/policy.rs
// ============================================================================
// Module: JobForge Policy Token Model
// Description: The capability token row guarding action-class jobs.
// Purpose: Define the shape the policy gate validates and consumes; the
//          gate's validation logic lives in jobforge-policy.
// Dependencies: serde, crate::{ids, time}
// ============================================================================

//! ## Overview
//! A policy token grants a scoped, time-limited capability to request
//! action jobs for a tenant. Single-use tokens are consumed atomically on
//! first successful validation; a consumed token is never valid again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::ids::TenantId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Policy Token
// ============================================================================

/// A capability token presented to unlock an action-class job.
///
/// # Invariants
/// - `single_use = true` implies `consumed_at` is set on or after the
///   token's first successful validation, and never unset thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyToken {
    /// Opaque token bytes, compared in constant time at validation.
    pub token: Vec<u8>,
    /// The tenant this token authorizes.
    pub tenant_id: TenantId,
    /// Scopes this token grants.
    pub scopes: Vec<String>,
    /// When this token was issued.
    pub issued_at: Timestamp,
    /// When this token stops being valid.
    pub expires_at: Timestamp,
    /// Whether this token may be validated successfully only once.
    pub single_use: bool,
    /// When this token was consumed, if ever.
    pub consumed_at: Option<Timestamp>,
}

impl PolicyToken {
    /// Returns whether `at` is within this token's validity window.
    #[must_use]
    pub fn is_within_validity_window(&self, at: Timestamp) -> bool {
        !at.is_before(self.issued_at) && at.is_before(self.expires_at)
    }

    /// Returns whether this token grants every scope in `required`.
    #[must_use]
    pub fn grants_all(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns whether a single-use token has already been consumed.
    #[must_use]
    pub const fn already_consumed(&self) -> bool {
        self.single_use && self.consumed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::PolicyToken;
    use crate::ids::TenantId;
    use crate::time::Timestamp;

    fn sample_token() -> PolicyToken {
        let now = Timestamp::now();
        PolicyToken {
            token: b"secret".to_vec(),
            tenant_id: TenantId::new("acme"),
            scopes: vec!["autopilot.ops.apply".to_string()],
            issued_at: now,
            expires_at: now.plus_millis(60_000),
            single_use: true,
            consumed_at: None,
        }
    }

    #[test]
    fn grants_all_requires_every_required_scope() {
        let token = sample_token();
        assert!(token.grants_all(&["autopilot.ops.apply".to_string()]));
        assert!(!token.grants_all(&["autopilot.finops.apply".to_string()]));
    }

    #[test]
    fn single_use_token_without_consumed_at_is_not_consumed() {
        let token = sample_token();
        assert!(!token.already_consumed());
    }

    #[test]
    fn single_use_token_with_consumed_at_is_consumed() {
        let mut token = sample_token();
        token.consumed_at = Some(Timestamp::now());
        assert!(token.already_consumed());
    }

    #[test]
    fn validity_window_excludes_expiry_instant() {
        let token = sample_token();
        assert!(token.is_within_validity_window(token.issued_at));
        assert!(!token.is_within_validity_window(token.expires_at));
    }
}
