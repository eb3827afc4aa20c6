// jobforge-policy/src/gate.rs
// ============================================================================
// Module: Policy Gate
// Description: Validates capability tokens guarding action-class jobs.
// Purpose: Implement ValidatePolicyToken - reject on not-found, wrong
//          tenant, expired, scope mismatch, or already-consumed, and
//          atomically consume single-use tokens on success.
// Dependencies: jobforge-core (error, ids, policy, store, time), subtle
// ============================================================================

//! ## Overview
//! The store layer (`jobforge-store-sqlite`) already compares the presented
//! token's digest in constant time via `subtle::ConstantTimeEq`, the same
//! primitive the teacher CLI uses for secret comparison - this module adds
//! the tenant/expiry/scope/consumption checks on top. A token is never
//! reused after consumption: [`PolicyTokenStore::mark_consumed`] is the
//! sole mutation and is called only after every other check has passed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jobforge_core::error::ApiError;
use jobforge_core::ids::TenantId;
use jobforge_core::policy::PolicyToken;
use jobforge_core::store::PolicyTokenStore;
use jobforge_core::time::Timestamp;

// ============================================================================
// SECTION: Validate Policy Token
// ============================================================================

/// Validates a presented token against `tenant_id` and `required_scopes`,
/// consuming it if it is single-use.
///
/// # Errors
///
/// Returns [`ApiError::policy_denied`] if the token does not exist, belongs
/// to a different tenant, has expired, does not grant every required scope,
/// or has already been consumed. Returns [`ApiError::internal`] only on
/// storage failure unrelated to the token itself.
pub fn validate_policy_token(
    store: &dyn PolicyTokenStore,
    token_bytes: &[u8],
    tenant_id: &TenantId,
    required_scopes: &[String],
    at: Timestamp,
) -> Result<PolicyToken, ApiError> {
    let token = match store.get_token(token_bytes) {
        Ok(token) => token,
        Err(err) if err.kind == jobforge_core::error::ErrorKind::NotFound => {
            return Err(ApiError::policy_denied("policy token not found"));
        }
        Err(err) => return Err(err),
    };

    if token.tenant_id != *tenant_id {
        return Err(ApiError::policy_denied("policy token does not belong to this tenant"));
    }

    if !token.is_within_validity_window(at) {
        return Err(ApiError::policy_denied("policy token expired"));
    }

    if token.already_consumed() {
        return Err(ApiError::policy_denied("policy token already consumed"));
    }

    if !token.grants_all(required_scopes) {
        return Err(ApiError::policy_denied("policy token does not grant the required scopes"));
    }

    store.mark_consumed(token_bytes, at).map_err(|err| {
        if err.kind == jobforge_core::error::ErrorKind::Conflict {
            ApiError::policy_denied("policy token already consumed")
        } else {
            err
        }
    })?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use jobforge_core::error::ErrorKind;
    use jobforge_core::ids::TenantId;
    use jobforge_core::policy::PolicyToken;
    use jobforge_core::store::PolicyTokenStore;
    use jobforge_core::time::Timestamp;
    use jobforge_store_sqlite::SqliteStore;

    use super::validate_policy_token;

    fn issue(store: &dyn PolicyTokenStore, token: Vec<u8>, single_use: bool) -> Timestamp {
        let now = Timestamp::now();
        store
            .issue_token(PolicyToken {
                token,
                tenant_id: TenantId::new("acme"),
                scopes: vec!["autopilot.ops.apply".to_string()],
                issued_at: now,
                expires_at: now.plus_millis(60_000),
                single_use,
                consumed_at: None,
            })
            .expect("issue");
        now
    }

    #[test]
    fn valid_single_use_token_validates_once_then_is_denied() {
        let backing = SqliteStore::open_in_memory(Default::default()).expect("open");
        let store = backing.policy_tokens();
        let now = issue(&store, b"secret".to_vec(), true);

        let tenant = TenantId::new("acme");
        let scopes = vec!["autopilot.ops.apply".to_string()];
        validate_policy_token(&store, b"secret", &tenant, &scopes, now).expect("first validation succeeds");

        let second = validate_policy_token(&store, b"secret", &tenant, &scopes, now);
        assert_eq!(second.unwrap_err().kind, ErrorKind::PolicyDenied);
    }

    #[test]
    fn wrong_tenant_is_denied() {
        let backing = SqliteStore::open_in_memory(Default::default()).expect("open");
        let store = backing.policy_tokens();
        let now = issue(&store, b"secret".to_vec(), false);

        let other_tenant = TenantId::new("other");
        let scopes = vec!["autopilot.ops.apply".to_string()];
        let result = validate_policy_token(&store, b"secret", &other_tenant, &scopes, now);
        assert_eq!(result.unwrap_err().kind, ErrorKind::PolicyDenied);
    }

    #[test]
    fn missing_scope_is_denied() {
        let backing = SqliteStore::open_in_memory(Default::default()).expect("open");
        let store = backing.policy_tokens();
        let now = issue(&store, b"secret".to_vec(), false);

        let tenant = TenantId::new("acme");
        let scopes = vec!["autopilot.finops.apply".to_string()];
        let result = validate_policy_token(&store, b"secret", &tenant, &scopes, now);
        assert_eq!(result.unwrap_err().kind, ErrorKind::PolicyDenied);
    }

    #[test]
    fn unknown_token_is_denied() {
        let backing = SqliteStore::open_in_memory(Default::default()).expect("open");
        let store = backing.policy_tokens();
        let tenant = TenantId::new("acme");
        let result = validate_policy_token(&store, b"nope", &tenant, &[], Timestamp::now());
        assert_eq!(result.unwrap_err().kind, ErrorKind::PolicyDenied);
    }

    #[test]
    fn expired_token_is_denied() {
        let backing = SqliteStore::open_in_memory(Default::default()).expect("open");
        let store = backing.policy_tokens();
        let now = issue(&store, b"secret".to_vec(), false);
        let tenant = TenantId::new("acme");
        let scopes = vec!["autopilot.ops.apply".to_string()];
        let far_future = now.plus_millis(120_000);
        let result = validate_policy_token(&store, b"secret", &tenant, &scopes, far_future);
        assert_eq!(result.unwrap_err().kind, ErrorKind::PolicyDenied);
    }

    #[test]
    fn reusable_token_validates_repeatedly() {
        let backing = SqliteStore::open_in_memory(Default::default()).expect("open");
        let store = backing.policy_tokens();
        let now = issue(&store, b"secret".to_vec(), false);
        let tenant = TenantId::new("acme");
        let scopes = vec!["autopilot.ops.apply".to_string()];
        validate_policy_token(&store, b"secret", &tenant, &scopes, now).expect("first");
        validate_policy_token(&store, b"secret", &tenant, &scopes, now).expect("second");
    }
}
