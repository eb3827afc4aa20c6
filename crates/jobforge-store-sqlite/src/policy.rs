// jobforge-store-sqlite/src/policy.rs
// ============================================================================
// Module: SQLite Policy Token Store
// Description: The capability token table guarding action-class jobs.
// Purpose: Implement jobforge_core::store::PolicyTokenStore against a single
//          SQLite connection.
// Dependencies: jobforge-core, rusqlite, subtle
// ============================================================================

//! ## Overview
//! Only a token's SHA-256 digest is persisted, never the raw bytes - the
//! store is a capability verifier, not a vault. Lookups hash the presented
//! bytes and match on digest; the final digest comparison runs through
//! [`subtle::ConstantTimeEq`] so a timing side-channel cannot help an
//! attacker narrow down a valid token byte-by-byte. `mark_consumed` is a
//! no-op for tokens with `single_use = false`: reusable tokens never carry
//! a `consumed_at`, so repeated validation against them never conflicts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use jobforge_core::PolicyToken;
use jobforge_core::PolicyTokenStore;
use jobforge_core::TenantId;
use jobforge_core::Timestamp;
use jobforge_core::canon::HashAlgorithm;
use jobforge_core::canon::hash_bytes;
use jobforge_core::error::ApiError;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`PolicyTokenStore`].
#[derive(Clone)]
pub struct SqlitePolicyTokenStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePolicyTokenStore {
    /// Wraps a shared connection.
    #[must_use]
    pub const fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    /// Locks the shared connection, converting a poisoned mutex into an
    /// internal error rather than panicking.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApiError> {
        self.connection
            .lock()
            .map_err(|_| ApiError::internal("policy token store connection mutex poisoned"))
    }
}

/// Returns the lowercase hex SHA-256 digest of `token_bytes`.
fn digest_hex(token_bytes: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, token_bytes).value
}

impl PolicyTokenStore for SqlitePolicyTokenStore {
    fn issue_token(&self, token: PolicyToken) -> Result<(), ApiError> {
        let guard = self.lock()?;
        let token_hash = digest_hex(&token.token);
        let scopes_text = serde_json::to_string(&token.scopes).map_err(|err| ApiError::internal(err.to_string()))?;
        let consumed_at_text = token
            .consumed_at
            .map(Timestamp::to_rfc3339)
            .transpose()
            .map_err(|err| ApiError::internal(err.to_string()))?;

        guard
            .execute(
                "INSERT INTO policy_tokens (
                    token_hash, tenant_id, scopes, issued_at, expires_at, single_use, consumed_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    token_hash,
                    token.tenant_id.as_str(),
                    scopes_text,
                    token.issued_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                    token.expires_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                    token.single_use,
                    consumed_at_text,
                ],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn get_token(&self, token_bytes: &[u8]) -> Result<PolicyToken, ApiError> {
        let guard = self.lock()?;
        let token_hash = digest_hex(token_bytes);

        let row = guard
            .query_row(
                "SELECT token_hash, tenant_id, scopes, issued_at, expires_at, single_use, consumed_at
                 FROM policy_tokens WHERE token_hash = ?1",
                params![token_hash],
                |row| {
                    let stored_hash: String = row.get(0)?;
                    let tenant_id: String = row.get(1)?;
                    let scopes: String = row.get(2)?;
                    let issued_at: String = row.get(3)?;
                    let expires_at: String = row.get(4)?;
                    let single_use: bool = row.get(5)?;
                    let consumed_at: Option<String> = row.get(6)?;
                    Ok((stored_hash, tenant_id, scopes, issued_at, expires_at, single_use, consumed_at))
                },
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("policy token not found"))?;

        let (stored_hash, tenant_id, scopes, issued_at, expires_at, single_use, consumed_at) = row;
        if stored_hash.as_bytes().ct_eq(token_hash.as_bytes()).unwrap_u8() != 1 {
            return Err(ApiError::not_found("policy token not found"));
        }

        Ok(PolicyToken {
            token: token_bytes.to_vec(),
            tenant_id: TenantId::new(tenant_id),
            scopes: serde_json::from_str(&scopes).unwrap_or_default(),
            issued_at: Timestamp::parse_rfc3339(&issued_at).unwrap_or_else(|_| Timestamp::now()),
            expires_at: Timestamp::parse_rfc3339(&expires_at).unwrap_or_else(|_| Timestamp::now()),
            single_use,
            consumed_at: consumed_at.and_then(|text| Timestamp::parse_rfc3339(&text).ok()),
        })
    }

    fn mark_consumed(&self, token_bytes: &[u8], consumed_at: Timestamp) -> Result<(), ApiError> {
        let guard = self.lock()?;
        let token_hash = digest_hex(token_bytes);

        let (single_use, already_consumed): (bool, Option<String>) = guard
            .query_row(
                "SELECT single_use, consumed_at FROM policy_tokens WHERE token_hash = ?1",
                params![token_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("policy token not found"))?;

        if !single_use {
            return Ok(());
        }

        if already_consumed.is_some() {
            return Err(ApiError::conflict("policy token already consumed"));
        }

        let consumed_text = consumed_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        guard
            .execute(
                "UPDATE policy_tokens SET consumed_at = ?1 WHERE token_hash = ?2",
                params![consumed_text, token_hash],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use jobforge_core::PolicyToken;
    use jobforge_core::PolicyTokenStore;
    use jobforge_core::TenantId;
    use jobforge_core::Timestamp;

    use super::SqlitePolicyTokenStore;
    use crate::conn::open_in_memory;

    fn store() -> SqlitePolicyTokenStore {
        let connection = open_in_memory().expect("open in-memory store");
        SqlitePolicyTokenStore::new(Arc::new(Mutex::new(connection)))
    }

    fn sample_token() -> PolicyToken {
        let now = Timestamp::now();
        PolicyToken {
            token: b"secret-token-bytes".to_vec(),
            tenant_id: TenantId::new("acme"),
            scopes: vec!["autopilot.ops.apply".to_string()],
            issued_at: now,
            expires_at: now.plus_millis(60_000),
            single_use: true,
            consumed_at: None,
        }
    }

    #[test]
    fn issue_then_get_round_trips() {
        let store = store();
        let token = sample_token();
        store.issue_token(token.clone()).expect("issue");
        let fetched = store.get_token(&token.token).expect("get");
        assert_eq!(fetched.tenant_id, token.tenant_id);
        assert!(fetched.consumed_at.is_none());
    }

    #[test]
    fn get_unknown_token_is_not_found() {
        let store = store();
        assert!(store.get_token(b"nonexistent").is_err());
    }

    #[test]
    fn mark_consumed_then_mark_consumed_again_conflicts() {
        let store = store();
        let token = sample_token();
        store.issue_token(token.clone()).expect("issue");
        store.mark_consumed(&token.token, Timestamp::now()).expect("consume");
        let result = store.mark_consumed(&token.token, Timestamp::now());
        assert!(result.is_err());
    }

    #[test]
    fn consumed_token_is_reflected_on_get() {
        let store = store();
        let token = sample_token();
        store.issue_token(token.clone()).expect("issue");
        store.mark_consumed(&token.token, Timestamp::now()).expect("consume");
        let fetched = store.get_token(&token.token).expect("get");
        assert!(fetched.consumed_at.is_some());
    }

    #[test]
    fn mark_consumed_on_reusable_token_is_a_no_op() {
        let store = store();
        let mut token = sample_token();
        token.single_use = false;
        store.issue_token(token.clone()).expect("issue");
        store.mark_consumed(&token.token, Timestamp::now()).expect("first consume attempt");
        store.mark_consumed(&token.token, Timestamp::now()).expect("second consume attempt");
        let fetched = store.get_token(&token.token).expect("get");
        assert!(fetched.consumed_at.is_none());
    }
}
