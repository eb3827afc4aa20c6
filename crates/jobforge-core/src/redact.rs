// jobforge-core/src/redact.rs
// ============================================================================
// Module: JobForge Redactor
// Description: Denylist-first secret scrubbing over arbitrary nested values.
// Purpose: Prevent secrets and PII from reaching logs, audit entries, or
//          evidence packets.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The redactor walks a [`serde_json::Value`] tree and replaces any leaf
//! whose key fragment matches a denylist (case-insensitive) with a category
//! marker. An optional allowlist makes the policy deny-by-default: any key
//! not present on the allowlist is also redacted. The denylist always wins
//! over the allowlist. Inputs are never mutated; a fresh tree is returned.
//! Security posture: this is the last line of defense before a value is
//! logged, audited, or embedded in an error's `debug` field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default denylist of key fragments considered sensitive.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "password",
    "secret",
    "api_key",
    "token",
    "bearer",
    "credential",
    "private_key",
    "authorization",
    "cookie",
    "credit_card",
    "ssn",
];

/// Default maximum recursion depth before the depth sentinel is applied.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Sentinel applied to values beyond the configured max depth.
pub const DEPTH_LIMIT_MARKER: &str = "[DEPTH_LIMIT]";

/// Default redaction marker for keys with no more specific category.
pub const DEFAULT_MARKER: &str = "[REDACTED]";

// ============================================================================
// SECTION: Marker Categories
// ============================================================================

/// Redaction marker category, chosen by the matched denylist fragment so
/// that logs stay readable about *what kind* of thing was scrubbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerCategory {
    /// Authorization/bearer/credential-shaped secrets.
    Auth,
    /// Cookie values.
    Cookie,
    /// API keys, tokens, private keys.
    Key,
    /// Personally identifying information (SSN, credit card).
    Pii,
    /// No more specific category applies.
    Default,
}

impl MarkerCategory {
    /// Classifies a matched denylist fragment into a marker category.
    #[must_use]
    fn from_fragment(fragment: &str) -> Self {
        match fragment {
            "authorization" | "bearer" | "credential" => Self::Auth,
            "cookie" => Self::Cookie,
            "api_key" | "token" | "secret" | "private_key" | "password" => Self::Key,
            "credit_card" | "ssn" => Self::Pii,
            _ => Self::Default,
        }
    }

    /// Returns the marker string emitted for this category.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Auth => "[REDACTED:auth]",
            Self::Cookie => "[REDACTED:cookie]",
            Self::Key => "[REDACTED:key]",
            Self::Pii => "[REDACTED:pii]",
            Self::Default => DEFAULT_MARKER,
        }
    }
}

/// Returns true when `value` is one of the marker strings this module emits.
#[must_use]
pub fn is_marker(value: &str) -> bool {
    value == DEFAULT_MARKER
        || value == DEPTH_LIMIT_MARKER
        || matches!(
            value,
            "[REDACTED:auth]" | "[REDACTED:cookie]" | "[REDACTED:key]" | "[REDACTED:pii]"
        )
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for a [`Redactor`] instance.
///
/// # Invariants
/// - Denylist fragments are matched case-insensitively against object keys.
/// - When `allowlist` is `Some`, any key absent from it is also redacted,
///   even if it does not match the denylist.
#[derive(Debug, Clone)]
pub struct RedactConfig {
    /// Key fragments that always trigger redaction.
    pub denylist: Vec<String>,
    /// Optional allowlist; when present, keys not in it are also redacted.
    pub allowlist: Option<Vec<String>>,
    /// Maximum recursion depth before the depth sentinel applies.
    pub max_depth: usize,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect(),
            allowlist: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ============================================================================
// SECTION: Redactor
// ============================================================================

/// Redacts sensitive fields from arbitrary nested JSON values.
#[derive(Debug, Clone)]
pub struct Redactor {
    config: RedactConfig,
}

impl Redactor {
    /// Creates a redactor with the given configuration.
    #[must_use]
    pub const fn new(config: RedactConfig) -> Self {
        Self {
            config,
        }
    }

    /// Creates a redactor using [`RedactConfig::default`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RedactConfig::default())
    }

    /// Returns a new value with sensitive fields replaced by redaction
    /// markers. The input is never mutated.
    #[must_use]
    pub fn redact(&self, value: &Value) -> Value {
        self.redact_at_depth(None, value, 0)
    }

    fn redact_at_depth(&self, key: Option<&str>, value: &Value, depth: usize) -> Value {
        if depth > self.config.max_depth {
            return Value::String(DEPTH_LIMIT_MARKER.to_string());
        }

        if let Some(key) = key
            && let Some(category) = self.classify_key(key)
        {
            return Value::String(category.marker().to_string());
        }

        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, inner) in map {
                    out.insert(key.clone(), self.redact_at_depth(Some(key), inner, depth + 1));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.redact_at_depth(key, item, depth + 1))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Returns the marker category that applies to `key`, if any.
    fn classify_key(&self, key: &str) -> Option<MarkerCategory> {
        let lower = key.to_lowercase();
        if let Some(fragment) = self
            .config
            .denylist
            .iter()
            .find(|fragment| lower.contains(fragment.as_str()))
        {
            return Some(MarkerCategory::from_fragment(fragment));
        }
        if let Some(allowlist) = &self.config.allowlist
            && !allowlist.iter().any(|allowed| allowed == key)
        {
            return Some(MarkerCategory::Default);
        }
        None
    }

    /// Walks a (presumably already-redacted) value and returns the JSON
    /// pointer paths of any field whose key matches the denylist but whose
    /// value is not already a redaction marker. An empty result means the
    /// value leaked nothing.
    #[must_use]
    pub fn scan(&self, value: &Value) -> Vec<String> {
        let mut leaks = Vec::new();
        self.scan_at(value, String::new(), &mut leaks);
        leaks
    }

    fn scan_at(&self, value: &Value, pointer: String, leaks: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, inner) in map {
                    let child_pointer = format!("{pointer}/{key}");
                    if self.classify_key(key).is_some() {
                        match inner {
                            Value::String(text) if is_marker(text) => {}
                            _ => leaks.push(child_pointer.clone()),
                        }
                    }
                    self.scan_at(inner, child_pointer, leaks);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.scan_at(item, format!("{pointer}/{index}"), leaks);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Redactor;

    #[test]
    fn redacts_denylisted_keys_at_every_depth() {
        let redactor = Redactor::with_defaults();
        let input = json!({
            "user_id": "u",
            "api_key": "sk-abc",
            "nested": {"token": "t"},
        });
        let redacted = redactor.redact(&input);
        assert_eq!(
            redacted,
            json!({
                "user_id": "u",
                "api_key": "[REDACTED:key]",
                "nested": {"token": "[REDACTED:key]"},
            })
        );
        assert!(redactor.scan(&redacted).is_empty());
    }

    #[test]
    fn recurses_into_array_elements_by_index() {
        let redactor = Redactor::with_defaults();
        let input = json!({"items": [{"password": "p1"}, {"password": "p2"}]});
        let redacted = redactor.redact(&input);
        assert_eq!(
            redacted,
            json!({"items": [{"password": "[REDACTED:key]"}, {"password": "[REDACTED:key]"}]})
        );
    }

    #[test]
    fn denylist_wins_over_allowlist() {
        let mut config = super::RedactConfig::default();
        config.allowlist = Some(vec!["password".to_string()]);
        let redactor = Redactor::new(config);
        let redacted = redactor.redact(&json!({"password": "p"}));
        assert_eq!(redacted, json!({"password": "[REDACTED:key]"}));
    }

    #[test]
    fn allowlist_redacts_unlisted_keys() {
        let mut config = super::RedactConfig::default();
        config.allowlist = Some(vec!["keep".to_string()]);
        let redactor = Redactor::new(config);
        let redacted = redactor.redact(&json!({"keep": "k", "drop": "d"}));
        assert_eq!(redacted, json!({"keep": "k", "drop": "[REDACTED]"}));
    }

    #[test]
    fn depth_limit_applies_sentinel() {
        let mut config = super::RedactConfig::default();
        config.max_depth = 1;
        let redactor = Redactor::new(config);
        let redacted = redactor.redact(&json!({"a": {"b": {"c": 1}}}));
        assert_eq!(redacted, json!({"a": {"b": "[DEPTH_LIMIT]"}}));
    }

    #[test]
    fn idempotent_under_repeated_redaction() {
        let redactor = Redactor::with_defaults();
        let input = json!({"secret": "s", "plain": "p"});
        let once = redactor.redact(&input);
        let twice = redactor.redact(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn scan_flags_leaked_denylisted_values() {
        let redactor = Redactor::with_defaults();
        let unredacted = json!({"token": "leaked"});
        assert_eq!(redactor.scan(&unredacted), vec!["/token".to_string()]);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use serde_json::Value;
    use serde_json::json;

    use super::Redactor;

    fn arb_value() -> impl Strategy<Value = Value> {
        let keys = prop_oneof![
            Just("password".to_string()),
            Just("token".to_string()),
            Just("plain_field".to_string()),
            Just("nested".to_string()),
        ];
        let leaf = any::<String>().prop_map(Value::String);
        (prop::collection::vec((keys, leaf), 0..6)).prop_map(|pairs| {
            let map: serde_json::Map<String, Value> = pairs.into_iter().collect();
            Value::Object(map)
        })
    }

    proptest! {
        #[test]
        fn redact_is_idempotent(value in arb_value()) {
            let redactor = Redactor::with_defaults();
            let once = redactor.redact(&value);
            let twice = redactor.redact(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn scan_of_redacted_output_is_empty(value in arb_value()) {
            let redactor = Redactor::with_defaults();
            let redacted = redactor.redact(&value);
            prop_assert!(redactor.scan(&redacted).is_empty());
        }
    }

    #[test]
    fn sanity_leaf_strategy_produces_objects() {
        // Guards against the proptest strategy regressing into producing
        // non-object roots, which would make the properties above vacuous.
        let redactor = Redactor::with_defaults();
        let redacted = redactor.redact(&json!({"token": "t"}));
        assert!(redacted.is_object());
    }
}
