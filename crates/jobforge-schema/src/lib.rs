// jobforge-schema/src/lib.rs
// ============================================================================
// Module: JobForge Schema Registry
// Description: Single source of truth for accepted envelope/bundle shapes.
// Purpose: Validate job payloads, event envelopes, template inputs/outputs,
//          and manifests against versioned JSON schemas, returning
//          human-readable per-path error messages.
// Dependencies: jsonschema, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The registry holds one compiled [`jsonschema::Validator`] per
//! `(name, version)` pair. Validation is the sole boundary check in the
//! execution plane - once a value passes, downstream components trust it.
//! Unknown top-level fields are rejected by default; schemas that embed an
//! opaque `payload`/`metadata` object should mark that subtree
//! `"additionalProperties": true` themselves, since the registry applies no
//! implicit leniency beyond what a schema states.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use jsonschema::Draft;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while registering or validating against schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document itself failed to compile.
    #[error("schema {name} v{version} failed to compile: {reason}")]
    InvalidSchema {
        /// Registered schema name.
        name: String,
        /// Registered schema version.
        version: u32,
        /// Compiler-reported reason.
        reason: String,
    },
    /// No schema is registered for the requested `(name, version)`.
    #[error("no schema registered for {name} v{version}")]
    NotRegistered {
        /// Requested schema name.
        name: String,
        /// Requested schema version.
        version: u32,
    },
}

/// A validation failure: the offending value did not satisfy its schema.
///
/// # Invariants
/// - `errors` is never empty.
#[derive(Debug, Error)]
#[error("validation failed: {}", errors.join("; "))]
pub struct ValidationFailure {
    /// Human-readable messages, each naming the offending JSON path.
    pub errors: Vec<String>,
}

// ============================================================================
// SECTION: Schema Key
// ============================================================================

/// Identifies a registered schema by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SchemaKey {
    name: String,
    version: u32,
}

// ============================================================================
// SECTION: Schema Registry
// ============================================================================

/// Holds compiled schemas keyed by `(name, version)`.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaKey, Validator>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Compiles and registers a schema under `(name, version)`, replacing
    /// any prior registration for the same key.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidSchema`] when `schema` does not compile
    /// under JSON Schema Draft 2020-12.
    pub fn register(&mut self, name: &str, version: u32, schema: &Value) -> Result<(), SchemaError> {
        let compiled = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
            .map_err(|err| SchemaError::InvalidSchema {
                name: name.to_string(),
                version,
                reason: err.to_string(),
            })?;
        self.schemas.insert(
            SchemaKey {
                name: name.to_string(),
                version,
            },
            compiled,
        );
        Ok(())
    }

    /// Returns whether a schema is registered for `(name, version)`.
    #[must_use]
    pub fn contains(&self, name: &str, version: u32) -> bool {
        self.schemas.contains_key(&SchemaKey {
            name: name.to_string(),
            version,
        })
    }

    /// Validates `value` against the registered `(name, version)` schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotRegistered`] when no such schema is
    /// registered. Validation failures are not errors: they are reported
    /// via the returned [`ValidationOutcome`].
    pub fn validate(&self, name: &str, version: u32, value: &Value) -> Result<ValidationOutcome, SchemaError> {
        let key = SchemaKey {
            name: name.to_string(),
            version,
        };
        let Some(schema) = self.schemas.get(&key) else {
            return Err(SchemaError::NotRegistered {
                name: name.to_string(),
                version,
            });
        };
        let errors: Vec<String> = schema
            .iter_errors(value)
            .map(|err| format!("{}: {}", err.instance_path, err))
            .collect();
        Ok(if errors.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(ValidationFailure {
                errors,
            })
        })
    }
}

/// Result of validating a single value against a registered schema.
#[derive(Debug)]
pub enum ValidationOutcome {
    /// The value satisfied the schema.
    Valid,
    /// The value failed validation; see the carried messages.
    Invalid(ValidationFailure),
}

impl ValidationOutcome {
    /// Returns whether this outcome is [`ValidationOutcome::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SchemaRegistry;
    use super::ValidationOutcome;

    #[test]
    fn registers_and_validates_a_schema() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("job.echo", 1, &json!({"type": "object", "required": ["v"]}))
            .expect("register");
        let outcome = registry.validate("job.echo", 1, &json!({"v": 1})).expect("validate");
        assert!(outcome.is_valid());
    }

    #[test]
    fn reports_path_qualified_errors() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("job.echo", 1, &json!({"type": "object", "required": ["v"]}))
            .expect("register");
        let outcome = registry.validate("job.echo", 1, &json!({})).expect("validate");
        match outcome {
            ValidationOutcome::Invalid(failure) => assert!(!failure.errors.is_empty()),
            ValidationOutcome::Valid => panic!("expected invalid outcome"),
        }
    }

    #[test]
    fn unregistered_schema_is_an_error() {
        let registry = SchemaRegistry::new();
        let result = registry.validate("missing", 1, &json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn reregistering_same_key_replaces_schema() {
        let mut registry = SchemaRegistry::new();
        registry.register("t", 1, &json!({"type": "object"})).expect("register");
        registry
            .register("t", 1, &json!({"type": "object", "required": ["x"]}))
            .expect("register");
        let outcome = registry.validate("t", 1, &json!({})).expect("validate");
        assert!(!outcome.is_valid());
    }
}
