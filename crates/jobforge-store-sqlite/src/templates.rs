// jobforge-store-sqlite/src/templates.rs
// ============================================================================
// Module: SQLite Template Registry
// Description: The versioned, named job specification table.
// Purpose: Implement jobforge_core::store::TemplateRegistryStore against a
//          single SQLite connection.
// Dependencies: jobforge-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Templates are loaded once at startup from TOML files (see
//! `jobforge-config`) and written here via [`TemplateRegistryStore::put_template`],
//! then looked up by key on every `RequestJob` call. `put_template` replaces
//! any existing row with the same key rather than versioning in place -
//! template authors bump `version` in the source file when semantics change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use jobforge_core::Template;
use jobforge_core::TemplateRegistryStore;
use jobforge_core::error::ApiError;
use jobforge_core::template::CostTier;
use jobforge_core::template::TemplateCategory;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`TemplateRegistryStore`].
#[derive(Clone)]
pub struct SqliteTemplateStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTemplateStore {
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
            .map_err(|_| ApiError::internal("template store connection mutex poisoned"))
    }
}

/// Returns the stored text label for a [`TemplateCategory`].
fn category_label(category: TemplateCategory) -> &'static str {
    match category {
        TemplateCategory::Ops => "ops",
        TemplateCategory::Support => "support",
        TemplateCategory::Growth => "growth",
        TemplateCategory::Finops => "finops",
        TemplateCategory::Core => "core",
    }
}

/// Parses a stored `category` label, defaulting unrecognized labels to
/// [`TemplateCategory::Ops`].
fn parse_category(label: &str) -> TemplateCategory {
    match label {
        "support" => TemplateCategory::Support,
        "growth" => TemplateCategory::Growth,
        "finops" => TemplateCategory::Finops,
        "core" => TemplateCategory::Core,
        _ => TemplateCategory::Ops,
    }
}

/// Returns the stored text label for a [`CostTier`].
fn cost_tier_label(tier: CostTier) -> &'static str {
    match tier {
        CostTier::Low => "low",
        CostTier::Medium => "medium",
        CostTier::High => "high",
    }
}

/// Parses a stored `estimated_cost_tier` label, defaulting unrecognized
/// labels to [`CostTier::Low`].
fn parse_cost_tier(label: &str) -> CostTier {
    match label {
        "medium" => CostTier::Medium,
        "high" => CostTier::High,
        _ => CostTier::Low,
    }
}

/// Maps a `templates` row into a [`Template`].
fn map_template_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Template> {
    let template_key: String = row.get("template_key")?;
    let version: i32 = row.get("version")?;
    let category: String = row.get("category")?;
    let input_schema: String = row.get("input_schema")?;
    let output_schema: String = row.get("output_schema")?;
    let required_scopes: String = row.get("required_scopes")?;
    let required_connectors: String = row.get("required_connectors")?;
    let estimated_cost_tier: String = row.get("estimated_cost_tier")?;
    let default_max_attempts: i32 = row.get("default_max_attempts")?;
    let default_timeout_ms: i64 = row.get("default_timeout_ms")?;
    let is_action_job: bool = row.get("is_action_job")?;
    let enabled: bool = row.get("enabled")?;

    Ok(Template {
        template_key,
        version,
        category: parse_category(&category),
        input_schema: serde_json::from_str(&input_schema).unwrap_or(Value::Null),
        output_schema: serde_json::from_str(&output_schema).unwrap_or(Value::Null),
        required_scopes: serde_json::from_str(&required_scopes).unwrap_or_default(),
        required_connectors: serde_json::from_str(&required_connectors).unwrap_or_default(),
        estimated_cost_tier: parse_cost_tier(&estimated_cost_tier),
        default_max_attempts,
        default_timeout_ms,
        is_action_job,
        enabled,
    })
}

impl TemplateRegistryStore for SqliteTemplateStore {
    fn get_template(&self, template_key: &str) -> Result<Template, ApiError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT * FROM templates WHERE template_key = ?1",
                params![template_key],
                map_template_row,
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::new(jobforge_core::ErrorKind::TemplateNotFound, "template not registered"))
    }

    fn list_templates(&self) -> Result<Vec<Template>, ApiError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare("SELECT * FROM templates ORDER BY template_key ASC")
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let rows = stmt.query_map([], map_template_row).map_err(|err| ApiError::internal(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| ApiError::internal(err.to_string()))
    }

    fn put_template(&self, template: Template) -> Result<(), ApiError> {
        let guard = self.lock()?;
        let input_schema_text =
            serde_json::to_string(&template.input_schema).map_err(|err| ApiError::validation(err.to_string()))?;
        let output_schema_text =
            serde_json::to_string(&template.output_schema).map_err(|err| ApiError::validation(err.to_string()))?;
        let scopes_text =
            serde_json::to_string(&template.required_scopes).map_err(|err| ApiError::internal(err.to_string()))?;
        let connectors_text = serde_json::to_string(&template.required_connectors)
            .map_err(|err| ApiError::internal(err.to_string()))?;

        guard
            .execute(
                "INSERT INTO templates (
                    template_key, version, category, input_schema, output_schema,
                    required_scopes, required_connectors, estimated_cost_tier,
                    default_max_attempts, default_timeout_ms, is_action_job, enabled
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT (template_key) DO UPDATE SET
                    version = excluded.version,
                    category = excluded.category,
                    input_schema = excluded.input_schema,
                    output_schema = excluded.output_schema,
                    required_scopes = excluded.required_scopes,
                    required_connectors = excluded.required_connectors,
                    estimated_cost_tier = excluded.estimated_cost_tier,
                    default_max_attempts = excluded.default_max_attempts,
                    default_timeout_ms = excluded.default_timeout_ms,
                    is_action_job = excluded.is_action_job,
                    enabled = excluded.enabled",
                params![
                    template.template_key,
                    template.version,
                    category_label(template.category),
                    input_schema_text,
                    output_schema_text,
                    scopes_text,
                    connectors_text,
                    cost_tier_label(template.estimated_cost_tier),
                    template.default_max_attempts,
                    template.default_timeout_ms,
                    template.is_action_job,
                    template.enabled,
                ],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn set_enabled(&self, template_key: &str, enabled: bool) -> Result<(), ApiError> {
        let guard = self.lock()?;
        let affected = guard
            .execute(
                "UPDATE templates SET enabled = ?1 WHERE template_key = ?2",
                params![enabled, template_key],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        if affected == 0 {
            return Err(ApiError::new(jobforge_core::ErrorKind::TemplateNotFound, "template not registered"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use jobforge_core::CostTier;
    use jobforge_core::Template;
    use jobforge_core::TemplateCategory;
    use jobforge_core::TemplateRegistryStore;
    use serde_json::json;

    use super::SqliteTemplateStore;
    use crate::conn::open_in_memory;

    fn sample() -> Template {
        Template {
            template_key: "ops.echo".to_string(),
            version: 1,
            category: TemplateCategory::Ops,
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            required_scopes: vec![],
            required_connectors: vec![],
            estimated_cost_tier: CostTier::Low,
            default_max_attempts: 5,
            default_timeout_ms: 30_000,
            is_action_job: false,
            enabled: true,
        }
    }

    fn store() -> SqliteTemplateStore {
        let connection = open_in_memory().expect("open in-memory store");
        SqliteTemplateStore::new(Arc::new(Mutex::new(connection)))
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = store();
        store.put_template(sample()).expect("put");
        let fetched = store.get_template("ops.echo").expect("get");
        assert_eq!(fetched.version, 1);
    }

    #[test]
    fn put_template_replaces_existing_key() {
        let store = store();
        store.put_template(sample()).expect("put v1");
        let mut updated = sample();
        updated.version = 2;
        store.put_template(updated).expect("put v2");
        let fetched = store.get_template("ops.echo").expect("get");
        assert_eq!(fetched.version, 2);
    }

    #[test]
    fn get_unregistered_template_is_not_found() {
        let store = store();
        assert!(store.get_template("missing").is_err());
    }

    #[test]
    fn set_enabled_toggles_flag() {
        let store = store();
        store.put_template(sample()).expect("put");
        store.set_enabled("ops.echo", false).expect("disable");
        let fetched = store.get_template("ops.echo").expect("get");
        assert!(!fetched.enabled);
    }

    #[test]
    fn set_enabled_on_missing_template_errors() {
        let store = store();
        assert!(store.set_enabled("missing", true).is_err());
    }
}
