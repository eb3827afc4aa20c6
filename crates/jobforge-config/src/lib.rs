// jobforge-config/src/lib.rs
// ============================================================================
// Module: JobForge Configuration
// Description: Strict, fail-closed TOML configuration loading.
// Purpose: Load the server's feature flags, queue tunables, and template
//          directory from a single TOML file, validating every value
//          before the process starts serving traffic.
// Dependencies: jobforge-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded once at process init into an immutable
//! [`JobForgeConfig`] value and injected into every component that needs
//! it - there is no global mutable config object. A malformed or
//! out-of-range file fails the process at startup rather than falling back
//! to defaults silently, matching the execution plane's fail-closed
//! posture on anything that controls tenant isolation or policy
//! enforcement. [`load_templates`] separately loads the TOML template
//! definitions under `templates_dir`, which the server registers with the
//! template store at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use jobforge_core::Template;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "jobforge.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "JOBFORGE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Minimum allowed worker lease duration in milliseconds.
pub const MIN_LEASE_DURATION_MS: u64 = 1_000;
/// Maximum allowed worker lease duration in milliseconds.
pub const MAX_LEASE_DURATION_MS: u64 = 3_600_000;
/// Minimum allowed backoff base delay in milliseconds.
pub const MIN_BACKOFF_BASE_MS: u64 = 1;
/// Maximum allowed backoff cap in milliseconds.
pub const MAX_BACKOFF_CAP_MS: u64 = 86_400_000;
/// Minimum allowed per-tenant claim fetch quota.
pub const MIN_CLAIM_FETCH_QUOTA: u32 = 1;
/// Maximum allowed per-tenant claim fetch quota.
pub const MAX_CLAIM_FETCH_QUOTA: u32 = 1_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(String),
    /// The config file was not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// The config parsed but failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Feature Flags
// ============================================================================

/// Immutable, process-wide feature flags. All default to `false`; a
/// disabled feature's endpoints return `feature_disabled`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    /// Whether `SubmitEvent`/`ListEvents` are enabled.
    pub events_enabled: bool,
    /// Whether event-driven triggers may enqueue jobs.
    pub triggers_enabled: bool,
    /// Whether non-action autopilot jobs may be requested.
    pub autopilot_jobs_enabled: bool,
    /// Whether action-class (policy-gated) jobs may be requested.
    pub action_jobs_enabled: bool,
    /// Whether run manifests are recorded.
    pub manifests_enabled: bool,
    /// Whether audit log entries are recorded.
    pub audit_logging_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            events_enabled: false,
            triggers_enabled: false,
            autopilot_jobs_enabled: false,
            action_jobs_enabled: false,
            manifests_enabled: false,
            audit_logging_enabled: false,
        }
    }
}

// ============================================================================
// SECTION: Queue Configuration
// ============================================================================

/// Tunables for the job queue core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Worker lease duration in milliseconds.
    pub lease_duration_ms: u64,
    /// Backoff base delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Backoff cap in milliseconds.
    pub backoff_cap_ms: u64,
    /// Per-tenant fetch quota used by the round-robin claim selector.
    pub claim_fetch_quota: u32,
    /// Default max attempts applied when a caller omits one.
    pub default_max_attempts: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_duration_ms: 60_000,
            backoff_base_ms: 1_000,
            backoff_multiplier: 2.0,
            backoff_cap_ms: 300_000,
            claim_fetch_quota: 10,
            default_max_attempts: 5,
        }
    }
}

impl QueueConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_LEASE_DURATION_MS..=MAX_LEASE_DURATION_MS).contains(&self.lease_duration_ms) {
            return Err(ConfigError::Invalid("queue.lease_duration_ms out of range".to_string()));
        }
        if self.backoff_base_ms < MIN_BACKOFF_BASE_MS {
            return Err(ConfigError::Invalid("queue.backoff_base_ms too small".to_string()));
        }
        if self.backoff_cap_ms > MAX_BACKOFF_CAP_MS || self.backoff_cap_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid("queue.backoff_cap_ms out of range".to_string()));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid("queue.backoff_multiplier must be >= 1.0".to_string()));
        }
        if !(MIN_CLAIM_FETCH_QUOTA..=MAX_CLAIM_FETCH_QUOTA).contains(&self.claim_fetch_quota) {
            return Err(ConfigError::Invalid("queue.claim_fetch_quota out of range".to_string()));
        }
        if self.default_max_attempts < 1 {
            return Err(ConfigError::Invalid("queue.default_max_attempts must be >= 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Server Configuration
// ============================================================================

/// Worker protocol API server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the worker protocol API binds to.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind_addr is not a valid socket address".to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Store Configuration
// ============================================================================

/// SQLite backing store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// Size of the connection pool used for concurrent worker access.
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "jobforge.sqlite3".to_string(),
            pool_size: 32,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("store.database_path must not be empty".to_string()));
        }
        if self.pool_size == 0 || self.pool_size > 256 {
            return Err(ConfigError::Invalid("store.pool_size out of range".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Top-Level Configuration
// ============================================================================

/// The fully validated, immutable JobForge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobForgeConfig {
    /// Worker protocol API server settings.
    pub server: ServerConfig,
    /// Job queue tunables.
    pub queue: QueueConfig,
    /// SQLite backing store settings.
    pub store: StoreConfig,
    /// Directory containing template TOML definitions, loaded at startup.
    pub templates_dir: String,
    /// Process-wide feature flags.
    pub features: FeatureFlags,
}

impl Default for JobForgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            store: StoreConfig::default(),
            templates_dir: "templates".to_string(),
            features: FeatureFlags::default(),
        }
    }
}

impl JobForgeConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// an explicit `path`, else [`CONFIG_ENV_VAR`], else [`DEFAULT_CONFIG_NAME`]
    /// in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, exceeds
    /// [`MAX_CONFIG_FILE_SIZE`], fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates internal consistency of every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.queue.validate()?;
        self.store.validate()?;
        if self.templates_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("templates_dir must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Resolves the configuration file path: explicit argument, then
/// [`CONFIG_ENV_VAR`], then [`DEFAULT_CONFIG_NAME`] in the working directory.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(env_path);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

// ============================================================================
// SECTION: Template Loading
// ============================================================================

/// Loads every `*.toml` file directly under `dir` as a [`Template`]
/// definition, sorted by file name for deterministic startup ordering.
///
/// A missing `dir` is not an error - it loads as zero templates, so a
/// freshly initialized deployment can start without any autopilot
/// templates registered yet.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if `dir` exists but cannot be read, and
/// [`ConfigError::Parse`] if any file's contents are not a valid
/// [`Template`] document.
pub fn load_templates(dir: &Path) -> Result<Vec<Template>, ConfigError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|err| ConfigError::Io(err.to_string()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(&path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let template: Template = toml::from_str(&content)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?;
        templates.push(template);
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::JobForgeConfig;

    #[test]
    fn default_config_validates() {
        let config = JobForgeConfig::default();
        config.validate().expect("default config should validate");
    }

    #[test]
    fn loads_a_minimal_toml_file() {
        let mut file = NamedTempFile::new().expect("create temp file");
        writeln!(file, "templates_dir = \"demos/templates\"").expect("write");
        let config = JobForgeConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.templates_dir, "demos/templates");
        assert!(!config.features.action_jobs_enabled);
    }

    #[test]
    fn rejects_invalid_bind_addr() {
        let mut file = NamedTempFile::new().expect("create temp file");
        writeln!(file, "[server]\nbind_addr = \"not-an-address\"").expect("write");
        let result = JobForgeConfig::load(Some(file.path()));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_backoff_cap_below_base() {
        let mut file = NamedTempFile::new().expect("create temp file");
        writeln!(file, "[queue]\nbackoff_base_ms = 5000\nbackoff_cap_ms = 1000").expect("write");
        let result = JobForgeConfig::load(Some(file.path()));
        assert!(result.is_err());
    }

    #[test]
    fn missing_templates_dir_loads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let templates = super::load_templates(&dir.path().join("nonexistent")).expect("load");
        assert!(templates.is_empty());
    }

    #[test]
    fn loads_toml_templates_sorted_by_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("b.toml"),
            r#"
            template_key = "ops.b"
            version = 1
            category = "ops"
            input_schema = { type = "object" }
            output_schema = { type = "object" }
            required_scopes = []
            required_connectors = []
            estimated_cost_tier = "low"
            default_max_attempts = 5
            default_timeout_ms = 30000
            is_action_job = false
            enabled = true
            "#,
        )
        .expect("write b");
        fs::write(
            dir.path().join("a.toml"),
            r#"
            template_key = "ops.a"
            version = 1
            category = "ops"
            input_schema = { type = "object" }
            output_schema = { type = "object" }
            required_scopes = []
            required_connectors = []
            estimated_cost_tier = "low"
            default_max_attempts = 5
            default_timeout_ms = 30000
            is_action_job = false
            enabled = true
            "#,
        )
        .expect("write a");
        let templates = super::load_templates(dir.path()).expect("load");
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].template_key, "ops.a");
        assert_eq!(templates[1].template_key, "ops.b");
    }
}
