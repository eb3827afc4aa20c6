// jobforge-cli/src/main.rs
// ============================================================================
// Module: JobForge Operator CLI
// Description: Direct-to-store administration commands for jobs, templates,
//              policy tokens, and the audit log.
// Purpose: Give an operator a way to enqueue/inspect jobs, register
//          templates, issue policy tokens, and read the audit log without
//          standing up an HTTP client against jobforge-server.
// Dependencies: clap, jobforge-config, jobforge-core, jobforge-policy,
//               jobforge-schema, jobforge-store-sqlite, rand, serde_json,
//               thiserror, tokio, toml
// ============================================================================

//! ## Overview
//! This CLI talks to the same `SqliteStore` a running `jobforge-server`
//! uses, not the HTTP API - it is an operator tool for seeding templates,
//! issuing policy tokens, and inspecting state directly, the same role
//! the teacher's `Store`/`Provider` subcommand groups play. Every command
//! prints one JSON value to stdout on success. Exit codes follow spec.md 6:
//! 0 success, 1 generic failure, 2 validation failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use clap::Subcommand;
use jobforge_config::JobForgeConfig;
use jobforge_core::error::ApiError;
use jobforge_core::error::ErrorKind;
use jobforge_core::ids::TenantId;
use jobforge_core::policy::PolicyToken;
use jobforge_core::store::AuditLogStore;
use jobforge_core::store::JobListFilters;
use jobforge_core::store::JobStore;
use jobforge_core::store::PolicyTokenStore;
use jobforge_core::store::TemplateRegistryStore;
use jobforge_core::template::Template;
use jobforge_core::time::Timestamp;
use jobforge_store_sqlite::QueueTunables;
use jobforge_store_sqlite::SqliteStore;
use rand::RngCore;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Surface
// ============================================================================

/// JobForge operator CLI.
#[derive(Debug, Parser)]
#[command(name = "jobforge", disable_help_subcommand = true)]
struct Cli {
    /// Path to the JobForge config file; falls back to config resolution
    /// rules documented on `JobForgeConfig::load`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Job queue administration.
    Job {
        /// Job subcommand.
        #[command(subcommand)]
        command: JobCommand,
    },
    /// Template registry administration.
    Template {
        /// Template subcommand.
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Policy token administration.
    Policy {
        /// Policy subcommand.
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Audit log inspection.
    Audit {
        /// Audit subcommand.
        #[command(subcommand)]
        command: AuditCommand,
    },
}

/// Job queue subcommands.
#[derive(Debug, Subcommand)]
enum JobCommand {
    /// Enqueues a new job.
    Enqueue {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Job type.
        #[arg(long = "type")]
        job_type: String,
        /// Inline JSON payload.
        #[arg(long)]
        payload: String,
        /// Optional idempotency key.
        #[arg(long)]
        idempotency_key: Option<String>,
        /// Optional RFC 3339 earliest eligibility time.
        #[arg(long)]
        run_at: Option<String>,
        /// Optional maximum attempts override.
        #[arg(long)]
        max_attempts: Option<i32>,
    },
    /// Lists jobs for a tenant.
    List {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Restrict to this status.
        #[arg(long)]
        status: Option<String>,
        /// Restrict to this job type.
        #[arg(long = "type")]
        job_type: Option<String>,
        /// Maximum rows to return.
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// Rows to skip.
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Fetches a single job.
    Get {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Job id.
        #[arg(long)]
        job_id: String,
    },
    /// Fetches a job's terminal result.
    Result {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Job id.
        #[arg(long)]
        job_id: String,
    },
    /// Cancels a job.
    Cancel {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Job id.
        #[arg(long)]
        job_id: String,
    },
    /// Reschedules a queued job.
    Reschedule {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Job id.
        #[arg(long)]
        job_id: String,
        /// New RFC 3339 earliest eligibility time.
        #[arg(long)]
        run_at: String,
    },
}

/// Template registry subcommands.
#[derive(Debug, Subcommand)]
enum TemplateCommand {
    /// Registers a template from a TOML file.
    Put {
        /// Path to a template TOML document.
        path: PathBuf,
    },
    /// Lists every registered template.
    List,
    /// Enables a template.
    Enable {
        /// Template key.
        template_key: String,
    },
    /// Disables a template.
    Disable {
        /// Template key.
        template_key: String,
    },
}

/// Policy token subcommands.
#[derive(Debug, Subcommand)]
enum PolicyCommand {
    /// Issues a new policy token.
    IssueToken {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Comma-separated scopes the token grants.
        #[arg(long)]
        scopes: String,
        /// Validity window in seconds from now.
        #[arg(long, default_value_t = 3_600)]
        ttl_secs: i64,
        /// Whether the token may be validated successfully only once.
        #[arg(long)]
        single_use: bool,
    },
}

/// Audit log subcommands.
#[derive(Debug, Subcommand)]
enum AuditCommand {
    /// Lists recent audit entries for a tenant.
    List {
        /// Owning tenant.
        #[arg(long)]
        tenant: String,
        /// Maximum rows to return.
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper, carrying whether the failure was a validation failure
/// (exit code 2) or a generic failure (exit code 1).
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
    /// Whether this should exit with spec.md's validation-failure code.
    validation: bool,
}

impl CliError {
    /// Builds a generic-failure error.
    #[must_use]
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            validation: false,
        }
    }

    /// Builds a validation-failure error.
    #[must_use]
    fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            validation: true,
        }
    }

    /// Maps this error to spec.md 6's exit code table.
    fn exit_code(&self) -> ExitCode {
        if self.validation {
            ExitCode::from(2)
        } else {
            ExitCode::FAILURE
        }
    }
}

impl From<ApiError> for CliError {
    fn from(error: ApiError) -> Self {
        if error.kind == ErrorKind::Validation {
            Self::validation(error.message)
        } else {
            Self::new(format!("{}: {}", error.kind, error.message))
        }
    }
}

/// CLI result alias for fallible command bodies.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning spec.md 6's exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write_stderr_line(&err.message);
            err.exit_code()
        }
    }
}

/// Parses arguments, opens the store, and dispatches to the chosen command.
async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = JobForgeConfig::load(cli.config.as_deref()).map_err(|err| CliError::new(err.to_string()))?;
    let tunables = QueueTunables {
        lease_duration_ms: config.queue.lease_duration_ms,
        backoff_base_ms: config.queue.backoff_base_ms,
        backoff_multiplier: config.queue.backoff_multiplier,
        backoff_cap_ms: config.queue.backoff_cap_ms,
        claim_fetch_quota: config.queue.claim_fetch_quota,
        default_max_attempts: config.queue.default_max_attempts,
    };
    let store = SqliteStore::open(Path::new(&config.store.database_path), tunables).map_err(|err| CliError::new(err.to_string()))?;

    match cli.command {
        Commands::Job {
            command,
        } => command_job(&store, command),
        Commands::Template {
            command,
        } => command_template(&store, command),
        Commands::Policy {
            command,
        } => command_policy(&store, command),
        Commands::Audit {
            command,
        } => command_audit(&store, command),
    }
}

// ============================================================================
// SECTION: Job Commands
// ============================================================================

/// Dispatches a [`JobCommand`].
fn command_job(store: &SqliteStore, command: JobCommand) -> CliResult<()> {
    match command {
        JobCommand::Enqueue {
            tenant,
            job_type,
            payload,
            idempotency_key,
            run_at,
            max_attempts,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&payload).map_err(|err| CliError::validation(format!("--payload is not valid json: {err}")))?;
            let run_at = parse_optional_timestamp(run_at.as_deref())?;
            let job = store
                .jobs()
                .enqueue(&TenantId::new(tenant), &job_type, payload, idempotency_key.as_deref(), run_at, max_attempts)?;
            print_json(&job)
        }
        JobCommand::List {
            tenant,
            status,
            job_type,
            limit,
            offset,
        } => {
            let filters = JobListFilters {
                status,
                job_type,
                limit,
                offset,
            };
            let jobs = store.jobs().list_jobs(&TenantId::new(tenant), &filters)?;
            print_json(&jobs)
        }
        JobCommand::Get {
            tenant,
            job_id,
        } => {
            let job = store.jobs().get_job(parse_job_id(&job_id)?, &TenantId::new(tenant))?;
            print_json(&job)
        }
        JobCommand::Result {
            tenant,
            job_id,
        } => {
            let result = store.jobs().get_result(parse_job_id(&job_id)?, &TenantId::new(tenant))?;
            print_json(&result)
        }
        JobCommand::Cancel {
            tenant,
            job_id,
        } => {
            store.jobs().cancel_job(parse_job_id(&job_id)?, &TenantId::new(tenant))?;
            print_json(&serde_json::json!({"cancelled": true}))
        }
        JobCommand::Reschedule {
            tenant,
            job_id,
            run_at,
        } => {
            let run_at = parse_timestamp(&run_at)?;
            store.jobs().reschedule_job(parse_job_id(&job_id)?, &TenantId::new(tenant), run_at)?;
            print_json(&serde_json::json!({"rescheduled": true}))
        }
    }
}

// ============================================================================
// SECTION: Template Commands
// ============================================================================

/// Dispatches a [`TemplateCommand`].
fn command_template(store: &SqliteStore, command: TemplateCommand) -> CliResult<()> {
    match command {
        TemplateCommand::Put {
            path,
        } => {
            let content = std::fs::read_to_string(&path).map_err(|err| CliError::new(format!("reading {}: {err}", path.display())))?;
            let template: Template = toml::from_str(&content).map_err(|err| CliError::validation(format!("{}: {err}", path.display())))?;
            store.templates().put_template(template)?;
            print_json(&serde_json::json!({"registered": true}))
        }
        TemplateCommand::List => {
            let templates = store.templates().list_templates()?;
            print_json(&templates)
        }
        TemplateCommand::Enable {
            template_key,
        } => {
            store.templates().set_enabled(&template_key, true)?;
            print_json(&serde_json::json!({"enabled": true}))
        }
        TemplateCommand::Disable {
            template_key,
        } => {
            store.templates().set_enabled(&template_key, false)?;
            print_json(&serde_json::json!({"enabled": false}))
        }
    }
}

// ============================================================================
// SECTION: Policy Commands
// ============================================================================

/// Dispatches a [`PolicyCommand`].
fn command_policy(store: &SqliteStore, command: PolicyCommand) -> CliResult<()> {
    match command {
        PolicyCommand::IssueToken {
            tenant,
            scopes,
            ttl_secs,
            single_use,
        } => {
            let scopes: Vec<String> = scopes.split(',').map(str::trim).filter(|scope| !scope.is_empty()).map(str::to_string).collect();
            if scopes.is_empty() {
                return Err(CliError::validation("--scopes must name at least one scope"));
            }
            let now = Timestamp::now();
            let mut raw = [0_u8; 32];
            rand::thread_rng().fill_bytes(&mut raw);
            let token = PolicyToken {
                token: raw.to_vec(),
                tenant_id: TenantId::new(tenant),
                scopes,
                issued_at: now,
                expires_at: now.plus_millis(ttl_secs.saturating_mul(1_000)),
                single_use,
                consumed_at: None,
            };
            store.policy_tokens().issue_token(token.clone())?;
            print_json(&serde_json::json!({
                "token": STANDARD.encode(&token.token),
                "expires_at": token.expires_at,
            }))
        }
    }
}

// ============================================================================
// SECTION: Audit Commands
// ============================================================================

/// Dispatches an [`AuditCommand`].
fn command_audit(store: &SqliteStore, command: AuditCommand) -> CliResult<()> {
    match command {
        AuditCommand::List {
            tenant,
            limit,
        } => {
            let entries = store.audit_log().list(&TenantId::new(tenant), limit)?;
            print_json(&entries)
        }
    }
}

// ============================================================================
// SECTION: Output & Parsing Helpers
// ============================================================================

/// Prints `value` as pretty JSON to stdout.
fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&text).map_err(|err| CliError::new(err.to_string()))
}

/// Writes a line to stdout without going through `println!`.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr without going through `eprintln!`.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Parses a path-carried job id.
fn parse_job_id(raw: &str) -> CliResult<jobforge_core::ids::JobId> {
    uuid::Uuid::parse_str(raw)
        .map(jobforge_core::ids::JobId::from_uuid)
        .map_err(|_| CliError::validation(format!("{raw} is not a valid job id")))
}

/// Parses a required RFC 3339 timestamp argument.
fn parse_timestamp(raw: &str) -> CliResult<Timestamp> {
    Timestamp::parse_rfc3339(raw).map_err(|err| CliError::validation(format!("{raw} is not a valid timestamp: {err}")))
}

/// Parses an optional RFC 3339 timestamp argument.
fn parse_optional_timestamp(raw: Option<&str>) -> CliResult<Option<Timestamp>> {
    raw.map(parse_timestamp).transpose()
}
