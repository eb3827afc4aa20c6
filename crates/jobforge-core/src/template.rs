// jobforge-core/src/template.rs
// ============================================================================
// Module: JobForge Template Model
// Description: The named, versioned job specification row.
// Purpose: Define the shape the template registry loads and the compiler
//          consults when turning RequestJob calls into enqueued jobs.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A template is the sole way to create an autopilot job: it names the
//! schemas its inputs/outputs must satisfy, the connector scopes it needs,
//! and whether it is an action job requiring a policy token. Templates are
//! loaded at startup (see `jobforge-config`) and looked up by key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Template Category
// ============================================================================

/// Broad classification of a template's purpose, used for reporting and
/// cost-tier defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    /// Operational automation (infra, deploys, housekeeping).
    Ops,
    /// Customer support automation.
    Support,
    /// Growth/marketing automation.
    Growth,
    /// Finance/operations automation.
    Finops,
    /// Core platform templates not specific to a business function.
    Core,
}

// ============================================================================
// SECTION: Cost Tier
// ============================================================================

/// Coarse estimate of a template's execution cost, surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    /// Cheap to run.
    Low,
    /// Moderate resource/connector usage.
    Medium,
    /// Expensive or high-risk to run.
    High,
}

// ============================================================================
// SECTION: Template Row
// ============================================================================

/// A registered, versioned job specification.
///
/// # Invariants
/// - `template_key` is unique within the registry.
/// - `is_action_job = true` implies `RequestJob` must route through the
///   policy gate before enqueueing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Stable lookup key, unique across versions.
    pub template_key: String,
    /// Monotonically increasing version for this key.
    pub version: i32,
    /// Business-function classification.
    pub category: TemplateCategory,
    /// JSON Schema (as a value) validating `RequestJob` inputs.
    pub input_schema: Value,
    /// JSON Schema (as a value) validating the job's eventual output.
    pub output_schema: Value,
    /// Connector scopes a policy token must grant for action jobs.
    pub required_scopes: Vec<String>,
    /// Connector ids this template is permitted to invoke.
    pub required_connectors: Vec<String>,
    /// Coarse cost estimate.
    pub estimated_cost_tier: CostTier,
    /// Default `max_attempts` applied to jobs compiled from this template.
    pub default_max_attempts: i32,
    /// Default per-attempt timeout applied to jobs compiled from this template.
    pub default_timeout_ms: i64,
    /// Whether this template produces external side effects and therefore
    /// requires a policy token.
    pub is_action_job: bool,
    /// Whether this template currently accepts new `RequestJob` calls.
    pub enabled: bool,
}

impl Template {
    /// Returns whether a `RequestJob` call against this template requires a
    /// validated policy token before it may enqueue.
    #[must_use]
    pub const fn requires_policy_token(&self) -> bool {
        self.is_action_job
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::CostTier;
    use super::Template;
    use super::TemplateCategory;

    fn sample_template(is_action_job: bool) -> Template {
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
            is_action_job,
            enabled: true,
        }
    }

    #[test]
    fn action_job_requires_policy_token() {
        assert!(sample_template(true).requires_policy_token());
        assert!(!sample_template(false).requires_policy_token());
    }
}
