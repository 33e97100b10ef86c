// crates/skillgate-contract/src/types.rs
// ============================================================================
// Module: Contract Types
// Description: Typed records for declarative skill contracts.
// Purpose: Model the per-skill ground truth enforced by the runtime.
// Dependencies: serde, serde_json, skillgate-core
// ============================================================================

//! ## Overview
//! A skill contract is static and immutable at runtime. The three execution
//! modes select a fixed validation recipe in the executor rather than a
//! subclass hierarchy; autonomy levels are ordered so gates can key off a
//! minimum level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use skillgate_core::RequiredArtifact;
use skillgate_core::SkillName;
use skillgate_core::TaskState;
use skillgate_core::limits::DEFAULT_MAX_TURNS;
use skillgate_core::limits::DEFAULT_TIMEOUT_SECONDS;

// ============================================================================
// SECTION: Mode and Autonomy
// ============================================================================

/// Execution mode selecting the validation pipeline for a skill.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Fully deterministic skill; advisor validation is skipped.
    Deterministic,
    /// Mixed deterministic and advisor-driven output.
    Hybrid,
    /// Output derived entirely from AI inference.
    AdvisorOnly,
}

impl ExecutionMode {
    /// Returns true when advisor validation must run for this mode.
    #[must_use]
    pub const fn requires_advisor_validation(self) -> bool {
        matches!(self, Self::Hybrid | Self::AdvisorOnly)
    }

    /// Returns the stable wire label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Hybrid => "hybrid",
            Self::AdvisorOnly => "advisor_only",
        }
    }
}

/// Bounded autonomy level granted to a skill.
///
/// # Invariants
/// - Ordering is semantic: `Read < Suggest < Implement < Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// May only read.
    Read,
    /// May propose changes without applying them.
    Suggest,
    /// May apply changes within the declared allowlist.
    Implement,
    /// May apply and commit changes within the declared allowlist.
    Commit,
}

impl AutonomyLevel {
    /// Returns true when the level permits writes and requires an allowlist.
    #[must_use]
    pub const fn requires_allowlist(self) -> bool {
        matches!(self, Self::Implement | Self::Commit)
    }
}

/// Side effects a skill declares up front.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Filesystem writes.
    Fs,
    /// Outbound network calls.
    Net,
    /// Git operations.
    Git,
}

/// Failure modes a contract declares as expected.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Inputs or artifacts could not be parsed.
    ParseError,
    /// A changed file escaped the allowlist.
    ScopeViolation,
    /// Deterministic validation rejected outputs.
    ValidationError,
    /// The skill exceeded its hard timeout.
    Timeout,
    /// Idempotent replay of an already-processed message.
    DuplicateMessage,
    /// Optimistic concurrency conflict.
    VersionConflict,
}

/// Level of state persisted for a skill's turns.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatePersistenceLevel {
    /// Nothing beyond the context row.
    None,
    /// Pocket facts only.
    FactsOnly,
    /// Facts plus the full event log.
    #[default]
    FullEvents,
}

// ============================================================================
// SECTION: Sync Constraints
// ============================================================================

/// Static sync-safety constraints enforced over skill code.
///
/// # Invariants
/// - All three constraints default to enforced; contracts may not widen the
///   runtime's own deny rules, only restate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConstraints {
    /// Forbids asynchronous dependencies and primitives.
    #[serde(default = "default_true")]
    pub forbid_async_dependencies: bool,
    /// Requires explicit timeouts on external calls.
    #[serde(default = "default_true")]
    pub require_timeouts: bool,
    /// Forbids background tasks without a join.
    #[serde(default = "default_true")]
    pub forbid_background_tasks: bool,
}

/// Returns the serde default for enforced constraints.
const fn default_true() -> bool {
    true
}

impl Default for SyncConstraints {
    fn default() -> Self {
        Self {
            forbid_async_dependencies: true,
            require_timeouts: true,
            forbid_background_tasks: true,
        }
    }
}

// ============================================================================
// SECTION: Interaction Outcomes
// ============================================================================

/// Multi-turn interaction settings for a skill.
///
/// # Invariants
/// - `max_turns` is clamped to the absolute cap at registry load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionOutcomes {
    /// Intermediate task states the skill may legitimately produce.
    #[serde(default)]
    pub allowed_intermediate_states: Vec<TaskState>,
    /// Maximum turns for contexts driven by this skill.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Whether the skill supports resuming with a token.
    #[serde(default)]
    pub supports_resume: bool,
    /// JSON schema for the input-request payload, when the skill pauses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_request_jsonschema: Option<Value>,
}

/// Returns the serde default turn cap.
const fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

impl Default for InteractionOutcomes {
    fn default() -> Self {
        Self {
            allowed_intermediate_states: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
            supports_resume: false,
            input_request_jsonschema: None,
        }
    }
}

// ============================================================================
// SECTION: Skill Contract
// ============================================================================

/// Declarative, static contract for one skill.
///
/// # Invariants
/// - Immutable at runtime; owned by the registry.
/// - `max_fix_iterations` never exceeds the hard loop cap (registry-checked).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillContract {
    /// Skill name; the dispatch key.
    pub name: SkillName,
    /// Contract version string.
    pub version: String,
    /// Execution mode selecting the validation recipe.
    pub execution_mode: ExecutionMode,
    /// Bounded autonomy level.
    pub autonomy_level: AutonomyLevel,
    /// Declared side effects.
    #[serde(default)]
    pub side_effects: Vec<SideEffect>,
    /// Hard invocation timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Fix iterations permitted for this skill.
    #[serde(default)]
    pub max_fix_iterations: u32,
    /// Whether retried invocations must be deduplicated.
    #[serde(default)]
    pub idempotency_required: bool,
    /// Static sync-safety constraints.
    #[serde(default)]
    pub sync_constraints: SyncConstraints,
    /// JSON schema for skill inputs.
    pub input_schema: Value,
    /// JSON schema for skill outputs.
    pub output_schema: Value,
    /// Artifacts that must exist and be non-empty after a successful turn.
    #[serde(default)]
    pub required_artifacts: Vec<RequiredArtifact>,
    /// Declared failure modes.
    #[serde(default)]
    pub failure_modes: Vec<FailureMode>,
    /// Skills this skill may invoke through the executor handle.
    #[serde(default)]
    pub depends_on: Vec<SkillName>,
    /// Multi-turn interaction settings.
    #[serde(default)]
    pub interaction_outcomes: InteractionOutcomes,
    /// Persistence level for this skill's turns.
    #[serde(default)]
    pub state_persistence_level: StatePersistenceLevel,
}

/// Returns the serde default invocation timeout.
const fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl SkillContract {
    /// Returns true when the contract declares a required artifact by name.
    #[must_use]
    pub fn requires_artifact(&self, name: &str) -> bool {
        self.required_artifacts
            .iter()
            .any(|artifact| artifact.name == name)
    }

    /// Returns true when the named skill is a declared dependency.
    #[must_use]
    pub fn declares_dependency(&self, name: &SkillName) -> bool {
        self.depends_on.iter().any(|dep| dep == name)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::AutonomyLevel;
    use super::ExecutionMode;

    #[test]
    fn autonomy_ordering_is_semantic() {
        assert!(AutonomyLevel::Read < AutonomyLevel::Suggest);
        assert!(AutonomyLevel::Suggest < AutonomyLevel::Implement);
        assert!(AutonomyLevel::Implement < AutonomyLevel::Commit);
        assert!(AutonomyLevel::Implement.requires_allowlist());
        assert!(AutonomyLevel::Commit.requires_allowlist());
        assert!(!AutonomyLevel::Suggest.requires_allowlist());
    }

    #[test]
    fn advisor_modes_require_validation() {
        assert!(!ExecutionMode::Deterministic.requires_advisor_validation());
        assert!(ExecutionMode::Hybrid.requires_advisor_validation());
        assert!(ExecutionMode::AdvisorOnly.requires_advisor_validation());
    }
}
