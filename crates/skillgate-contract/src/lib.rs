// crates/skillgate-contract/src/lib.rs
// ============================================================================
// Module: Skillgate Contracts
// Description: Skill contract model, document parsing, and the registry.
// Purpose: Make declarative contracts the runtime's ground truth.
// Dependencies: jsonschema, serde, serde_json, serde_yaml, skillgate-core, thiserror
// ============================================================================

//! ## Overview
//! A skill cannot be dispatched unless its contract parses cleanly. Contract
//! documents are markdown files whose YAML top matter declares the skill's
//! inputs, outputs, autonomy level, side effects, and required artifacts. The
//! registry validates every document against an embedded JSON Schema and
//! cross-checks references before the runtime starts.
//!
//! Security posture: contract documents are untrusted input; nonconforming
//! documents are rejected at startup.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Top-matter document parsing.
pub mod document;
/// Contract registry with cross-reference validation.
pub mod registry;
/// Embedded contract schema and validation.
pub mod schema;
/// Contract record types.
pub mod types;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Contract loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Parse and cross-reference errors are fatal at startup.
#[derive(Debug, Error)]
pub enum ContractError {
    /// A contract document failed to parse.
    #[error("contract parse error in {file}: {detail}")]
    Parse {
        /// Offending document path.
        file: String,
        /// Parse failure detail.
        detail: String,
    },
    /// A contract document violated the embedded schema.
    #[error("contract schema error in {file}: {detail}")]
    Schema {
        /// Offending document path.
        file: String,
        /// First schema violation.
        detail: String,
    },
    /// Cross-reference validation failed across the loaded set.
    #[error("contract cross-reference error: {0}")]
    CrossRef(String),
    /// No contract is registered under the requested name.
    #[error("unknown skill: {0}")]
    UnknownSkill(String),
    /// Contract directory could not be read.
    #[error("contract io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use document::ContractDocument;
pub use registry::ContractRegistry;
pub use types::AutonomyLevel;
pub use types::ExecutionMode;
pub use types::FailureMode;
pub use types::InteractionOutcomes;
pub use types::SideEffect;
pub use types::SkillContract;
pub use types::StatePersistenceLevel;
pub use types::SyncConstraints;
