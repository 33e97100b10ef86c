// crates/skillgate-gates/src/lib.rs
// ============================================================================
// Module: Skillgate Gates
// Description: Independent pre/post checks over artifacts and context.
// Purpose: Enforce scope, evidence, sync-safety, and artifact completeness.
// Dependencies: globset, serde, serde_json, skillgate-core, thiserror
// ============================================================================

//! ## Overview
//! Four independent gates, each a pure function over artifacts and context.
//! All selected gates run and failures accumulate; a gate failure blocks the
//! turn but never aborts the process. Every gate is callable standalone so
//! external tooling can run them without the full executor.
//!
//! Security posture: gate inputs (diffs, trace maps, emitted sources) are
//! untrusted; gates fail closed on unparseable input.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Artifact completeness gate.
pub mod artifact;
/// Gate reports and findings.
pub mod report;
/// Scope gate: changed files versus the allowlist.
pub mod scope;
/// Sync-compat gate: forbidden constructs in emitted code.
pub mod sync;
/// Trace-map gate: evidence coverage and assumption ceiling.
pub mod trace;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gate evaluation errors.
///
/// Gate *failures* are reported through [`report::GateReport`]; this error
/// covers inputs that could not be evaluated at all.
#[derive(Debug, Error)]
pub enum GateError {
    /// A gate input could not be read.
    #[error("gate io error: {0}")]
    Io(String),
    /// A gate input could not be parsed.
    #[error("gate input invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Gate Selection
// ============================================================================

/// Selection of gates to run, used by the orchestration command.
///
/// # Invariants
/// - All gates are selected by default; skips are explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSet {
    /// Run the scope gate.
    pub scope: bool,
    /// Run the trace-map gate.
    pub trace: bool,
    /// Run the sync-compat gate.
    pub sync: bool,
    /// Run the artifact gate.
    pub artifact: bool,
}

impl Default for GateSet {
    fn default() -> Self {
        Self {
            scope: true,
            trace: true,
            sync: true,
            artifact: true,
        }
    }
}

impl GateSet {
    /// Returns the full gate set.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }
}

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use artifact::ArtifactGate;
pub use report::GateFinding;
pub use report::GateKind;
pub use report::GateReport;
pub use report::GateStatus;
pub use scope::Allowlist;
pub use scope::ScopeGate;
pub use scope::changed_files_from_patch;
pub use sync::SyncGate;
pub use trace::TraceGate;
