// crates/skillgate-core/src/core/error.rs
// ============================================================================
// Module: Error Taxonomy
// Description: Caller-facing error kinds attached to agent responses.
// Purpose: Keep error classification stable for programmatic handling.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every error surfaced to a caller is a structured entry with a stable kind.
//! No error aborts the process; errors are captured and attached to the
//! response, and exceptions are reserved for defects such as contract load
//! failures or store unavailability.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable error classification for caller-facing entries.
///
/// # Invariants
/// - Wire labels are stable snake_case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Contract missing or invalid; the invocation is refused.
    ContractError,
    /// A gate rejected the turn (scope, trace, sync, or artifact).
    GateError,
    /// Version CAS failed or a resume token was stale.
    StateConflict,
    /// Idempotent replay of an already-processed message.
    DuplicateMessage,
    /// The skill exceeded its hard timeout.
    Timeout,
    /// The fix loop exhausted its budget.
    Escalation,
    /// The skill raised an uncaught internal error.
    SkillInternalError,
    /// Advisor output failed deterministic validation.
    ValidationError,
    /// A changed file escaped the declared allowlist.
    ScopeViolation,
    /// Inputs or artifacts could not be parsed.
    ParseError,
}

impl ErrorKind {
    /// Returns the stable wire label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContractError => "contract_error",
            Self::GateError => "gate_error",
            Self::StateConflict => "state_conflict",
            Self::DuplicateMessage => "duplicate_message",
            Self::Timeout => "timeout",
            Self::Escalation => "escalation",
            Self::SkillInternalError => "skill_internal_error",
            Self::ValidationError => "validation_error",
            Self::ScopeViolation => "scope_violation",
            Self::ParseError => "parse_error",
        }
    }

    /// Returns true when the caller may retry after fixing inputs or state.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::StateConflict | Self::DuplicateMessage)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Error Entries
// ============================================================================

/// Structured error entry attached to responses and results.
///
/// # Invariants
/// - `detail` carries the gate subtype (for example `trace_assumption_ratio`)
///   when the kind is `gate_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Stable error classification.
    pub kind: ErrorKind,
    /// Human-readable detail, including gate subtypes.
    pub detail: String,
}

impl ErrorEntry {
    /// Creates an error entry.
    #[must_use]
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}
