// crates/skillgate-core/src/core/response.rs
// ============================================================================
// Module: Execution Results and Agent Responses
// Description: Typed results returned by the executor and the adapter.
// Purpose: Keep the caller-facing surface structured and stable.
// Dependencies: crate::core::{context, error}, serde, serde_json
// ============================================================================

//! ## Overview
//! The executor returns an [`ExecutionResult`]; the agent adapter maps it to
//! an [`AgentResponse`] with a task state, structured errors, and resume
//! metadata. "Needs more input" is a return value, never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::context::AgentStateDetail;
use crate::core::context::InputRequest;
use crate::core::context::TaskState;
use crate::core::error::ErrorEntry;

// ============================================================================
// SECTION: Execution Status
// ============================================================================

/// Outcome classification of a single executor invocation.
///
/// # Invariants
/// - Variants are stable for serialization and adapter mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The skill completed and all gates passed.
    Success,
    /// A gate or validation rejected the turn.
    Failed,
    /// Progress is blocked on policy or state conflicts.
    Blocked,
    /// The skill exceeded its hard timeout.
    Timeout,
    /// A bounded budget was exhausted.
    Escalated,
    /// The skill needs more input to proceed.
    InputRequired,
}

impl ExecutionStatus {
    /// Maps the execution status to the context task state.
    #[must_use]
    pub const fn task_state(self) -> TaskState {
        match self {
            Self::Success => TaskState::Completed,
            Self::Failed => TaskState::Failed,
            Self::Blocked => TaskState::Blocked,
            Self::Timeout => TaskState::Timeout,
            Self::Escalated => TaskState::Escalated,
            Self::InputRequired => TaskState::InputRequired,
        }
    }
}

// ============================================================================
// SECTION: Execution Result
// ============================================================================

/// Typed result of one executor invocation.
///
/// # Invariants
/// - `artifacts_written` lists correlation-relative artifact names.
/// - `iterations` is present only for fix-loop driven invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Outcome classification.
    pub status: ExecutionStatus,
    /// Structured skill outputs.
    pub outputs: Value,
    /// Accumulated structured errors.
    pub errors: Vec<ErrorEntry>,
    /// Artifact names written during the turn.
    pub artifacts_written: Vec<String>,
    /// Fix-loop iteration count, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    /// Input request, present when the status is `input_required`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_request: Option<InputRequest>,
}

impl ExecutionResult {
    /// Creates a successful result with the given outputs.
    #[must_use]
    pub fn success(outputs: Value) -> Self {
        Self {
            status: ExecutionStatus::Success,
            outputs,
            errors: Vec::new(),
            artifacts_written: Vec::new(),
            iterations: None,
            input_request: None,
        }
    }

    /// Creates a failed result with the given errors.
    #[must_use]
    pub fn failed(errors: Vec<ErrorEntry>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            outputs: Value::Null,
            errors,
            artifacts_written: Vec::new(),
            iterations: None,
            input_request: None,
        }
    }
}

// ============================================================================
// SECTION: Agent Response
// ============================================================================

/// Metadata attached to every agent response.
///
/// # Invariants
/// - `resume_token` is present exactly when the state is non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseMetadata {
    /// Qualifier for non-terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_state: Option<AgentStateDetail>,
    /// Resume token for the next turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    /// Execution mode of the dispatched skill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Response returned to the external caller by the agent adapter.
///
/// # Invariants
/// - `input_request` is present exactly when `state` is `input_required`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Task state after the turn.
    pub state: TaskState,
    /// Structured outputs.
    pub outputs: Value,
    /// Accumulated structured errors.
    pub errors: Vec<ErrorEntry>,
    /// Input request describing what the caller must supply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_request: Option<InputRequest>,
    /// Response metadata.
    pub metadata: ResponseMetadata,
}
