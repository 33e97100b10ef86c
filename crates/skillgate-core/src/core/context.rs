// crates/skillgate-core/src/core/context.rs
// ============================================================================
// Module: Correlation Context
// Description: Context state, task-state machine, and input requests.
// Purpose: Capture per-correlation progress for multi-turn pausable execution.
// Dependencies: crate::core::{identifiers, limits, time, token}, serde
// ============================================================================

//! ## Overview
//! The correlation context is the fundamental identity of a job. It is mutated
//! only through compare-and-swap on `context_version` and is never deleted by
//! the runtime. Non-terminal states carry a resume token so any worker can
//! pick up the next turn.
//!
//! Security posture: context rows are treated as untrusted on load; stores
//! verify integrity hashes before deserialization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CorrelationId;
use crate::core::limits::DEFAULT_MAX_TURNS;
use crate::core::limits::MAX_SUMMARY_CHARS;
use crate::core::limits::MAX_TURNS_CAP;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Task State
// ============================================================================

/// Task lifecycle state for a correlation context.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - `Delegating` is reserved and demoted to `Blocked` while routing is
///   disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Context created, no turn has run yet.
    Pending,
    /// A turn is currently executing.
    InProgress,
    /// Terminal: the job finished successfully.
    Completed,
    /// Terminal: the job failed.
    Failed,
    /// Terminal: a skill exceeded its hard timeout.
    Timeout,
    /// Terminal: progress is blocked on a policy or state conflict.
    Blocked,
    /// Terminal: bounded budgets were exhausted; human review required.
    Escalated,
    /// Non-terminal: the skill needs more input to proceed.
    InputRequired,
    /// Non-terminal: reserved for cross-agent routing.
    Delegating,
    /// Non-terminal: execution paused at a turn boundary.
    Paused,
}

impl TaskState {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Blocked | Self::Escalated
        )
    }

    /// Returns true for resumable, non-terminal states.
    #[must_use]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::InputRequired | Self::Delegating | Self::Paused)
    }

    /// Returns a stable wire label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Blocked => "blocked",
            Self::Escalated => "escalated",
            Self::InputRequired => "input_required",
            Self::Delegating => "delegating",
            Self::Paused => "paused",
        }
    }
}

/// Detail qualifier for non-terminal agent states.
///
/// # Invariants
/// - Present only when the task state is non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStateDetail {
    /// Waiting for caller-supplied input.
    InputRequired,
    /// Reserved: delegating to another agent.
    Delegating,
    /// Paused at a turn boundary.
    Paused,
}

// ============================================================================
// SECTION: Input Request
// ============================================================================

/// Structured description of input the caller must supply to resume.
///
/// # Invariants
/// - `missing_fields` is non-empty when the request is produced by a skill.
/// - The payload is redacted before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    /// Field names the skill requires to proceed.
    pub missing_fields: Vec<String>,
    /// Optional JSON schema describing the expected input payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Optional human-readable prompt for the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl InputRequest {
    /// Creates an input request for the given missing fields.
    #[must_use]
    pub fn for_fields(missing_fields: Vec<String>) -> Self {
        Self {
            missing_fields,
            schema: None,
            prompt: None,
        }
    }
}

// ============================================================================
// SECTION: Context State
// ============================================================================

/// Durable per-correlation context row.
///
/// # Invariants
/// - Mutated only via compare-and-swap on `context_version`.
/// - `current_turn` starts at 1 and is monotonic.
/// - Never deleted by the runtime; external retention policy applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextState {
    /// Correlation identifier for the job.
    pub correlation_id: CorrelationId,
    /// Monotonic turn counter, starting at 1.
    pub current_turn: u32,
    /// Maximum turns permitted for this context.
    pub max_turns: u32,
    /// Total skill invocations consumed over the context lifetime.
    pub total_steps: u32,
    /// Current task state.
    pub task_state: TaskState,
    /// Monotonic version for optimistic concurrency.
    pub context_version: u64,
    /// Resume token issued while the state is non-terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
    /// Qualifier for non-terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_state_detail: Option<AgentStateDetail>,
    /// Pending input request while `task_state` is `input_required`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_request: Option<InputRequest>,
    /// Bounded human-readable summary of progress.
    pub summary: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
}

impl ContextState {
    /// Creates a fresh context for the first turn of a correlation id.
    #[must_use]
    pub fn new(correlation_id: CorrelationId, now: Timestamp) -> Self {
        Self {
            correlation_id,
            current_turn: 1,
            max_turns: DEFAULT_MAX_TURNS,
            total_steps: 0,
            task_state: TaskState::Pending,
            context_version: 1,
            resume_token: None,
            agent_state_detail: None,
            input_request: None,
            summary: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the turn cap, clamped to the absolute maximum.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.clamp(1, MAX_TURNS_CAP);
        self
    }

    /// Replaces the summary, truncating to the bounded length.
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        let mut text: String = summary.into();
        if text.chars().count() > MAX_SUMMARY_CHARS {
            text = text.chars().take(MAX_SUMMARY_CHARS).collect();
        }
        self.summary = text;
    }

    /// Returns true when the turn budget is exhausted.
    #[must_use]
    pub const fn turns_exhausted(&self) -> bool {
        self.current_turn >= self.max_turns
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

    use super::ContextState;
    use super::TaskState;
    use crate::core::identifiers::CorrelationId;
    use crate::core::limits::MAX_TURNS_CAP;
    use crate::core::time::Timestamp;

    #[test]
    fn terminal_and_resumable_partition() {
        let terminal = [
            TaskState::Completed,
            TaskState::Failed,
            TaskState::Timeout,
            TaskState::Blocked,
            TaskState::Escalated,
        ];
        for state in terminal {
            assert!(state.is_terminal());
            assert!(!state.is_resumable());
        }
        let resumable = [
            TaskState::InputRequired,
            TaskState::Delegating,
            TaskState::Paused,
        ];
        for state in resumable {
            assert!(state.is_resumable());
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn max_turns_is_clamped() {
        let ctx = ContextState::new(CorrelationId::new("job-1"), Timestamp::from_unix_millis(0))
            .with_max_turns(500);
        assert_eq!(ctx.max_turns, MAX_TURNS_CAP);
    }

    #[test]
    fn summary_is_bounded() {
        let mut ctx =
            ContextState::new(CorrelationId::new("job-1"), Timestamp::from_unix_millis(0));
        ctx.set_summary("x".repeat(10_000));
        assert_eq!(ctx.summary.chars().count(), crate::core::limits::MAX_SUMMARY_CHARS);
    }

    #[test]
    fn fresh_context_starts_at_turn_one_version_one() {
        let ctx = ContextState::new(CorrelationId::new("job-1"), Timestamp::from_unix_millis(7));
        assert_eq!(ctx.current_turn, 1);
        assert_eq!(ctx.context_version, 1);
        assert_eq!(ctx.task_state, TaskState::Pending);
        assert!(ctx.resume_token.is_none());
    }
}
