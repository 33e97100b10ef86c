// crates/skillgate-runtime/src/adapter.rs
// ============================================================================
// Module: Agent Adapter
// Description: Message-oriented surface over the skill executor.
// Purpose: Map execution results to task states and manage pause/resume.
// Dependencies: serde_json, skillgate-contract, skillgate-core
// ============================================================================

//! ## Overview
//! The adapter exposes the executor through an `invoke` call carrying a
//! correlation id, a skill name, inputs, and an optional resume token. It
//! validates resume tokens before anything else, injects persisted pocket
//! facts into resumed inputs (caller-supplied values take precedence),
//! enforces per-context turn limits on entry, and maps every execution
//! result onto an [`AgentResponse`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

use skillgate_contract::ContractError;
use skillgate_core::AgentResponse;
use skillgate_core::AgentStateDetail;
use skillgate_core::CorrelationId;
use skillgate_core::ErrorEntry;
use skillgate_core::ErrorKind;
use skillgate_core::ExecutionResult;
use skillgate_core::MessageId;
use skillgate_core::ResponseMetadata;
use skillgate_core::ResumeToken;
use skillgate_core::SkillName;
use skillgate_core::TaskState;

use crate::RuntimeError;
use crate::executor::INPUTS_BUCKET;
use crate::executor::SkillExecutor;

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// One adapter invocation.
///
/// # Invariants
/// - `resume` implies `resume_token` is present.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Skill to dispatch.
    pub skill: SkillName,
    /// Structured inputs.
    pub inputs: Value,
    /// Correlation identifier.
    pub correlation_id: CorrelationId,
    /// Optional message identifier for deduplication.
    pub message_id: Option<MessageId>,
    /// Whether this call resumes a paused context.
    pub resume: bool,
    /// Resume token issued with the paused response.
    pub resume_token: Option<String>,
}

impl Invocation {
    /// Creates a first-turn invocation.
    #[must_use]
    pub fn new(skill: SkillName, inputs: Value, correlation_id: CorrelationId) -> Self {
        Self {
            skill,
            inputs,
            correlation_id,
            message_id: None,
            resume: false,
            resume_token: None,
        }
    }

    /// Attaches a message identifier.
    #[must_use]
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Marks the invocation as a resume carrying the issued token.
    #[must_use]
    pub fn resuming(mut self, token: impl Into<String>) -> Self {
        self.resume = true;
        self.resume_token = Some(token.into());
        self
    }
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Message-oriented adapter over the executor.
///
/// # Invariants
/// - Resume tokens are validated before any state is read or written.
/// - `delegating` is never surfaced while routing is disabled.
pub struct AgentAdapter {
    /// The wrapped executor.
    executor: Arc<SkillExecutor>,
}

impl AgentAdapter {
    /// Creates an adapter over the executor.
    #[must_use]
    pub fn new(executor: Arc<SkillExecutor>) -> Self {
        Self { executor }
    }

    /// Returns the wrapped executor.
    #[must_use]
    pub fn executor(&self) -> Arc<SkillExecutor> {
        Arc::clone(&self.executor)
    }

    /// Invokes a skill and maps the outcome onto an agent response.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] only for defects (store unavailability,
    /// artifact I/O); every policy outcome is an [`AgentResponse`].
    pub fn invoke(&self, invocation: Invocation) -> Result<AgentResponse, RuntimeError> {
        let store = self.executor.state_store();

        // Resume validation precedes everything else.
        let mut inputs = invocation.inputs;
        if invocation.resume {
            let Some(token_text) = invocation.resume_token.as_deref() else {
                return Ok(blocked_conflict("resume requested without a token"));
            };
            let token = match ResumeToken::parse(token_text) {
                Ok(token) => token,
                Err(err) => return Ok(blocked_conflict(format!("resume token invalid: {err}"))),
            };
            if token.correlation_id != invocation.correlation_id {
                return Ok(blocked_conflict(
                    "resume token does not match the correlation id",
                ));
            }
            if !store.validate_resume_token(&token)? {
                return Ok(blocked_conflict("resume token is stale"));
            }
            inputs = self.merge_resume_facts(&invocation.correlation_id, inputs)?;
        }

        // Turn-limit short-circuit on entry.
        let registry = self.executor.contract_registry();
        if let Ok(contract) = registry.get(&invocation.skill) {
            if let Some(ctx) = store.get_context(&invocation.correlation_id)? {
                if ctx.current_turn > contract.interaction_outcomes.max_turns {
                    return Ok(AgentResponse {
                        state: TaskState::Escalated,
                        outputs: Value::Null,
                        errors: vec![ErrorEntry::new(
                            ErrorKind::Escalation,
                            format!(
                                "turn {} exceeds the contract limit of {}",
                                ctx.current_turn, contract.interaction_outcomes.max_turns
                            ),
                        )],
                        input_request: None,
                        metadata: ResponseMetadata::default(),
                    });
                }
            }
        }

        let result = self.executor.execute(
            &invocation.skill,
            inputs,
            &invocation.correlation_id,
            invocation.message_id,
        )?;
        self.to_response(&invocation.correlation_id, &invocation.skill, result)
    }

    /// Shallow-merges persisted pause facts under caller-supplied inputs.
    fn merge_resume_facts(
        &self,
        correlation_id: &CorrelationId,
        inputs: Value,
    ) -> Result<Value, RuntimeError> {
        let store = self.executor.state_store();
        let now = self.executor.clock().now();
        let facts = store.get_facts(correlation_id, &INPUTS_BUCKET.into(), now)?;
        if facts.is_empty() {
            return Ok(inputs);
        }
        let mut merged = Map::new();
        for fact in facts {
            merged.insert(fact.key, fact.value);
        }
        if let Value::Object(supplied) = inputs {
            for (key, value) in supplied {
                merged.insert(key, value);
            }
        }
        Ok(Value::Object(merged))
    }

    /// Maps an execution result onto the caller-facing response.
    fn to_response(
        &self,
        correlation_id: &CorrelationId,
        skill: &SkillName,
        result: ExecutionResult,
    ) -> Result<AgentResponse, RuntimeError> {
        let state = result.status.task_state();
        let mut metadata = ResponseMetadata::default();

        let registry = self.executor.contract_registry();
        match registry.get(skill) {
            Ok(contract) => metadata.mode = Some(contract.execution_mode.as_str().to_string()),
            Err(ContractError::UnknownSkill(_)) => {}
            Err(err) => return Err(err.into()),
        }

        if state.is_resumable() {
            metadata.agent_state = Some(match state {
                TaskState::Delegating => AgentStateDetail::Delegating,
                TaskState::Paused => AgentStateDetail::Paused,
                _ => AgentStateDetail::InputRequired,
            });
            let store = self.executor.state_store();
            if let Some(ctx) = store.get_context(correlation_id)? {
                metadata.resume_token = ctx.resume_token;
            }
        }

        Ok(AgentResponse {
            state,
            outputs: result.outputs,
            errors: result.errors,
            input_request: result.input_request,
            metadata,
        })
    }
}

/// Builds the blocked/state-conflict response used for resume failures.
fn blocked_conflict(detail: impl Into<String>) -> AgentResponse {
    AgentResponse {
        state: TaskState::Blocked,
        outputs: Value::Null,
        errors: vec![ErrorEntry::new(ErrorKind::StateConflict, detail)],
        input_request: None,
        metadata: ResponseMetadata::default(),
    }
}
