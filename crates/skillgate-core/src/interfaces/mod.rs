// crates/skillgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Skillgate Interfaces
// Description: Backend-agnostic interfaces for state storage, skills, and promotion.
// Purpose: Define the contract surfaces used by the Skillgate runtime.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the runtime integrates with storage backends and
//! skill implementations without embedding backend-specific details. All
//! operations are strictly synchronous; suspension happens only at turn
//! boundaries through durable state, never inside a skill.
//!
//! Security posture: interface implementations consume untrusted inputs and
//! must fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::context::ContextState;
use crate::core::context::InputRequest;
use crate::core::event::ConversationEvent;
use crate::core::fact::PocketFact;
use crate::core::identifiers::BucketId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::MessageId;
use crate::core::identifiers::SkillName;
use crate::core::time::Timestamp;
use crate::core::token::ResumeToken;
use crate::core::trace::TraceMap;

// ============================================================================
// SECTION: State Store
// ============================================================================

/// State store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Only `BackendUnavailable` is retryable without caller-side changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Compare-and-swap failed: the stored version moved past the caller.
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict {
        /// Version the caller observed.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },
    /// The `(correlation_id, message_id)` pair was already recorded.
    #[error("duplicate message: {0}")]
    DuplicateMessage(String),
    /// Backend temporarily unavailable; the caller may retry.
    #[error("state store unavailable: {0}")]
    BackendUnavailable(String),
    /// Persisted data violates the store schema.
    #[error("state store schema violation: {0}")]
    SchemaViolation(String),
    /// Store I/O error.
    #[error("state store io error: {0}")]
    Io(String),
    /// Persisted data failed integrity verification.
    #[error("state store corruption: {0}")]
    Corrupt(String),
}

/// Durable, versioned state store for correlation contexts.
///
/// Implementations serialize all work on a single correlation id through
/// compare-and-swap on the context version; no other locking is required.
pub trait StateStore: Send + Sync {
    /// Loads the context for a correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_context(&self, correlation_id: &CorrelationId) -> Result<Option<ContextState>, StoreError>;

    /// Writes a context row guarded by the expected version.
    ///
    /// An `expected_version` of zero inserts a fresh context and fails when
    /// one already exists. Returns the new stored version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] when the stored version does
    /// not match `expected_version`.
    fn put_context(&self, ctx: &ContextState, expected_version: u64) -> Result<u64, StoreError>;

    /// Appends an event, trimming the log to the retention bound.
    ///
    /// Returns the store-assigned event identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the append fails.
    fn append_event(&self, event: &ConversationEvent) -> Result<u64, StoreError>;

    /// Returns the retained events for a correlation id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_events(&self, correlation_id: &CorrelationId) -> Result<Vec<ConversationEvent>, StoreError>;

    /// Records a message identifier for deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateMessage`] when the pair already exists.
    fn record_message(
        &self,
        correlation_id: &CorrelationId,
        message_id: &MessageId,
        turn_number: u32,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Upserts a pocket fact, enforcing the per-bucket cap.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_fact(&self, fact: &PocketFact) -> Result<(), StoreError>;

    /// Returns the live facts in a bucket, filtering expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_facts(
        &self,
        correlation_id: &CorrelationId,
        bucket: &BucketId,
        now: Timestamp,
    ) -> Result<Vec<PocketFact>, StoreError>;

    /// Issues a resume token for the given context coordinates.
    fn generate_resume_token(
        &self,
        correlation_id: &CorrelationId,
        version: u64,
        turn: u32,
    ) -> ResumeToken {
        ResumeToken::new(correlation_id.clone(), version, turn)
    }

    /// Validates a resume token against the live context version.
    ///
    /// Accepts iff the context exists and its current version matches the
    /// token's version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the context cannot be loaded.
    fn validate_resume_token(&self, token: &ResumeToken) -> Result<bool, StoreError> {
        let Some(ctx) = self.get_context(&token.correlation_id)? else {
            return Ok(false);
        };
        Ok(ctx.context_version == token.version)
    }

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Skills
// ============================================================================

/// Skill invocation failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SkillFailure {
    /// The skill raised an uncaught internal error.
    #[error("skill internal error: {0}")]
    Internal(String),
    /// The skill rejected its inputs.
    #[error("skill input invalid: {0}")]
    InvalidInput(String),
    /// A dependency invocation was not declared in `depends_on`.
    #[error("undeclared dependency: {0}")]
    UndeclaredDependency(String),
}

/// A source file emitted by a skill.
///
/// # Invariants
/// - `path` is workspace-relative; scope containment is enforced by gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedFile {
    /// Workspace-relative path.
    pub path: String,
    /// File contents.
    pub content: String,
}

/// Inputs handed to a skill invocation.
///
/// # Invariants
/// - `inputs` has passed snapshot hashing before the skill runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillInput {
    /// Correlation identifier of the job.
    pub correlation_id: CorrelationId,
    /// Name of the dispatched skill.
    pub skill: SkillName,
    /// Structured input payload.
    pub inputs: Value,
    /// Turn number of the invocation.
    pub turn: u32,
}

/// Typed outcome of a skill invocation.
///
/// # Invariants
/// - "Needs more input" is an outcome variant, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SkillOutcome {
    /// The skill completed its work.
    Completed {
        /// Structured outputs.
        outputs: Value,
        /// Source files emitted by the skill.
        emitted_files: Vec<EmittedFile>,
        /// Trace map accompanying an inferred schema.
        trace_map: Option<TraceMap>,
        /// Unified diff of performed writes.
        patch: Option<String>,
    },
    /// The skill requires more input to proceed.
    InputRequired {
        /// Structured description of the missing input.
        request: InputRequest,
    },
    /// The skill asks to delegate to another agent.
    ///
    /// Reserved: demoted to `blocked` while routing is disabled.
    Delegated {
        /// Intended delegation target.
        target: SkillName,
    },
}

impl SkillOutcome {
    /// Creates a completed outcome carrying only structured outputs.
    #[must_use]
    pub const fn completed(outputs: Value) -> Self {
        Self::Completed {
            outputs,
            emitted_files: Vec::new(),
            trace_map: None,
            patch: None,
        }
    }
}

/// Restricted invoker handed to skills for dependency calls.
///
/// The handle enforces the declared dependency graph: only skills named in
/// the caller's `depends_on` may be invoked, which breaks the skill/registry
/// reference cycle.
pub trait ExecutorHandle: Send + Sync {
    /// Invokes a declared dependency and returns its structured outputs.
    ///
    /// # Errors
    ///
    /// Returns [`SkillFailure::UndeclaredDependency`] when the target is not
    /// declared, or the dependency's own failure.
    fn invoke_dependency(&self, name: &SkillName, inputs: &Value) -> Result<Value, SkillFailure>;
}

/// A contract-declared unit of work, opaque to the runtime.
///
/// Skills are plain synchronous callables. The runtime supervises each
/// invocation on a worker thread under the contract's hard timeout.
pub trait Skill: Send + Sync {
    /// Invokes the skill with the given input.
    ///
    /// # Errors
    ///
    /// Returns [`SkillFailure`] for internal errors; missing input is
    /// signalled through [`SkillOutcome::InputRequired`].
    fn invoke(
        &self,
        input: SkillInput,
        deps: &dyn ExecutorHandle,
    ) -> Result<SkillOutcome, SkillFailure>;
}

// ============================================================================
// SECTION: Promotion Emitter
// ============================================================================

/// Promotion emission errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// The emitter failed to persist the package.
    #[error("promotion emit error: {0}")]
    Emit(String),
}

/// Kind of learning package emitted after a successful producer turn.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// Golden artifact package from an implementation skill.
    Golden,
    /// Promotion candidate from a successful fix.
    Candidate,
}

/// Emitter for pipeline-visible learning packages.
///
/// The executor only knows to call the emitter; package content is
/// skill-specific.
pub trait PromotionEmitter: Send + Sync {
    /// Emits a package for the given correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError`] when emission fails.
    fn emit(
        &self,
        correlation_id: &CorrelationId,
        skill: &SkillName,
        kind: PromotionKind,
        outputs: &Value,
    ) -> Result<(), PromotionError>;
}

/// Promotion emitter that discards all packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPromotionEmitter;

impl PromotionEmitter for NoopPromotionEmitter {
    fn emit(
        &self,
        _correlation_id: &CorrelationId,
        _skill: &SkillName,
        _kind: PromotionKind,
        _outputs: &Value,
    ) -> Result<(), PromotionError> {
        Ok(())
    }
}
