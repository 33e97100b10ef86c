// crates/skillgate-core/src/lib.rs
// ============================================================================
// Module: Skillgate Core
// Description: Data model and interface contracts for the Skillgate runtime.
// Purpose: Provide the typed records and trait seams shared by all crates.
// Dependencies: serde, serde_jcs, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Skillgate orchestrates contract-declared skills under machine-checkable
//! gates. This crate holds the typed data model (contexts, events, facts,
//! traces, responses), canonical hashing, redaction, resume tokens, and the
//! backend-agnostic interfaces implemented by state stores and skills.
//!
//! Security posture: all persisted records are treated as untrusted on load,
//! and every store write path passes through redaction.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Core data model records.
pub mod core;
/// Backend-agnostic interfaces for stores, skills, and emitters.
pub mod interfaces;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::artifact::ALLOWLIST;
pub use crate::core::artifact::ArtifactKind;
pub use crate::core::artifact::ArtifactLayout;
pub use crate::core::artifact::DIFF_PATCH;
pub use crate::core::artifact::ESCALATION_REPORT;
pub use crate::core::artifact::REQUEST_SNAPSHOT;
pub use crate::core::artifact::RequiredArtifact;
pub use crate::core::artifact::TRACE_MAP;
pub use crate::core::artifact::VALIDATION_LOGS;
pub use crate::core::context::AgentStateDetail;
pub use crate::core::context::ContextState;
pub use crate::core::context::InputRequest;
pub use crate::core::context::TaskState;
pub use crate::core::error::ErrorEntry;
pub use crate::core::error::ErrorKind;
pub use crate::core::event::ConversationEvent;
pub use crate::core::fact::PocketFact;
pub use crate::core::hashing;
pub use crate::core::hashing::HashAlgorithm;
pub use crate::core::hashing::HashDigest;
pub use crate::core::identifiers::BucketId;
pub use crate::core::identifiers::CorrelationId;
pub use crate::core::identifiers::MessageId;
pub use crate::core::identifiers::SkillName;
pub use crate::core::limits;
pub use crate::core::redaction::RedactionPolicy;
pub use crate::core::response::AgentResponse;
pub use crate::core::response::ExecutionResult;
pub use crate::core::response::ExecutionStatus;
pub use crate::core::response::ResponseMetadata;
pub use crate::core::time::Timestamp;
pub use crate::core::token::ResumeToken;
pub use crate::core::token::ResumeTokenError;
pub use crate::core::trace::TraceConfidence;
pub use crate::core::trace::TraceEntry;
pub use crate::core::trace::TraceMap;
pub use crate::core::trace::TraceSource;
pub use crate::interfaces::EmittedFile;
pub use crate::interfaces::ExecutorHandle;
pub use crate::interfaces::NoopPromotionEmitter;
pub use crate::interfaces::PromotionEmitter;
pub use crate::interfaces::PromotionError;
pub use crate::interfaces::PromotionKind;
pub use crate::interfaces::Skill;
pub use crate::interfaces::SkillFailure;
pub use crate::interfaces::SkillInput;
pub use crate::interfaces::SkillOutcome;
pub use crate::interfaces::StateStore;
pub use crate::interfaces::StoreError;
