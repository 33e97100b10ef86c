// crates/skillgate-runtime/src/lib.rs
// ============================================================================
// Module: Skillgate Runtime
// Description: Executor, advisor validator, agent adapter, and fix loop.
// Purpose: Sequence contract-declared skills under machine-checkable gates.
// Dependencies: jsonschema, serde_json, skillgate-contract, skillgate-core,
// skillgate-gates, thiserror
// ============================================================================

//! ## Overview
//! The runtime dispatches skill invocations: it loads the contract, runs
//! pre-gates, supervises the skill under a hard timeout, validates advisor
//! output, runs post-gates, persists artifacts, and advances the context via
//! compare-and-swap. All components are constructed with explicit handles
//! (registry, store, gates); no ambient module-level mutable state exists.
//!
//! Security posture: skill outputs and stored state are untrusted; every
//! invariant is re-checked on the runtime side before side effects commit.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Agent adapter and the task-state protocol.
pub mod adapter;
/// Deterministic validation of advisor output.
pub mod advisor;
/// Correlation-scoped artifact directory store.
pub mod artifacts;
/// Clock seam for caller-supplied time.
pub mod clock;
/// The skill executor.
pub mod executor;
/// Bounded fix loop with structured escalation.
pub mod fix_loop;
/// In-memory state store for development and tests.
pub mod memory_store;
/// Topological pipeline driver.
pub mod pipeline;
/// Dependency-light metrics seam.
pub mod telemetry;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use skillgate_contract::ContractError;
use skillgate_core::StoreError;

use crate::artifacts::ArtifactStoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runtime defects that abort an invocation.
///
/// Gate failures, validation rejections, and timeouts are *results*, not
/// errors; this type covers genuine defects such as store unavailability.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Contract loading or lookup failed fatally.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// State store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Artifact directory operation failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactStoreError),
    /// Unexpected internal defect.
    #[error("runtime internal error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use adapter::AgentAdapter;
pub use adapter::Invocation;
pub use advisor::AdvisorValidator;
pub use artifacts::FileArtifactStore;
pub use clock::Clock;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use executor::ExecutorConfig;
pub use executor::SkillExecutor;
pub use executor::SkillSet;
pub use fix_loop::FixLoop;
pub use fix_loop::FixLoopOutcome;
pub use memory_store::InMemoryStateStore;
pub use pipeline::PipelineDriver;
pub use pipeline::PipelineRun;
pub use pipeline::topological_order;
pub use telemetry::InvocationMetric;
pub use telemetry::NoopMetrics;
pub use telemetry::RuntimeMetrics;
