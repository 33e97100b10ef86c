// crates/skillgate-core/src/core/limits.rs
// ============================================================================
// Module: Skillgate Resource Bounds
// Description: Hard limits applied across the runtime.
// Purpose: Centralize the non-negotiable resource bounds for enforcement and tests.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Hard resource bounds. These are runtime invariants, not tunables: contracts
//! may lower some of them (never raise), and configuration cannot exceed them.

// ============================================================================
// SECTION: Bounds
// ============================================================================

/// Maximum distinct skill invocations per correlation id over its lifetime.
pub const MAX_STEPS: u32 = 50;

/// Hard cap on fix-loop iterations; contract overrides may not exceed this.
pub const FIX_LOOP_MAX: u32 = 3;

/// Default maximum turns per context.
pub const DEFAULT_MAX_TURNS: u32 = 8;

/// Absolute cap on turns per context regardless of contract settings.
pub const MAX_TURNS_CAP: u32 = 20;

/// Maximum retained conversation events per correlation id.
pub const MAX_EVENTS: usize = 100;

/// Maximum pocket facts retained per bucket.
pub const MAX_FACTS_PER_BUCKET: usize = 50;

/// Maximum changed files accepted by the scope gate.
pub const MAX_CHANGED_FILES: usize = 20;

/// Default hard timeout for a skill invocation, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Maximum length of the bounded context summary, in characters.
pub const MAX_SUMMARY_CHARS: usize = 2_000;

/// Maximum assumption share accepted by the trace-map gate.
pub const MAX_ASSUMPTION_RATIO: f64 = 0.30;

/// Maximum canonical payload size accepted by hashing helpers, in bytes.
pub const MAX_CANONICAL_JSON_BYTES: usize = 4 * 1024 * 1024;

/// Number of CAS retries performed by the adapter before surfacing a conflict.
pub const CAS_RETRY_LIMIT: u32 = 2;
