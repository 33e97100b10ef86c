// crates/skillgate-runtime/src/telemetry.rs
// ============================================================================
// Module: Runtime Telemetry
// Description: Observability hooks for skill dispatch and gate evaluation.
// Purpose: Provide metric events and latency tracking without hard deps.
// Dependencies: skillgate-core, skillgate-gates
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for invocation counters and
//! latency observations. It is intentionally dependency-light so deployments
//! can plug in Prometheus or OpenTelemetry without redesign.
//!
//! Security posture: telemetry must avoid leaking skill outputs or secrets
//! and treat labels as untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use skillgate_core::ExecutionStatus;
use skillgate_core::SkillName;
use skillgate_gates::GateKind;

// ============================================================================
// SECTION: Metric Events
// ============================================================================

/// One completed skill invocation, for counters and latency histograms.
///
/// # Invariants
/// - Labels are stable; values never embed payload data.
#[derive(Debug, Clone)]
pub struct InvocationMetric {
    /// Dispatched skill.
    pub skill: SkillName,
    /// Outcome classification.
    pub status: ExecutionStatus,
    /// Wall time of the invocation.
    pub duration: Duration,
    /// Turn number the invocation ran in.
    pub turn: u32,
}

// ============================================================================
// SECTION: Metrics Interface
// ============================================================================

/// Metrics sink for the runtime.
pub trait RuntimeMetrics: Send + Sync {
    /// Records a completed skill invocation.
    fn record_invocation(&self, metric: &InvocationMetric);

    /// Records one gate evaluation outcome.
    fn record_gate(&self, gate: GateKind, passed: bool);
}

/// Metrics sink that discards all observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl RuntimeMetrics for NoopMetrics {
    fn record_invocation(&self, _metric: &InvocationMetric) {}

    fn record_gate(&self, _gate: GateKind, _passed: bool) {}
}
