// crates/skillgate-gates/src/report.rs
// ============================================================================
// Module: Gate Reports
// Description: Structured findings produced by gate evaluation.
// Purpose: Keep gate output machine-readable with a human summary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every gate produces a structured report: a pass/fail status plus zero or
//! more findings carrying the matched pattern, an optional line, and a
//! remediation hint. Reports serialize to JSON for tooling and render a
//! one-line human summary for terminals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Kinds and Status
// ============================================================================

/// Identifies which gate produced a report.
///
/// # Invariants
/// - Wire labels are stable snake_case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Changed files versus the allowlist.
    Scope,
    /// Evidence coverage and assumption ceiling.
    TraceMap,
    /// Forbidden constructs in emitted code.
    SyncCompat,
    /// Required artifact completeness.
    Artifact,
}

impl GateKind {
    /// Returns the stable wire label for the gate.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scope => "scope",
            Self::TraceMap => "trace_map",
            Self::SyncCompat => "sync_compat",
            Self::Artifact => "artifact",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate outcome.
///
/// # Invariants
/// - `Fail` implies at least one finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// All invariants held.
    Pass,
    /// One or more invariants were violated.
    Fail,
}

// ============================================================================
// SECTION: Findings and Reports
// ============================================================================

/// A single gate violation.
///
/// # Invariants
/// - `pattern` names the violated rule or matched construct.
/// - `remediation` is actionable, not decorative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFinding {
    /// One-based line number, when the finding is line-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Violated rule or matched construct.
    pub pattern: String,
    /// Actionable remediation hint.
    pub remediation: String,
    /// Subject of the finding (file path, field path, or artifact name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl GateFinding {
    /// Creates a finding without a line number.
    #[must_use]
    pub fn new(pattern: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self {
            line: None,
            pattern: pattern.into(),
            remediation: remediation.into(),
            subject: None,
        }
    }

    /// Attaches a one-based line number.
    #[must_use]
    pub const fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Attaches the finding subject.
    #[must_use]
    pub fn for_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Structured result of one gate evaluation.
///
/// # Invariants
/// - `status` is `Fail` iff `findings` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    /// Producing gate.
    pub gate: GateKind,
    /// Pass/fail outcome.
    pub status: GateStatus,
    /// Accumulated violations.
    pub findings: Vec<GateFinding>,
}

impl GateReport {
    /// Builds a report from accumulated findings.
    #[must_use]
    pub fn from_findings(gate: GateKind, findings: Vec<GateFinding>) -> Self {
        let status = if findings.is_empty() {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        };
        Self {
            gate,
            status,
            findings,
        }
    }

    /// Returns true when the gate passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }

    /// Renders the one-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.status {
            GateStatus::Pass => format!("{} gate: pass", self.gate),
            GateStatus::Fail => format!(
                "{} gate: fail ({} finding{})",
                self.gate,
                self.findings.len(),
                if self.findings.len() == 1 { "" } else { "s" }
            ),
        }
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

    use super::GateFinding;
    use super::GateKind;
    use super::GateReport;
    use super::GateStatus;

    #[test]
    fn empty_findings_pass() {
        let report = GateReport::from_findings(GateKind::Scope, Vec::new());
        assert_eq!(report.status, GateStatus::Pass);
        assert!(report.passed());
        assert_eq!(report.summary(), "scope gate: pass");
    }

    #[test]
    fn findings_fail_with_counted_summary() {
        let report = GateReport::from_findings(
            GateKind::SyncCompat,
            vec![
                GateFinding::new("async def", "rewrite as a synchronous function").at_line(3),
                GateFinding::new("await", "remove awaitable primitives"),
            ],
        );
        assert_eq!(report.status, GateStatus::Fail);
        assert_eq!(report.summary(), "sync_compat gate: fail (2 findings)");
    }
}
