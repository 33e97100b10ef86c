// crates/skillgate-gates/src/trace.rs
// ============================================================================
// Module: Trace-Map Gate
// Description: Evidence coverage and assumption ceiling enforcement.
// Purpose: Prevent fabricated fields from passing under plausible schemas.
// Dependencies: skillgate-core
// ============================================================================

//! ## Overview
//! The trace-map gate enforces three invariants: every declared schema field
//! appears in at least one trace entry, the assumption share stays at or
//! below the ceiling, and every entry carries non-empty evidence text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use skillgate_core::TraceMap;
use skillgate_core::limits::MAX_ASSUMPTION_RATIO;

use crate::report::GateFinding;
use crate::report::GateKind;
use crate::report::GateReport;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// The trace-map gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceGate;

impl TraceGate {
    /// Evaluates a trace map against the declared schema fields.
    ///
    /// `declared_fields` may be empty when the caller has no schema to check
    /// coverage against; the ratio and evidence invariants still apply.
    #[must_use]
    pub fn evaluate(trace_map: &TraceMap, declared_fields: &[String]) -> GateReport {
        let mut findings = Vec::new();

        let covered = trace_map.covered_fields();
        for field in declared_fields {
            if !covered.contains(&field.as_str()) {
                findings.push(
                    GateFinding::new(
                        "trace_field_missing",
                        "add a trace entry naming the evidence for this field",
                    )
                    .for_subject(field.clone()),
                );
            }
        }

        if !trace_map.within_assumption_ceiling() {
            findings.push(GateFinding::new(
                "trace_assumption_ratio",
                format!(
                    "reduce ASSUMPTION entries to at most {:.0}% (currently {:.0}%)",
                    MAX_ASSUMPTION_RATIO * 100.0,
                    trace_map.assumption_ratio() * 100.0
                ),
            ));
        }

        for (index, entry) in trace_map.trace_entries.iter().enumerate() {
            if entry.evidence.trim().is_empty() {
                findings.push(
                    GateFinding::new(
                        "trace_evidence_empty",
                        "every trace entry must quote or justify its evidence",
                    )
                    .for_subject(format!("trace_entries[{index}]: {}", entry.field_path)),
                );
            }
        }

        GateReport::from_findings(GateKind::TraceMap, findings)
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

    use skillgate_core::CorrelationId;
    use skillgate_core::TraceConfidence;
    use skillgate_core::TraceEntry;
    use skillgate_core::TraceMap;
    use skillgate_core::TraceSource;

    use super::TraceGate;

    fn entry(path: &str, source: TraceSource, evidence: &str) -> TraceEntry {
        TraceEntry {
            field_path: path.to_string(),
            source,
            evidence: evidence.to_string(),
            confidence: TraceConfidence::Medium,
            source_file: None,
            line_range: None,
            excerpt_hash: None,
        }
    }

    fn map_with(entries: Vec<TraceEntry>) -> TraceMap {
        TraceMap {
            correlation_id: CorrelationId::new("job-1"),
            node_type: "MyNode".to_string(),
            trace_entries: entries,
        }
    }

    #[test]
    fn covered_fields_with_evidence_pass() {
        let map = map_with(vec![
            entry("name", TraceSource::SourceCode, "constructor arg"),
            entry("url", TraceSource::ApiDocs, "endpoint table"),
        ]);
        let report = TraceGate::evaluate(&map, &["name".to_string(), "url".to_string()]);
        assert!(report.passed());
    }

    #[test]
    fn uncovered_field_is_reported() {
        let map = map_with(vec![entry("name", TraceSource::SourceCode, "ctor")]);
        let report = TraceGate::evaluate(&map, &["name".to_string(), "missing".to_string()]);
        assert!(!report.passed());
        assert_eq!(report.findings[0].pattern, "trace_field_missing");
        assert_eq!(report.findings[0].subject.as_deref(), Some("missing"));
    }

    #[test]
    fn forty_percent_assumptions_fail() {
        let mut entries = Vec::new();
        for i in 0..4 {
            entries.push(entry(&format!("a{i}"), TraceSource::Assumption, "guessed"));
        }
        for i in 0..6 {
            entries.push(entry(&format!("s{i}"), TraceSource::SourceCode, "seen"));
        }
        let report = TraceGate::evaluate(&map_with(entries), &[]);
        assert!(!report.passed());
        assert!(report
            .findings
            .iter()
            .any(|f| f.pattern == "trace_assumption_ratio"));
    }

    #[test]
    fn empty_evidence_is_reported() {
        let map = map_with(vec![entry("name", TraceSource::SourceCode, "   ")]);
        let report = TraceGate::evaluate(&map, &[]);
        assert!(!report.passed());
        assert_eq!(report.findings[0].pattern, "trace_evidence_empty");
    }
}
