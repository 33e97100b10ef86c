// crates/skillgate-core/src/core/trace.rs
// ============================================================================
// Module: Trace Maps
// Description: Evidence records for inferred schema fields.
// Purpose: Make schema inference auditable and bound the assumption share.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Every inferred schema field carries a trace entry naming its evidence
//! source. The assumption share of a trace map is bounded so that plausible
//! but fabricated fields cannot pass the gates under the cover of a
//! complete-looking schema.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CorrelationId;
use crate::core::limits::MAX_ASSUMPTION_RATIO;

// ============================================================================
// SECTION: Sources and Confidence
// ============================================================================

/// Evidence source classification for a trace entry.
///
/// # Invariants
/// - Wire forms are stable, upper-case labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceSource {
    /// Derived from source code.
    SourceCode,
    /// Derived from API documentation.
    ApiDocs,
    /// Assumed without direct evidence.
    Assumption,
}

impl TraceSource {
    /// Returns the stable wire label for the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceCode => "SOURCE_CODE",
            Self::ApiDocs => "API_DOCS",
            Self::Assumption => "ASSUMPTION",
        }
    }
}

/// Confidence level attached to a trace entry.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceConfidence {
    /// Strong direct evidence.
    High,
    /// Reasonable indirect evidence.
    Medium,
    /// Weak or circumstantial evidence.
    Low,
}

// ============================================================================
// SECTION: Entries and Maps
// ============================================================================

/// Evidence record for a single inferred schema field.
///
/// # Invariants
/// - `evidence` must be non-empty to pass the trace gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Dot/bracket path of the schema field.
    pub field_path: String,
    /// Evidence source classification.
    pub source: TraceSource,
    /// Short quote or justification.
    pub evidence: String,
    /// Confidence level.
    pub confidence: TraceConfidence,
    /// Optional source file the evidence was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Optional line range within the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<String>,
    /// Optional hash of the quoted excerpt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt_hash: Option<String>,
}

/// Trace map accompanying an inferred schema.
///
/// # Invariants
/// - The assumption share must not exceed [`MAX_ASSUMPTION_RATIO`] to pass
///   the trace gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMap {
    /// Correlation identifier the map belongs to.
    pub correlation_id: CorrelationId,
    /// Node type the schema describes.
    pub node_type: String,
    /// Evidence entries, one or more per declared field.
    pub trace_entries: Vec<TraceEntry>,
}

impl TraceMap {
    /// Returns the fraction of entries sourced from assumptions.
    ///
    /// An empty map has an assumption ratio of zero.
    #[must_use]
    pub fn assumption_ratio(&self) -> f64 {
        if self.trace_entries.is_empty() {
            return 0.0;
        }
        let assumptions = self
            .trace_entries
            .iter()
            .filter(|entry| entry.source == TraceSource::Assumption)
            .count();
        // Entry counts are far below f64 integer precision.
        assumptions as f64 / self.trace_entries.len() as f64
    }

    /// Returns true when the assumption share is within the permitted bound.
    #[must_use]
    pub fn within_assumption_ceiling(&self) -> bool {
        self.assumption_ratio() <= MAX_ASSUMPTION_RATIO
    }

    /// Returns the field paths covered by at least one entry.
    #[must_use]
    pub fn covered_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .trace_entries
            .iter()
            .map(|entry| entry.field_path.as_str())
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
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

    use super::TraceConfidence;
    use super::TraceEntry;
    use super::TraceMap;
    use super::TraceSource;
    use crate::core::identifiers::CorrelationId;

    fn entry(path: &str, source: TraceSource) -> TraceEntry {
        TraceEntry {
            field_path: path.to_string(),
            source,
            evidence: "seen in source".to_string(),
            confidence: TraceConfidence::High,
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
    fn empty_map_has_zero_ratio() {
        assert_eq!(map_with(Vec::new()).assumption_ratio(), 0.0);
    }

    #[test]
    fn thirty_percent_is_within_ceiling() {
        let mut entries = vec![entry("a", TraceSource::Assumption)];
        for i in 0..9 {
            entries.push(entry(&format!("f{i}"), TraceSource::SourceCode));
        }
        let map = map_with(entries);
        assert!(map.within_assumption_ceiling());
    }

    #[test]
    fn forty_percent_breaches_ceiling() {
        let mut entries = Vec::new();
        for i in 0..4 {
            entries.push(entry(&format!("a{i}"), TraceSource::Assumption));
        }
        for i in 0..6 {
            entries.push(entry(&format!("f{i}"), TraceSource::SourceCode));
        }
        let map = map_with(entries);
        assert!(!map.within_assumption_ceiling());
    }

    #[test]
    fn covered_fields_are_deduplicated() {
        let map = map_with(vec![
            entry("x", TraceSource::SourceCode),
            entry("x", TraceSource::ApiDocs),
            entry("y", TraceSource::SourceCode),
        ]);
        assert_eq!(map.covered_fields(), vec!["x", "y"]);
    }

    #[test]
    fn source_labels_are_stable() {
        assert_eq!(TraceSource::SourceCode.as_str(), "SOURCE_CODE");
        assert_eq!(TraceSource::ApiDocs.as_str(), "API_DOCS");
        assert_eq!(TraceSource::Assumption.as_str(), "ASSUMPTION");
    }
}
