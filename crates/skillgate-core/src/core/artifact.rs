// crates/skillgate-core/src/core/artifact.rs
// ============================================================================
// Module: Artifact Model
// Description: Artifact kinds, well-known names, and directory layout.
// Purpose: Keep artifact naming and placement deterministic across components.
// Dependencies: serde, std::path
// ============================================================================

//! ## Overview
//! Artifacts are files written under a per-correlation directory. Required
//! artifacts must exist, match their declared kind, and be non-empty before a
//! skill is considered successful. Fix-loop iterations nest under an
//! iteration-scoped subpath so retries never collide.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CorrelationId;

// ============================================================================
// SECTION: Well-Known Names
// ============================================================================

/// Exact inputs of the invocation, hashed.
pub const REQUEST_SNAPSHOT: &str = "request_snapshot.json";
/// File glob patterns bounding write scope.
pub const ALLOWLIST: &str = "allowlist.json";
/// Evidence map for inferred-schema skills.
pub const TRACE_MAP: &str = "trace_map.json";
/// Git diff of writes performed by the skill.
pub const DIFF_PATCH: &str = "diff.patch";
/// Structured log of gate and validation findings.
pub const VALIDATION_LOGS: &str = "validation_logs.txt";
/// Escalation report written when budgets are exhausted.
pub const ESCALATION_REPORT: &str = "escalation_report.md";

// ============================================================================
// SECTION: Kinds
// ============================================================================

/// Declared artifact kind used by the artifact gate.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// JSON document; must parse.
    Json,
    /// Unified diff; must carry diff headers.
    Patch,
    /// Plain text.
    Text,
    /// Markdown document.
    Markdown,
}

impl ArtifactKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Patch => "patch",
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }
}

/// Required artifact declaration from a skill contract.
///
/// # Invariants
/// - `name` is a bare file name, never a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredArtifact {
    /// Bare artifact file name.
    pub name: String,
    /// Declared kind.
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
}

// ============================================================================
// SECTION: Layout
// ============================================================================

/// Correlation-scoped artifact directory layout.
///
/// # Invariants
/// - All paths are rooted under the configured artifacts root.
/// - Artifact names must be safe relative file names; callers validate before
///   writes occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    /// Root directory holding all correlation subdirectories.
    root: PathBuf,
}

impl ArtifactLayout {
    /// Creates a layout rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the artifacts root directory.
    #[must_use]
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Returns the directory for a correlation id.
    #[must_use]
    pub fn correlation_dir(&self, correlation_id: &CorrelationId) -> PathBuf {
        self.root.join(correlation_id.as_str())
    }

    /// Returns the directory for a fix-loop iteration.
    #[must_use]
    pub fn iteration_dir(&self, correlation_id: &CorrelationId, iteration: u32) -> PathBuf {
        self.correlation_dir(correlation_id)
            .join("fix")
            .join(iteration.to_string())
    }

    /// Returns the path of a named artifact for a correlation id.
    #[must_use]
    pub fn artifact_path(&self, correlation_id: &CorrelationId, name: &str) -> PathBuf {
        self.correlation_dir(correlation_id).join(name)
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

    use std::path::PathBuf;

    use super::ArtifactLayout;
    use crate::core::identifiers::CorrelationId;

    #[test]
    fn layout_nests_by_correlation_and_iteration() {
        let layout = ArtifactLayout::new("artifacts");
        let id = CorrelationId::new("job-1");
        assert_eq!(
            layout.correlation_dir(&id),
            PathBuf::from("artifacts/job-1")
        );
        assert_eq!(
            layout.iteration_dir(&id, 2),
            PathBuf::from("artifacts/job-1/fix/2")
        );
        assert_eq!(
            layout.artifact_path(&id, super::DIFF_PATCH),
            PathBuf::from("artifacts/job-1/diff.patch")
        );
    }
}
