// crates/skillgate-gates/src/artifact.rs
// ============================================================================
// Module: Artifact Gate
// Description: Required-artifact completeness checks.
// Purpose: Ensure declared artifacts exist, are non-empty, and match kinds.
// Dependencies: serde_json, skillgate-core, std::fs
// ============================================================================

//! ## Overview
//! The artifact gate walks a contract's `required_artifacts` against the
//! actual artifact directory. Each declared artifact must exist, be
//! non-empty, and match its declared kind: JSON must parse, and patches must
//! carry diff headers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use skillgate_core::ArtifactKind;
use skillgate_core::RequiredArtifact;

use crate::report::GateFinding;
use crate::report::GateKind;
use crate::report::GateReport;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// The artifact completeness gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactGate;

impl ArtifactGate {
    /// Evaluates required artifacts against the artifact directory.
    #[must_use]
    pub fn evaluate(dir: &Path, required: &[RequiredArtifact]) -> GateReport {
        let mut findings = Vec::new();
        for artifact in required {
            let path = dir.join(&artifact.name);
            match fs::read(&path) {
                Err(_) => {
                    findings.push(
                        GateFinding::new(
                            "artifact_missing",
                            "the skill must write this artifact before completing",
                        )
                        .for_subject(artifact.name.clone()),
                    );
                }
                Ok(bytes) if bytes.is_empty() => {
                    findings.push(
                        GateFinding::new("artifact_empty", "declared artifacts must be non-empty")
                            .for_subject(artifact.name.clone()),
                    );
                }
                Ok(bytes) => {
                    if let Some(finding) = kind_mismatch(artifact, &bytes) {
                        findings.push(finding);
                    }
                }
            }
        }
        GateReport::from_findings(GateKind::Artifact, findings)
    }
}

/// Checks artifact bytes against the declared kind.
fn kind_mismatch(artifact: &RequiredArtifact, bytes: &[u8]) -> Option<GateFinding> {
    match artifact.kind {
        ArtifactKind::Json => {
            if serde_json::from_slice::<serde_json::Value>(bytes).is_err() {
                return Some(
                    GateFinding::new("artifact_kind_mismatch", "artifact must be valid JSON")
                        .for_subject(artifact.name.clone()),
                );
            }
            None
        }
        ArtifactKind::Patch => {
            let text = String::from_utf8_lossy(bytes);
            let has_headers = text.contains("+++ ") || text.contains("diff --git");
            if has_headers {
                None
            } else {
                Some(
                    GateFinding::new(
                        "artifact_kind_mismatch",
                        "artifact must be a unified diff with headers",
                    )
                    .for_subject(artifact.name.clone()),
                )
            }
        }
        ArtifactKind::Text | ArtifactKind::Markdown => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
