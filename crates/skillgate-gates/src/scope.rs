// crates/skillgate-gates/src/scope.rs
// ============================================================================
// Module: Scope Gate
// Description: Changed-file containment against the declared allowlist.
// Purpose: Keep skills with write autonomy inside their declared file scope.
// Dependencies: globset, serde, serde_json, skillgate-core
// ============================================================================

//! ## Overview
//! The scope gate checks that every changed file matches at least one
//! allowlist glob and that no changed file matches the hardcoded deny-list
//! protecting shared infrastructure. Glob semantics are deliberately
//! narrowed: `**/` spans zero or more directory segments while a single `*`
//! never crosses a path separator. Prior, broader matching false-accepted
//! infrastructure edits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use globset::GlobBuilder;
use globset::GlobSet;
use globset::GlobSetBuilder;
use serde::Deserialize;
use serde::Serialize;

use skillgate_core::limits::MAX_CHANGED_FILES;

use crate::GateError;
use crate::report::GateFinding;
use crate::report::GateKind;
use crate::report::GateReport;

// ============================================================================
// SECTION: Deny List
// ============================================================================

/// Hardcoded deny patterns protecting shared infrastructure.
///
/// # Invariants
/// - Cannot be overridden or widened by contracts.
pub const DENY_PATTERNS: [&str; 6] = [
    "**/shared/**",
    "**/base.py",
    "**/registry.py",
    "**/pyproject.toml",
    "**/requirements*.txt",
    "**/setup.py",
];

// ============================================================================
// SECTION: Allowlist
// ============================================================================

/// Allowlist file payload: `{ "patterns": [glob, ...] }`.
///
/// # Invariants
/// - Patterns use the narrowed glob semantics described in the module
///   overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    /// Permitted file glob patterns.
    pub patterns: Vec<String>,
}

impl Allowlist {
    /// Parses an allowlist from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Invalid`] when the payload does not parse.
    pub fn from_json(text: &str) -> Result<Self, GateError> {
        serde_json::from_str(text)
            .map_err(|err| GateError::Invalid(format!("allowlist.json: {err}")))
    }
}

/// Compiles patterns with literal path separators.
fn compile_globs(patterns: &[String]) -> Result<GlobSet, GateError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|err| GateError::Invalid(format!("invalid glob '{pattern}': {err}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| GateError::Invalid(format!("glob set: {err}")))
}

/// Compiles the hardcoded deny set.
fn compile_deny() -> Result<GlobSet, GateError> {
    let patterns: Vec<String> = DENY_PATTERNS.iter().map(|p| (*p).to_string()).collect();
    compile_globs(&patterns)
}

// ============================================================================
// SECTION: Changed Files
// ============================================================================

/// Extracts changed file paths from a unified diff.
///
/// Paths are taken from `+++ b/<path>` headers; deletions (`+++ /dev/null`)
/// fall back to the `--- a/<path>` header so removed files still count as
/// changes.
#[must_use]
pub fn changed_files_from_patch(patch: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut last_minus: Option<String> = None;
    for line in patch.lines() {
        if let Some(path) = line.strip_prefix("--- a/") {
            last_minus = Some(path.trim().to_string());
        } else if let Some(path) = line.strip_prefix("+++ b/") {
            files.push(path.trim().to_string());
            last_minus = None;
        } else if line.starts_with("+++ /dev/null") {
            if let Some(path) = last_minus.take() {
                files.push(path);
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// The scope gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeGate;

impl ScopeGate {
    /// Evaluates changed files against the allowlist and deny-list.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when the allowlist globs cannot be compiled;
    /// violations are reported through the returned [`GateReport`].
    pub fn evaluate(allowlist: &Allowlist, changed_files: &[String]) -> Result<GateReport, GateError> {
        let allow = compile_globs(&allowlist.patterns)?;
        let deny = compile_deny()?;
        let mut findings = Vec::new();

        if changed_files.len() > MAX_CHANGED_FILES {
            findings.push(
                GateFinding::new(
                    "max_changed_files",
                    format!(
                        "reduce the change to at most {MAX_CHANGED_FILES} files \
                         ({} changed)",
                        changed_files.len()
                    ),
                ),
            );
        }

        for file in changed_files {
            if deny.is_match(file) {
                findings.push(
                    GateFinding::new(
                        "deny_list",
                        "shared infrastructure files may not be modified by skills",
                    )
                    .for_subject(file.clone()),
                );
                continue;
            }
            if !allow.is_match(file) {
                findings.push(
                    GateFinding::new(
                        "allowlist_miss",
                        "add the file to allowlist.json or drop the change",
                    )
                    .for_subject(file.clone()),
                );
            }
        }

        Ok(GateReport::from_findings(GateKind::Scope, findings))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
