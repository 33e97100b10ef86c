// crates/skillgate-contract/tests/registry_validation.rs
// ============================================================================
// Module: Registry Validation Tests
// Description: Tests for contract loading and cross-reference checks.
// ============================================================================
//! ## Overview
//! Validates that contract documents load from disk, that nonconforming
//! documents are rejected at startup, and that cross-reference checks hold.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::Path;

use skillgate_contract::ContractError;
use skillgate_contract::ContractRegistry;
use skillgate_core::SkillName;

/// Writes a contract document into the directory.
fn write_doc(dir: &Path, file: &str, top_matter: &str) {
    let text = format!("---\n{top_matter}---\n# Contract\nProse body.\n");
    fs::write(dir.join(file), text).unwrap();
}

const NORMALIZE: &str = "\
name: node-normalize\n\
version: \"1.0\"\n\
execution_mode: deterministic\n\
autonomy_level: read\n\
input_schema:\n  type: object\n\
output_schema:\n  type: object\n";

const INFER: &str = "\
name: schema-infer\n\
version: \"1.0\"\n\
execution_mode: advisor_only\n\
autonomy_level: suggest\n\
depends_on:\n  - node-normalize\n\
interaction_outcomes:\n  max_turns: 6\n  supports_resume: true\n\
input_schema:\n  type: object\n\
output_schema:\n  type: object\n";

#[test]
fn loads_documents_and_resolves_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "node-normalize.md", NORMALIZE);
    write_doc(dir.path(), "schema-infer.md", INFER);

    let registry = ContractRegistry::load(dir.path()).unwrap();
    assert_eq!(registry.len(), 2);

    let infer = registry.get(&SkillName::new("schema-infer")).unwrap();
    assert!(infer.execution_mode.requires_advisor_validation());
    assert!(infer.declares_dependency(&SkillName::new("node-normalize")));
    assert_eq!(infer.interaction_outcomes.max_turns, 6);
}

#[test]
fn unknown_skill_lookup_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "node-normalize.md", NORMALIZE);
    let registry = ContractRegistry::load(dir.path()).unwrap();
    let err = registry.get(&SkillName::new("missing")).unwrap_err();
    assert!(matches!(err, ContractError::UnknownSkill(_)));
}

#[test]
fn dangling_dependency_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "schema-infer.md", INFER);
    let err = ContractRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(err, ContractError::CrossRef(_)));
}

#[test]
fn write_autonomy_requires_allowlist_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let implementer = "\
name: node-implement\n\
version: \"1.0\"\n\
execution_mode: hybrid\n\
autonomy_level: implement\n\
input_schema:\n  type: object\n\
output_schema:\n  type: object\n";
    write_doc(dir.path(), "node-implement.md", implementer);
    let err = ContractRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(err, ContractError::CrossRef(_)));
}

#[test]
fn allowlist_requirement_is_satisfiable() {
    let dir = tempfile::tempdir().unwrap();
    let implementer = "\
name: node-implement\n\
version: \"1.0\"\n\
execution_mode: hybrid\n\
autonomy_level: implement\n\
required_artifacts:\n  - name: allowlist.json\n    type: json\n  - name: diff.patch\n    type: patch\n\
input_schema:\n  type: object\n\
output_schema:\n  type: object\n";
    write_doc(dir.path(), "node-implement.md", implementer);
    let registry = ContractRegistry::load(dir.path()).unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn excess_fix_iterations_fail_schema_validation() {
    let dir = tempfile::tempdir().unwrap();
    let fixer = "\
name: node-fix\n\
version: \"1.0\"\n\
execution_mode: hybrid\n\
autonomy_level: suggest\n\
max_fix_iterations: 4\n\
input_schema:\n  type: object\n\
output_schema:\n  type: object\n";
    write_doc(dir.path(), "node-fix.md", fixer);
    let err = ContractRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(err, ContractError::Schema { .. }));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.md"), "---\nname: [unclosed\n---\n").unwrap();
    let err = ContractRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(err, ContractError::Parse { .. }));
}
