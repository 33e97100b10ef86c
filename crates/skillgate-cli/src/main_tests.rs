// crates/skillgate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Unit Tests
// Description: Argument parsing and gate evaluation over temp directories.
// ============================================================================
//! ## Overview
//! Validates argument parsing, requirement parsing, and the in-process exit
//! mapping of gate evaluation.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::process::ExitCode;

use clap::Parser;

use skillgate_core::ArtifactKind;

use crate::Cli;
use crate::Command;
use crate::GateCommand;
use crate::evaluate_artifact;
use crate::evaluate_scope;
use crate::evaluate_sync;
use crate::evaluate_trace;
use crate::parse_requirement;
use crate::report_exit;

#[test]
fn cli_parses_gate_scope_arguments() {
    let cli = Cli::try_parse_from([
        "skillgate",
        "gate",
        "scope",
        "--allowlist",
        "allowlist.json",
        "--changed-file",
        "nodes/mynode.py",
    ])
    .unwrap();
    match cli.command {
        Command::Gate(GateCommand::Scope(args)) => {
            assert_eq!(args.changed_files, vec!["nodes/mynode.py".to_string()]);
            assert!(args.patch.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_parses_run_with_skip_flags() {
    let cli = Cli::try_parse_from([
        "skillgate",
        "run",
        "--correlation-id",
        "job-1",
        "--skill",
        "node-implement",
        "--skip-trace",
        "--skip-sync",
    ])
    .unwrap();
    match cli.command {
        Command::Run(run) => {
            assert_eq!(run.correlation_id, "job-1");
            assert!(run.skip_trace);
            assert!(run.skip_sync);
            assert!(!run.skip_scope);
            assert!(!run.skip_artifact);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn requirement_parsing_accepts_known_kinds() {
    let requirement = parse_requirement("trace_map.json=json").unwrap();
    assert_eq!(requirement.name, "trace_map.json");
    assert_eq!(requirement.kind, ArtifactKind::Json);
    assert!(parse_requirement("diff.patch=patch").is_ok());
    assert!(parse_requirement("notes=unknown").is_err());
    assert!(parse_requirement("no-separator").is_err());
}

#[test]
fn scope_evaluation_reads_patch_and_allowlist() {
    let dir = tempfile::tempdir().unwrap();
    let allowlist = dir.path().join("allowlist.json");
    fs::write(&allowlist, r#"{"patterns": ["nodes/*.py"]}"#).unwrap();
    let patch = dir.path().join("diff.patch");
    fs::write(
        &patch,
        "--- a/nodes/mynode.py\n+++ b/nodes/mynode.py\n@@ -1 +1 @@\n-a\n+b\n",
    )
    .unwrap();

    let args = crate::ScopeArgs {
        allowlist,
        patch: Some(patch),
        changed_files: Vec::new(),
    };
    let report = evaluate_scope(&args).unwrap();
    assert!(report.passed());
    assert_eq!(format!("{:?}", report_exit(&[report])), format!("{:?}", ExitCode::SUCCESS));
}

#[test]
fn sync_evaluation_flags_async_sources() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("node.py");
    fs::write(&source, "async def run():\n    pass\n").unwrap();

    let args = crate::SyncArgs {
        files: vec![source],
    };
    let report = evaluate_sync(&args).unwrap();
    assert!(!report.passed());
}

#[test]
fn trace_evaluation_reports_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let trace_map = dir.path().join("trace_map.json");
    fs::write(
        &trace_map,
        serde_json::json!({
            "correlation_id": "job-1",
            "node_type": "MyNode",
            "trace_entries": [{
                "field_path": "name",
                "source": "SOURCE_CODE",
                "evidence": "constructor",
                "confidence": "high"
            }]
        })
        .to_string(),
    )
    .unwrap();

    let args = crate::TraceArgs {
        trace_map,
        fields: vec!["name".to_string(), "url".to_string()],
    };
    let report = evaluate_trace(&args).unwrap();
    assert!(!report.passed());
}

#[test]
fn artifact_evaluation_checks_requirements() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("allowlist.json"), "{\"patterns\": []}").unwrap();

    let args = crate::ArtifactArgs {
        dir: dir.path().to_path_buf(),
        requirements: vec![
            "allowlist.json=json".to_string(),
            "diff.patch=patch".to_string(),
        ],
    };
    let report = evaluate_artifact(&args).unwrap();
    assert!(!report.passed());
    assert!(report
        .findings
        .iter()
        .any(|finding| finding.subject.as_deref() == Some("diff.patch")));
}
