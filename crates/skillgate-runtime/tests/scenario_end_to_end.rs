// crates/skillgate-runtime/tests/scenario_end_to_end.rs
// ============================================================================
// Module: End-to-End Scenario Tests
// Description: Adapter-driven scenarios over the full executor pipeline.
// ============================================================================
//! ## Overview
//! Drives the executor and adapter through the canonical scenarios:
//! straight-through success, multi-turn input_required with resume,
//! assumption-ceiling breach, scope violation, bounded fix exhaustion,
//! dedupe replay, router prohibition, and hard timeouts.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;

use skillgate_contract::ContractRegistry;
use skillgate_contract::SkillContract;
use skillgate_core::CorrelationId;
use skillgate_core::ErrorKind;
use skillgate_core::ExecutionStatus;
use skillgate_core::InputRequest;
use skillgate_core::MessageId;
use skillgate_core::SkillName;
use skillgate_core::StateStore;
use skillgate_core::TaskState;
use skillgate_core::TraceConfidence;
use skillgate_core::TraceEntry;
use skillgate_core::TraceMap;
use skillgate_core::TraceSource;
use skillgate_core::interfaces::ExecutorHandle;
use skillgate_core::interfaces::Skill;
use skillgate_core::interfaces::SkillFailure;
use skillgate_core::interfaces::SkillInput;
use skillgate_core::interfaces::SkillOutcome;
use skillgate_runtime::AgentAdapter;
use skillgate_runtime::ExecutorConfig;
use skillgate_runtime::FixLoop;
use skillgate_runtime::FixedClock;
use skillgate_runtime::InMemoryStateStore;
use skillgate_runtime::Invocation;
use skillgate_runtime::SkillExecutor;
use skillgate_runtime::SkillSet;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Function-backed skill handler.
struct FnSkill<F>(F);

impl<F> Skill for FnSkill<F>
where
    F: Fn(SkillInput, &dyn ExecutorHandle) -> Result<SkillOutcome, SkillFailure> + Send + Sync,
{
    fn invoke(
        &self,
        input: SkillInput,
        deps: &dyn ExecutorHandle,
    ) -> Result<SkillOutcome, SkillFailure> {
        (self.0)(input, deps)
    }
}

/// Builds a contract from top-matter JSON.
fn contract(top: Value) -> SkillContract {
    serde_json::from_value(top).unwrap()
}

/// Builds a trace entry.
fn trace_entry(path: &str, source: TraceSource) -> TraceEntry {
    TraceEntry {
        field_path: path.to_string(),
        source,
        evidence: "observed in node source".to_string(),
        confidence: TraceConfidence::High,
        source_file: Some("original/node.ts".to_string()),
        line_range: Some("10-20".to_string()),
        excerpt_hash: None,
    }
}

/// Test fixture holding the assembled runtime.
struct Fixture {
    executor: Arc<SkillExecutor>,
    adapter: AgentAdapter,
    store: Arc<InMemoryStateStore>,
    _artifacts_dir: tempfile::TempDir,
}

/// Assembles the registry, skills, store, executor, and adapter.
fn build_fixture(validation_errors: Arc<Mutex<Vec<Value>>>) -> Fixture {
    let contracts = vec![
        contract(json!({
            "name": "node-normalize",
            "version": "1.0",
            "execution_mode": "deterministic",
            "autonomy_level": "read",
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
        contract(json!({
            "name": "schema-infer",
            "version": "1.0",
            "execution_mode": "advisor_only",
            "autonomy_level": "suggest",
            "interaction_outcomes": {"max_turns": 8, "supports_resume": true},
            "input_schema": {"type": "object"},
            "output_schema": {
                "type": "object",
                "required": ["schema"],
                "properties": {"schema": {"type": "object"}}
            }
        })),
        contract(json!({
            "name": "schema-assume",
            "version": "1.0",
            "execution_mode": "advisor_only",
            "autonomy_level": "suggest",
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
        contract(json!({
            "name": "node-implement",
            "version": "1.0",
            "execution_mode": "hybrid",
            "autonomy_level": "implement",
            "required_artifacts": [
                {"name": "allowlist.json", "type": "json"},
                {"name": "diff.patch", "type": "patch"}
            ],
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
        contract(json!({
            "name": "node-fix",
            "version": "1.0",
            "execution_mode": "hybrid",
            "autonomy_level": "suggest",
            "max_fix_iterations": 3,
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
        contract(json!({
            "name": "node-validate",
            "version": "1.0",
            "execution_mode": "deterministic",
            "autonomy_level": "read",
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
        contract(json!({
            "name": "delegator",
            "version": "1.0",
            "execution_mode": "deterministic",
            "autonomy_level": "read",
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
        contract(json!({
            "name": "sleepy",
            "version": "1.0",
            "execution_mode": "deterministic",
            "autonomy_level": "read",
            "timeout_seconds": 1,
            "input_schema": {"type": "object"},
            "output_schema": {"type": "object"}
        })),
    ];
    let registry = Arc::new(ContractRegistry::from_contracts(contracts).unwrap());

    let mut skills = SkillSet::new();
    skills.register(
        SkillName::new("node-normalize"),
        Arc::new(FnSkill(|input: SkillInput, _deps: &dyn ExecutorHandle| {
            let name = input
                .inputs
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(SkillOutcome::completed(
                json!({"normalized": name.to_lowercase()}),
            ))
        })),
    );
    skills.register(
        SkillName::new("schema-infer"),
        Arc::new(FnSkill(|input: SkillInput, _deps: &dyn ExecutorHandle| {
            let mut missing = Vec::new();
            for field in ["parsed_sections", "source_type"] {
                if input.inputs.get(field).is_none() {
                    missing.push(field.to_string());
                }
            }
            if !missing.is_empty() {
                return Ok(SkillOutcome::InputRequired {
                    request: InputRequest::for_fields(missing),
                });
            }
            let trace_map = TraceMap {
                correlation_id: input.correlation_id.clone(),
                node_type: "MyNode".to_string(),
                trace_entries: vec![
                    trace_entry("name", TraceSource::SourceCode),
                    trace_entry("url", TraceSource::ApiDocs),
                ],
            };
            Ok(SkillOutcome::Completed {
                outputs: json!({"schema": {"properties": {"name": {}, "url": {}}}}),
                emitted_files: Vec::new(),
                trace_map: Some(trace_map),
                patch: None,
            })
        })),
    );
    skills.register(
        SkillName::new("schema-assume"),
        Arc::new(FnSkill(|input: SkillInput, _deps: &dyn ExecutorHandle| {
            let mut entries = Vec::new();
            for i in 0..4 {
                entries.push(trace_entry(&format!("a{i}"), TraceSource::Assumption));
            }
            for i in 0..6 {
                entries.push(trace_entry(&format!("s{i}"), TraceSource::SourceCode));
            }
            Ok(SkillOutcome::Completed {
                outputs: json!({"schema": {}}),
                emitted_files: Vec::new(),
                trace_map: Some(TraceMap {
                    correlation_id: input.correlation_id.clone(),
                    node_type: "MyNode".to_string(),
                    trace_entries: entries,
                }),
                patch: None,
            })
        })),
    );
    skills.register(
        SkillName::new("node-implement"),
        Arc::new(FnSkill(|input: SkillInput, _deps: &dyn ExecutorHandle| {
            let target = input
                .inputs
                .get("target_file")
                .and_then(Value::as_str)
                .unwrap_or("nodes/mynode.py");
            let patch = format!(
                "--- a/{target}\n+++ b/{target}\n@@ -1 +1 @@\n-old\n+new\n"
            );
            Ok(SkillOutcome::Completed {
                outputs: json!({"implemented": target}),
                emitted_files: Vec::new(),
                trace_map: None,
                patch: Some(patch),
            })
        })),
    );
    skills.register(
        SkillName::new("node-fix"),
        Arc::new(FnSkill(|input: SkillInput, _deps: &dyn ExecutorHandle| {
            let iteration = input
                .inputs
                .get("iteration")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Ok(SkillOutcome::completed(json!({
                "diff": format!("--- a/nodes/mynode.py\n+++ b/nodes/mynode.py\n@@ -1 +1 @@\n-v{iteration}\n+v{}\n", iteration + 1)
            })))
        })),
    );
    let validate_errors = Arc::clone(&validation_errors);
    skills.register(
        SkillName::new("node-validate"),
        Arc::new(FnSkill(move |_input: SkillInput, _deps: &dyn ExecutorHandle| {
            let errors = validate_errors.lock().unwrap().clone();
            Ok(SkillOutcome::completed(json!({"errors": errors})))
        })),
    );
    skills.register(
        SkillName::new("delegator"),
        Arc::new(FnSkill(|_input: SkillInput, _deps: &dyn ExecutorHandle| {
            Ok(SkillOutcome::Delegated {
                target: SkillName::new("other-agent"),
            })
        })),
    );
    skills.register(
        SkillName::new("sleepy"),
        Arc::new(FnSkill(|_input: SkillInput, _deps: &dyn ExecutorHandle| {
            thread::sleep(Duration::from_millis(1_500));
            Ok(SkillOutcome::completed(json!({"woke": true})))
        })),
    );

    let artifacts_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStateStore::new());
    let executor = Arc::new(
        SkillExecutor::new(
            registry,
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::new(skills),
            &ExecutorConfig::new(artifacts_dir.path()),
        )
        .with_clock(Arc::new(FixedClock::at(1_000))),
    );
    let adapter = AgentAdapter::new(Arc::clone(&executor));
    Fixture {
        executor,
        adapter,
        store,
        _artifacts_dir: artifacts_dir,
    }
}

fn fixture() -> Fixture {
    build_fixture(Arc::new(Mutex::new(Vec::new())))
}

// ============================================================================
// SECTION: S1 — Straight-Through Success
// ============================================================================

#[test]
fn s1_straight_through_success() {
    let fx = fixture();
    let corr = CorrelationId::new("s1");
    let response = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("node-normalize"),
            json!({"name": "MyNode"}),
            corr.clone(),
        ))
        .unwrap();

    assert_eq!(response.state, TaskState::Completed);
    assert_eq!(response.outputs["normalized"], "mynode");
    assert!(response.metadata.resume_token.is_none());

    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.current_turn, 2);
    assert_eq!(ctx.context_version, 2);
    assert_eq!(ctx.task_state, TaskState::Completed);

    let events = fx.store.get_events(&corr).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "turn");
}

// ============================================================================
// SECTION: S2 — Multi-Turn INPUT_REQUIRED
// ============================================================================

#[test]
fn s2_input_required_then_resume() {
    let fx = fixture();
    let corr = CorrelationId::new("X");

    let first = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("schema-infer"),
            json!({}),
            corr.clone(),
        ))
        .unwrap();
    assert_eq!(first.state, TaskState::InputRequired);
    let request = first.input_request.clone().unwrap();
    assert_eq!(
        request.missing_fields,
        vec!["parsed_sections".to_string(), "source_type".to_string()]
    );
    let token = first.metadata.resume_token.clone().unwrap();
    assert!(token.starts_with("ctx:X:"));

    let second = fx
        .adapter
        .invoke(
            Invocation::new(
                SkillName::new("schema-infer"),
                json!({"parsed_sections": {"properties": true}, "source_type": "TYPE1"}),
                corr.clone(),
            )
            .resuming(token),
        )
        .unwrap();
    assert_eq!(second.state, TaskState::Completed, "errors: {:?}", second.errors);
    assert!(second.outputs.get("schema").is_some());

    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.current_turn, 3);
}

#[test]
fn resume_merges_persisted_facts_with_caller_precedence() {
    let fx = fixture();
    let corr = CorrelationId::new("merge");

    let first = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("schema-infer"),
            json!({"source_type": "TYPE1"}),
            corr.clone(),
        ))
        .unwrap();
    assert_eq!(first.state, TaskState::InputRequired);
    assert_eq!(
        first.input_request.unwrap().missing_fields,
        vec!["parsed_sections".to_string()]
    );
    let token = first.metadata.resume_token.unwrap();

    // The resume call supplies only the missing field; source_type is
    // injected from the persisted pause facts.
    let second = fx
        .adapter
        .invoke(
            Invocation::new(
                SkillName::new("schema-infer"),
                json!({"parsed_sections": {"a": 1}}),
                corr.clone(),
            )
            .resuming(token),
        )
        .unwrap();
    assert_eq!(second.state, TaskState::Completed, "errors: {:?}", second.errors);
}

#[test]
fn stale_resume_token_is_blocked() {
    let fx = fixture();
    let corr = CorrelationId::new("stale");

    let first = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("schema-infer"),
            json!({}),
            corr.clone(),
        ))
        .unwrap();
    let token = first.metadata.resume_token.unwrap();

    // Another turn moves the version; the old token must be rejected.
    let _ = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("node-normalize"),
            json!({"name": "Other"}),
            corr.clone(),
        ))
        .unwrap();

    let resumed = fx
        .adapter
        .invoke(
            Invocation::new(
                SkillName::new("schema-infer"),
                json!({"parsed_sections": {}, "source_type": "TYPE1"}),
                corr,
            )
            .resuming(token),
        )
        .unwrap();
    assert_eq!(resumed.state, TaskState::Blocked);
    assert_eq!(resumed.errors[0].kind, ErrorKind::StateConflict);
}

// ============================================================================
// SECTION: S3 — Assumption-Ceiling Breach
// ============================================================================

#[test]
fn s3_assumption_ceiling_breach_fails_without_artifacts() {
    let fx = fixture();
    let corr = CorrelationId::new("s3");

    let response = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("schema-assume"),
            json!({}),
            corr.clone(),
        ))
        .unwrap();

    assert_eq!(response.state, TaskState::Failed);
    assert!(response
        .errors
        .iter()
        .any(|entry| entry.kind == ErrorKind::GateError
            && entry.detail.contains("trace_assumption_ratio")));

    // Nothing beyond the validation log was committed, and the turn did not
    // advance.
    let artifacts = fx.executor.artifact_store();
    assert!(artifacts.read(&corr, "trace_map.json").unwrap().is_none());
    assert!(artifacts.read(&corr, "validation_logs.txt").unwrap().is_some());
    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.current_turn, 1);
    assert_eq!(ctx.task_state, TaskState::Failed);
}

// ============================================================================
// SECTION: S4 — Scope Violation
// ============================================================================

#[test]
fn s4_scope_violation_blocks_the_diff() {
    let fx = fixture();
    let corr = CorrelationId::new("s4");

    fx.executor
        .artifact_store()
        .write(
            &corr,
            "allowlist.json",
            br#"{"patterns": ["nodes/mynode.py"]}"#,
        )
        .unwrap();

    let response = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("node-implement"),
            json!({"target_file": "src/shared/base.py"}),
            corr.clone(),
        ))
        .unwrap();

    assert_eq!(response.state, TaskState::Failed);
    assert!(response
        .errors
        .iter()
        .any(|entry| entry.kind == ErrorKind::ScopeViolation));

    // The diff was not committed and the turn did not advance.
    let diff = fx.executor.artifact_store().read(&corr, "diff.patch").unwrap();
    assert!(diff.is_none());
    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.current_turn, 1);
    assert_eq!(ctx.task_state, TaskState::Failed);
}

#[test]
fn contained_implement_turn_commits_the_diff() {
    let fx = fixture();
    let corr = CorrelationId::new("s4-ok");

    fx.executor
        .artifact_store()
        .write(
            &corr,
            "allowlist.json",
            br#"{"patterns": ["nodes/mynode.py"]}"#,
        )
        .unwrap();

    let response = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("node-implement"),
            json!({"target_file": "nodes/mynode.py"}),
            corr.clone(),
        ))
        .unwrap();

    assert_eq!(response.state, TaskState::Completed, "errors: {:?}", response.errors);
    let diff = fx.executor.artifact_store().read(&corr, "diff.patch").unwrap();
    assert!(diff.is_some());
}

// ============================================================================
// SECTION: S5 — Bounded Fix Exhaustion
// ============================================================================

#[test]
fn s5_fix_loop_escalates_after_three_iterations() {
    let validation_errors = Arc::new(Mutex::new(vec![
        json!({"code": "E1", "message": "still broken"}),
        json!({"code": "E2", "message": "also broken"}),
    ]));
    let fx = build_fixture(Arc::clone(&validation_errors));
    let corr = CorrelationId::new("s5");

    let fix_loop = FixLoop::new(
        fx.adapter.executor(),
        SkillName::new("node-fix"),
        SkillName::new("node-validate"),
    );
    let outcome = fix_loop
        .run(
            &corr,
            validation_errors.lock().unwrap().clone(),
        )
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Escalated);
    assert_eq!(outcome.iterations, 3);

    let report = fx
        .executor
        .artifact_store()
        .read(&corr, "escalation_report.md")
        .unwrap()
        .unwrap();
    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("Escalation Report"));
    assert!(report.contains("E1"));

    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.task_state, TaskState::Escalated);
}

#[test]
fn fix_loop_stops_on_clean_validation() {
    let validation_errors = Arc::new(Mutex::new(vec![json!({"code": "E1"})]));
    let fx = build_fixture(Arc::clone(&validation_errors));
    let corr = CorrelationId::new("s5-clean");

    // The second validation comes back clean.
    let errors_handle = Arc::clone(&validation_errors);
    let initial = validation_errors.lock().unwrap().clone();
    errors_handle.lock().unwrap().clear();

    let fix_loop = FixLoop::new(
        fx.adapter.executor(),
        SkillName::new("node-fix"),
        SkillName::new("node-validate"),
    );
    let outcome = fix_loop.run(&corr, initial).unwrap();
    assert_eq!(outcome.status, ExecutionStatus::Success);
    assert_eq!(outcome.iterations, 1);
}

// ============================================================================
// SECTION: S6 — Dedup Replay
// ============================================================================

#[test]
fn s6_duplicate_message_replays_identically() {
    let fx = fixture();
    let corr = CorrelationId::new("s6");
    let message = MessageId::new("msg-1");

    let first = fx
        .adapter
        .invoke(
            Invocation::new(
                SkillName::new("node-normalize"),
                json!({"name": "MyNode"}),
                corr.clone(),
            )
            .with_message_id(message.clone()),
        )
        .unwrap();
    let events_after_first = fx.store.get_events(&corr).unwrap().len();

    let second = fx
        .adapter
        .invoke(
            Invocation::new(
                SkillName::new("node-normalize"),
                json!({"name": "MyNode"}),
                corr.clone(),
            )
            .with_message_id(message),
        )
        .unwrap();

    assert_eq!(
        serde_json::to_vec(&first.outputs).unwrap(),
        serde_json::to_vec(&second.outputs).unwrap()
    );
    assert_eq!(second.state, TaskState::Completed);
    assert_eq!(fx.store.get_events(&corr).unwrap().len(), events_after_first);

    // Only one turn was consumed.
    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.current_turn, 2);
}

// ============================================================================
// SECTION: Router Prohibition and Budgets
// ============================================================================

#[test]
fn delegation_is_demoted_to_blocked() {
    let fx = fixture();
    let corr = CorrelationId::new("router");
    let response = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("delegator"),
            json!({}),
            corr,
        ))
        .unwrap();
    assert_eq!(response.state, TaskState::Blocked);
    assert_ne!(response.state, TaskState::Delegating);
    assert!(response.errors[0].detail.contains("routing is disabled"));
}

#[test]
fn turn_budget_exhaustion_escalates() {
    let fx = fixture();
    let corr = CorrelationId::new("budget");

    let mut last = None;
    for _ in 0..10 {
        let response = fx
            .adapter
            .invoke(Invocation::new(
                SkillName::new("node-normalize"),
                json!({"name": "MyNode"}),
                corr.clone(),
            ))
            .unwrap();
        let done = response.state == TaskState::Escalated;
        last = Some(response);
        if done {
            break;
        }
    }
    assert_eq!(last.unwrap().state, TaskState::Escalated);

    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.task_state, TaskState::Escalated);
    assert!(ctx.current_turn <= ctx.max_turns);
}

#[test]
fn hard_timeout_produces_timeout_without_advancing() {
    let fx = fixture();
    let corr = CorrelationId::new("slow");
    let response = fx
        .adapter
        .invoke(Invocation::new(SkillName::new("sleepy"), json!({}), corr.clone()))
        .unwrap();
    assert_eq!(response.state, TaskState::Timeout);

    let ctx = fx.store.get_context(&corr).unwrap().unwrap();
    assert_eq!(ctx.task_state, TaskState::Timeout);
    assert_eq!(ctx.current_turn, 1);
}

#[test]
fn unknown_skill_fails_fast() {
    let fx = fixture();
    let response = fx
        .adapter
        .invoke(Invocation::new(
            SkillName::new("missing-skill"),
            json!({}),
            CorrelationId::new("unknown"),
        ))
        .unwrap();
    assert_eq!(response.state, TaskState::Failed);
    assert_eq!(response.errors[0].kind, ErrorKind::ContractError);
}
