// crates/skillgate-runtime/src/executor.rs
// ============================================================================
// Module: Skill Executor
// Description: Contract-enforcing dispatch of single skill invocations.
// Purpose: Sequence pre-gates, supervised invocation, validation, post-gates,
// artifact persistence, and CAS context advancement.
// Dependencies: jsonschema, serde_json, skillgate-contract, skillgate-core,
// skillgate-gates, std::{sync, thread, time}
// ============================================================================

//! ## Overview
//! One executor invocation is one turn. The executor resolves the contract,
//! enforces turn and step budgets, snapshots inputs, deduplicates retried
//! messages, runs pre-gates, supervises the skill on a worker thread under
//! the contract's hard timeout, funnels advisor output through the
//! deterministic validator, runs post-gates, persists artifacts, and
//! advances the context with compare-and-swap (retried at most twice).
//!
//! Failure states are persisted so the context stays readable for forensics,
//! but a failed or timed-out turn never bumps the turn counter and never
//! commits outputs beyond `validation_logs.txt`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use jsonschema::Draft;
use serde_json::Value;
use serde_json::json;

use skillgate_contract::ContractError;
use skillgate_contract::ContractRegistry;
use skillgate_contract::SkillContract;
use skillgate_core::ALLOWLIST;
use skillgate_core::AgentStateDetail;
use skillgate_core::ContextState;
use skillgate_core::DIFF_PATCH;
use skillgate_core::REQUEST_SNAPSHOT;
use skillgate_core::TRACE_MAP;
use skillgate_core::ConversationEvent;
use skillgate_core::CorrelationId;
use skillgate_core::EmittedFile;
use skillgate_core::ErrorEntry;
use skillgate_core::ErrorKind;
use skillgate_core::ExecutionResult;
use skillgate_core::ExecutionStatus;
use skillgate_core::InputRequest;
use skillgate_core::MessageId;
use skillgate_core::NoopPromotionEmitter;
use skillgate_core::PocketFact;
use skillgate_core::PromotionEmitter;
use skillgate_core::PromotionKind;
use skillgate_core::Skill;
use skillgate_core::SkillInput;
use skillgate_core::SkillName;
use skillgate_core::SkillOutcome;
use skillgate_core::StateStore;
use skillgate_core::StoreError;
use skillgate_core::TaskState;
use skillgate_core::Timestamp;
use skillgate_core::TraceMap;
use skillgate_core::hashing;
use skillgate_core::hashing::DEFAULT_HASH_ALGORITHM;
use skillgate_core::interfaces::ExecutorHandle;
use skillgate_core::interfaces::SkillFailure;
use skillgate_core::limits::CAS_RETRY_LIMIT;
use skillgate_core::limits::MAX_STEPS;
use skillgate_gates::Allowlist;
use skillgate_gates::ArtifactGate;
use skillgate_gates::GateKind;
use skillgate_gates::GateReport;
use skillgate_gates::ScopeGate;
use skillgate_gates::SyncGate;
use skillgate_gates::TraceGate;
use skillgate_gates::changed_files_from_patch;

use crate::RuntimeError;
use crate::advisor::AdvisorValidator;
use crate::advisor::declared_schema_fields;
use crate::artifacts::FileArtifactStore;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::telemetry::InvocationMetric;
use crate::telemetry::NoopMetrics;
use crate::telemetry::RuntimeMetrics;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved fact bucket holding per-message execution results for replay.
pub const RESULTS_BUCKET: &str = "turn_results";

/// Reserved fact bucket holding partial inputs across paused turns.
pub const INPUTS_BUCKET: &str = "turn_facts";

// ============================================================================
// SECTION: Configuration and Skill Set
// ============================================================================

/// Executor construction settings.
///
/// # Invariants
/// - `router_enabled` defaults to false; delegation is demoted while false.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Root directory for correlation-scoped artifacts.
    pub artifacts_root: PathBuf,
    /// Whether cross-agent routing is enabled.
    pub router_enabled: bool,
}

impl ExecutorConfig {
    /// Creates a config with routing disabled.
    #[must_use]
    pub fn new(artifacts_root: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_root: artifacts_root.into(),
            router_enabled: false,
        }
    }
}

/// Registered skill handlers keyed by name.
///
/// # Invariants
/// - Handlers are opaque to the runtime; contracts are the ground truth.
#[derive(Default, Clone)]
pub struct SkillSet {
    /// Handlers keyed by skill name.
    skills: BTreeMap<SkillName, Arc<dyn Skill>>,
}

impl SkillSet {
    /// Creates an empty skill set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under the given name, replacing any prior one.
    pub fn register(&mut self, name: SkillName, skill: Arc<dyn Skill>) {
        self.skills.insert(name, skill);
    }

    /// Returns the handler registered under the name.
    #[must_use]
    pub fn get(&self, name: &SkillName) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }
}

// ============================================================================
// SECTION: Dependency Handle
// ============================================================================

/// Restricted invoker enforcing the declared dependency graph.
struct DependencyHandle {
    /// Registered handlers.
    skills: Arc<SkillSet>,
    /// Loaded contracts.
    registry: Arc<ContractRegistry>,
    /// Dependencies the calling skill declared.
    allowed: Vec<SkillName>,
    /// Correlation id of the outer invocation.
    correlation_id: CorrelationId,
    /// Turn number of the outer invocation.
    turn: u32,
}

impl ExecutorHandle for DependencyHandle {
    fn invoke_dependency(&self, name: &SkillName, inputs: &Value) -> Result<Value, SkillFailure> {
        if !self.allowed.contains(name) {
            return Err(SkillFailure::UndeclaredDependency(name.to_string()));
        }
        let contract = self
            .registry
            .get(name)
            .map_err(|err| SkillFailure::Internal(err.to_string()))?;
        let skill = self
            .skills
            .get(name)
            .ok_or_else(|| SkillFailure::Internal(format!("no handler for skill '{name}'")))?;
        let nested = DependencyHandle {
            skills: Arc::clone(&self.skills),
            registry: Arc::clone(&self.registry),
            allowed: contract.depends_on.clone(),
            correlation_id: self.correlation_id.clone(),
            turn: self.turn,
        };
        let input = SkillInput {
            correlation_id: self.correlation_id.clone(),
            skill: name.clone(),
            inputs: inputs.clone(),
            turn: self.turn,
        };
        // Dependencies run inside the outer worker thread, so the outer hard
        // timeout bounds the whole invocation tree.
        let outcome = skill.invoke(input, &nested)?;
        match outcome {
            SkillOutcome::Completed { outputs, .. } => {
                validate_against_schema(&contract.output_schema, &outputs)
                    .map_err(SkillFailure::Internal)?;
                Ok(outputs)
            }
            SkillOutcome::InputRequired { .. } => Err(SkillFailure::Internal(format!(
                "dependency '{name}' requested more input"
            ))),
            SkillOutcome::Delegated { .. } => Err(SkillFailure::Internal(format!(
                "dependency '{name}' attempted delegation"
            ))),
        }
    }
}

/// Validates a value against a JSON schema, returning the first violation.
fn validate_against_schema(schema: &Value, value: &Value) -> Result<(), String> {
    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| format!("schema failed to compile: {err}"))?;
    if validator.is_valid(value) {
        return Ok(());
    }
    Err(validator
        .iter_errors(value)
        .next()
        .map_or_else(|| "schema validation failed".to_string(), |err| err.to_string()))
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Deterministic pipeline controller for single skill invocations.
///
/// # Invariants
/// - Constructed with explicit handles; no ambient mutable state.
/// - Context mutations go through compare-and-swap only.
pub struct SkillExecutor {
    /// Loaded contracts.
    registry: Arc<ContractRegistry>,
    /// Durable state store.
    store: Arc<dyn StateStore>,
    /// Registered skill handlers.
    skills: Arc<SkillSet>,
    /// Correlation-scoped artifact store.
    artifacts: FileArtifactStore,
    /// Learning package emitter.
    emitter: Arc<dyn PromotionEmitter>,
    /// Metrics sink.
    metrics: Arc<dyn RuntimeMetrics>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Whether cross-agent routing is enabled.
    router_enabled: bool,
}

impl SkillExecutor {
    /// Creates an executor with noop emitter/metrics and the system clock.
    #[must_use]
    pub fn new(
        registry: Arc<ContractRegistry>,
        store: Arc<dyn StateStore>,
        skills: Arc<SkillSet>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            store,
            skills,
            artifacts: FileArtifactStore::new(config.artifacts_root.clone()),
            emitter: Arc::new(NoopPromotionEmitter),
            metrics: Arc::new(NoopMetrics),
            clock: Arc::new(SystemClock),
            router_enabled: config.router_enabled,
        }
    }

    /// Replaces the promotion emitter.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn PromotionEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn RuntimeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the artifact store used by the executor.
    #[must_use]
    pub const fn artifact_store(&self) -> &FileArtifactStore {
        &self.artifacts
    }

    /// Returns the state store used by the executor.
    #[must_use]
    pub fn state_store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    /// Returns the contract registry used by the executor.
    #[must_use]
    pub fn contract_registry(&self) -> Arc<ContractRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns the clock used by the executor.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Emits a learning package through the configured emitter.
    ///
    /// # Errors
    ///
    /// Returns the emitter's error when emission fails.
    pub fn emit_promotion(
        &self,
        correlation_id: &CorrelationId,
        skill: &SkillName,
        kind: PromotionKind,
    ) -> Result<(), skillgate_core::PromotionError> {
        self.emitter.emit(correlation_id, skill, kind, &Value::Null)
    }

    /// Marks a context escalated, recording the errors for forensics.
    ///
    /// Used by drivers (the fix loop) when a bounded budget is exhausted
    /// outside a single invocation.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when persistence fails.
    pub fn mark_escalated(
        &self,
        correlation_id: &CorrelationId,
        errors: Vec<ErrorEntry>,
    ) -> Result<(), RuntimeError> {
        let Some(ctx) = self.store.get_context(correlation_id)? else {
            return Ok(());
        };
        let now = self.clock.now();
        let log_lines: Vec<String> = errors
            .iter()
            .map(|entry| format!("{}: {}", entry.kind, entry.detail))
            .collect();
        self.artifacts
            .append_validation_log(correlation_id, &log_lines)?;
        let observed = ctx.context_version;
        let _ = self.commit_context(correlation_id, &ctx, observed, |candidate| {
            candidate.task_state = TaskState::Escalated;
            candidate.resume_token = None;
            candidate.agent_state_detail = None;
            candidate.input_request = None;
            candidate.updated_at = now;
        })?;
        let event = ConversationEvent::new(
            correlation_id.clone(),
            "escalated",
            json!({"errors": errors}),
            ctx.current_turn,
            now,
        );
        self.store.append_event(&event)?;
        Ok(())
    }

    /// Executes one skill invocation for the correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] only for defects (store or artifact I/O);
    /// gate failures, timeouts, and validation rejections are results.
    pub fn execute(
        &self,
        skill_name: &SkillName,
        inputs: Value,
        correlation_id: &CorrelationId,
        message_id: Option<MessageId>,
    ) -> Result<ExecutionResult, RuntimeError> {
        let started = Instant::now();
        let contract = match self.registry.get(skill_name) {
            Ok(contract) => contract,
            Err(ContractError::UnknownSkill(name)) => {
                return Ok(ExecutionResult::failed(vec![ErrorEntry::new(
                    ErrorKind::ContractError,
                    format!("unknown skill: {name}"),
                )]));
            }
            Err(err) => return Err(err.into()),
        };

        let now = self.clock.now();
        let (ctx, observed) = self.load_or_create_context(correlation_id, contract, now)?;

        // Budget checks precede everything else.
        if ctx.current_turn >= ctx.max_turns {
            return self.finalize_terminal(
                &ctx,
                observed,
                skill_name,
                TaskState::Escalated,
                ExecutionStatus::Escalated,
                vec![ErrorEntry::new(
                    ErrorKind::Escalation,
                    format!("turn budget exhausted ({} of {})", ctx.current_turn, ctx.max_turns),
                )],
                message_id.as_ref(),
                now,
            );
        }
        if ctx.total_steps >= MAX_STEPS {
            return self.finalize_terminal(
                &ctx,
                observed,
                skill_name,
                TaskState::Escalated,
                ExecutionStatus::Escalated,
                vec![ErrorEntry::new(
                    ErrorKind::Escalation,
                    format!("step budget exhausted ({MAX_STEPS})"),
                )],
                message_id.as_ref(),
                now,
            );
        }

        // Dedupe: replay the stored result for a repeated message id.
        if let Some(mid) = &message_id {
            match self
                .store
                .record_message(correlation_id, mid, ctx.current_turn, now)
            {
                Ok(()) => {}
                Err(StoreError::DuplicateMessage(_)) => {
                    return self.replay_result(correlation_id, mid, now);
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.write_request_snapshot(correlation_id, skill_name, &inputs)?;
        let mut artifacts_written = vec![REQUEST_SNAPSHOT.to_string()];

        let allowlist = self.load_allowlist(correlation_id)?;

        // Pre-gates.
        if let Some(errors) = self.run_pre_gates(contract, &inputs, allowlist.as_ref()) {
            return self.finalize_terminal(
                &ctx,
                observed,
                skill_name,
                TaskState::Failed,
                ExecutionStatus::Failed,
                errors,
                message_id.as_ref(),
                now,
            );
        }

        // Supervised invocation under the contract's hard timeout.
        let outcome = match self.invoke_supervised(contract, skill_name, &inputs, &ctx) {
            Ok(outcome) => outcome,
            Err(InvocationFailure::Timeout) => {
                return self.finalize_terminal(
                    &ctx,
                    observed,
                    skill_name,
                    TaskState::Timeout,
                    ExecutionStatus::Timeout,
                    vec![ErrorEntry::new(
                        ErrorKind::Timeout,
                        format!("skill exceeded {}s hard timeout", contract.timeout_seconds),
                    )],
                    message_id.as_ref(),
                    now,
                );
            }
            Err(InvocationFailure::Skill(detail)) => {
                self.artifacts
                    .append_validation_log(correlation_id, &[detail.clone()])?;
                return self.finalize_terminal(
                    &ctx,
                    observed,
                    skill_name,
                    TaskState::Failed,
                    ExecutionStatus::Failed,
                    vec![ErrorEntry::new(ErrorKind::SkillInternalError, detail)],
                    message_id.as_ref(),
                    now,
                );
            }
        };

        match outcome {
            SkillOutcome::Delegated { target } => self.finalize_terminal(
                &ctx,
                observed,
                skill_name,
                TaskState::Blocked,
                ExecutionStatus::Blocked,
                vec![ErrorEntry::new(
                    ErrorKind::GateError,
                    if self.router_enabled {
                        format!("router_enabled is set but no router is configured (target '{target}')")
                    } else {
                        format!("delegation to '{target}' demoted: routing is disabled")
                    },
                )],
                message_id.as_ref(),
                now,
            ),
            SkillOutcome::InputRequired { request } => self.finalize_input_required(
                &ctx,
                observed,
                skill_name,
                contract,
                &inputs,
                request,
                message_id.as_ref(),
                now,
            ),
            SkillOutcome::Completed {
                outputs,
                emitted_files,
                trace_map,
                patch,
            } => self.finalize_completed(
                &ctx,
                observed,
                skill_name,
                contract,
                CompletedTurn {
                    outputs,
                    emitted_files,
                    trace_map,
                    patch,
                    allowlist,
                },
                &mut artifacts_written,
                message_id.as_ref(),
                now,
                started,
            ),
        }
    }

    // ------------------------------------------------------------------
    // Context handling
    // ------------------------------------------------------------------

    /// Loads the context or creates a fresh one at version 1.
    fn load_or_create_context(
        &self,
        correlation_id: &CorrelationId,
        contract: &SkillContract,
        now: Timestamp,
    ) -> Result<(ContextState, u64), RuntimeError> {
        if let Some(ctx) = self.store.get_context(correlation_id)? {
            let version = ctx.context_version;
            return Ok((ctx, version));
        }
        let ctx = ContextState::new(correlation_id.clone(), now)
            .with_max_turns(contract.interaction_outcomes.max_turns);
        let version = self.store.put_context(&ctx, 0)?;
        let mut stored = ctx;
        stored.context_version = version;
        Ok((stored, version))
    }

    /// Commits a context mutation with bounded CAS retries.
    ///
    /// Returns `None` when the retries are exhausted.
    fn commit_context<F>(
        &self,
        correlation_id: &CorrelationId,
        ctx: &ContextState,
        observed: u64,
        apply: F,
    ) -> Result<Option<u64>, RuntimeError>
    where
        F: Fn(&mut ContextState),
    {
        let mut base = ctx.clone();
        let mut version = observed;
        for _ in 0..=CAS_RETRY_LIMIT {
            let mut candidate = base.clone();
            apply(&mut candidate);
            match self.store.put_context(&candidate, version) {
                Ok(new_version) => return Ok(Some(new_version)),
                Err(StoreError::VersionConflict { .. }) => {
                    match self.store.get_context(correlation_id)? {
                        Some(fresh) => {
                            version = fresh.context_version;
                            base = fresh;
                        }
                        None => return Ok(None),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Snapshot, allowlist, and pre-gates
    // ------------------------------------------------------------------

    /// Persists the hashed request snapshot.
    fn write_request_snapshot(
        &self,
        correlation_id: &CorrelationId,
        skill_name: &SkillName,
        inputs: &Value,
    ) -> Result<(), RuntimeError> {
        let digest = hashing::hash_canonical_json(DEFAULT_HASH_ALGORITHM, inputs)
            .map_err(|err| RuntimeError::Internal(format!("snapshot hash: {err}")))?;
        let snapshot = json!({
            "correlation_id": correlation_id,
            "skill": skill_name,
            "inputs": inputs,
            "input_hash": digest,
        });
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| RuntimeError::Internal(format!("snapshot serialize: {err}")))?;
        self.artifacts
            .write(correlation_id, REQUEST_SNAPSHOT, &bytes)?;
        Ok(())
    }

    /// Loads the declared allowlist artifact, when present.
    fn load_allowlist(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Allowlist>, RuntimeError> {
        let Some(bytes) = self.artifacts.read(correlation_id, ALLOWLIST)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes).to_string();
        match Allowlist::from_json(&text) {
            Ok(allowlist) => Ok(Some(allowlist)),
            Err(err) => Err(RuntimeError::Internal(format!("allowlist: {err}"))),
        }
    }

    /// Runs pre-gates; returns accumulated errors when any gate fails.
    fn run_pre_gates(
        &self,
        contract: &SkillContract,
        inputs: &Value,
        allowlist: Option<&Allowlist>,
    ) -> Option<Vec<ErrorEntry>> {
        let mut errors = Vec::new();

        // Scope pre-check: the declared allowlist must compile before a
        // write-autonomy skill runs.
        if contract.autonomy_level.requires_allowlist() {
            if let Some(allowlist) = allowlist {
                match ScopeGate::evaluate(allowlist, &[]) {
                    Ok(report) => self.metrics.record_gate(GateKind::Scope, report.passed()),
                    Err(err) => {
                        errors.push(ErrorEntry::new(
                            ErrorKind::ParseError,
                            format!("allowlist invalid: {err}"),
                        ));
                    }
                }
            }
        }

        // Sync-compat over source files supplied as inputs.
        if let Some(sources) = input_source_files(inputs) {
            let report = SyncGate::evaluate(&sources);
            self.metrics
                .record_gate(GateKind::SyncCompat, report.passed());
            if !report.passed() {
                errors.extend(report_errors(ErrorKind::GateError, &report));
            }
        }

        if errors.is_empty() { None } else { Some(errors) }
    }

    // ------------------------------------------------------------------
    // Supervised invocation
    // ------------------------------------------------------------------

    /// Invokes the skill on a worker thread under the hard timeout.
    fn invoke_supervised(
        &self,
        contract: &SkillContract,
        skill_name: &SkillName,
        inputs: &Value,
        ctx: &ContextState,
    ) -> Result<SkillOutcome, InvocationFailure> {
        let Some(skill) = self.skills.get(skill_name) else {
            return Err(InvocationFailure::Skill(format!(
                "no handler registered for skill '{skill_name}'"
            )));
        };
        let skill = Arc::clone(skill);
        let handle = DependencyHandle {
            skills: Arc::clone(&self.skills),
            registry: Arc::clone(&self.registry),
            allowed: contract.depends_on.clone(),
            correlation_id: ctx.correlation_id.clone(),
            turn: ctx.current_turn,
        };
        let input = SkillInput {
            correlation_id: ctx.correlation_id.clone(),
            skill: skill_name.clone(),
            inputs: inputs.clone(),
            turn: ctx.current_turn,
        };

        let (sender, receiver) = mpsc::channel();
        let spawn = thread::Builder::new()
            .name(format!("skill-{skill_name}"))
            .spawn(move || {
                let outcome = skill.invoke(input, &handle);
                let _ = sender.send(outcome);
            });
        if let Err(err) = spawn {
            return Err(InvocationFailure::Skill(format!(
                "worker spawn failed: {err}"
            )));
        }

        // On timeout the worker thread is abandoned; partial artifact writes
        // are permitted but the context is not advanced.
        match receiver.recv_timeout(Duration::from_secs(contract.timeout_seconds)) {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(failure)) => Err(InvocationFailure::Skill(failure.to_string())),
            Err(_) => Err(InvocationFailure::Timeout),
        }
    }

    // ------------------------------------------------------------------
    // Finalization paths
    // ------------------------------------------------------------------

    /// Persists a terminal (non-advancing) turn outcome.
    #[allow(clippy::too_many_arguments, reason = "Finalization folds one turn's full state.")]
    fn finalize_terminal(
        &self,
        ctx: &ContextState,
        observed: u64,
        skill_name: &SkillName,
        task_state: TaskState,
        status: ExecutionStatus,
        errors: Vec<ErrorEntry>,
        message_id: Option<&MessageId>,
        now: Timestamp,
    ) -> Result<ExecutionResult, RuntimeError> {
        let log_lines: Vec<String> = errors
            .iter()
            .map(|entry| format!("{}: {}", entry.kind, entry.detail))
            .collect();
        self.artifacts
            .append_validation_log(&ctx.correlation_id, &log_lines)?;

        let committed = self.commit_context(&ctx.correlation_id, ctx, observed, |candidate| {
            candidate.task_state = task_state;
            candidate.total_steps += 1;
            candidate.resume_token = None;
            candidate.agent_state_detail = None;
            candidate.input_request = None;
            candidate.updated_at = now;
        })?;

        let mut errors = errors;
        let mut status = status;
        if committed.is_none() {
            status = ExecutionStatus::Blocked;
            errors.push(ErrorEntry::new(
                ErrorKind::StateConflict,
                "context version moved during finalization",
            ));
        }

        self.append_turn_event(ctx, skill_name, status, now)?;

        let result = ExecutionResult {
            status,
            outputs: Value::Null,
            errors,
            artifacts_written: Vec::new(),
            iterations: None,
            input_request: None,
        };
        self.store_result(&ctx.correlation_id, message_id, &result, now)?;
        Ok(result)
    }

    /// Persists an `input_required` pause with a fresh resume token.
    #[allow(clippy::too_many_arguments, reason = "Finalization folds one turn's full state.")]
    fn finalize_input_required(
        &self,
        ctx: &ContextState,
        observed: u64,
        skill_name: &SkillName,
        contract: &SkillContract,
        inputs: &Value,
        request: InputRequest,
        message_id: Option<&MessageId>,
        now: Timestamp,
    ) -> Result<ExecutionResult, RuntimeError> {
        // The request payload itself is contract-validated when a schema is
        // declared.
        if let Some(schema) = &contract.interaction_outcomes.input_request_jsonschema {
            let as_value = serde_json::to_value(&request)
                .map_err(|err| RuntimeError::Internal(format!("input request: {err}")))?;
            if let Err(detail) = validate_against_schema(schema, &as_value) {
                return self.finalize_terminal(
                    ctx,
                    observed,
                    skill_name,
                    TaskState::Failed,
                    ExecutionStatus::Failed,
                    vec![ErrorEntry::new(
                        ErrorKind::ValidationError,
                        format!("input request rejected: {detail}"),
                    )],
                    message_id,
                    now,
                );
            }
        }

        // Stash the partial inputs so the resume turn can merge them.
        if let Some(map) = inputs.as_object() {
            for (key, value) in map {
                let fact = PocketFact::new(
                    ctx.correlation_id.clone(),
                    INPUTS_BUCKET.into(),
                    key.clone(),
                    value.clone(),
                    now,
                );
                self.store.put_fact(&fact)?;
            }
        }

        let request_for_ctx = request.clone();
        let committed = self.commit_context(&ctx.correlation_id, ctx, observed, move |candidate| {
            let next_version = candidate.context_version + 1;
            let next_turn = candidate.current_turn + 1;
            let token = skillgate_core::ResumeToken::new(
                candidate.correlation_id.clone(),
                next_version,
                next_turn,
            );
            candidate.task_state = TaskState::InputRequired;
            candidate.agent_state_detail = Some(AgentStateDetail::InputRequired);
            candidate.input_request = Some(request_for_ctx.clone());
            candidate.resume_token = Some(token.encode());
            candidate.current_turn = next_turn;
            candidate.total_steps += 1;
            candidate.updated_at = now;
        })?;

        if committed.is_none() {
            return self.finalize_conflict(ctx, skill_name, message_id, now);
        }
        self.append_turn_event(ctx, skill_name, ExecutionStatus::InputRequired, now)?;

        let result = ExecutionResult {
            status: ExecutionStatus::InputRequired,
            outputs: Value::Null,
            errors: Vec::new(),
            artifacts_written: Vec::new(),
            iterations: None,
            input_request: Some(request),
        };
        self.store_result(&ctx.correlation_id, message_id, &result, now)?;
        Ok(result)
    }

    /// Validates, gates, persists, and commits a completed turn.
    #[allow(clippy::too_many_arguments, reason = "Finalization folds one turn's full state.")]
    fn finalize_completed(
        &self,
        ctx: &ContextState,
        observed: u64,
        skill_name: &SkillName,
        contract: &SkillContract,
        turn: CompletedTurn,
        artifacts_written: &mut Vec<String>,
        message_id: Option<&MessageId>,
        now: Timestamp,
        started: Instant,
    ) -> Result<ExecutionResult, RuntimeError> {
        let CompletedTurn {
            outputs,
            emitted_files,
            trace_map,
            patch,
            allowlist,
        } = turn;

        // Advisor validation runs before any side effect for advisor modes.
        if contract.execution_mode.requires_advisor_validation() {
            let verdict = AdvisorValidator::validate(
                contract,
                &outputs,
                &emitted_files,
                trace_map.as_ref(),
                patch.as_deref(),
                allowlist.as_ref(),
            );
            if !verdict.passed() {
                self.artifacts
                    .append_validation_log(&ctx.correlation_id, &verdict.log_lines)?;
                return self.finalize_terminal(
                    ctx,
                    observed,
                    skill_name,
                    TaskState::Failed,
                    ExecutionStatus::Failed,
                    verdict.errors,
                    message_id,
                    now,
                );
            }
        }

        // Post-gates evaluate in memory so a failed turn commits nothing
        // beyond the validation log.
        let mut errors = Vec::new();
        if let Some(map) = &trace_map {
            let declared = declared_schema_fields(&outputs);
            let report = TraceGate::evaluate(map, &declared);
            self.metrics.record_gate(GateKind::TraceMap, report.passed());
            if !report.passed() {
                errors.extend(report_errors(ErrorKind::GateError, &report));
            }
        }
        if !contract.execution_mode.requires_advisor_validation() {
            if !emitted_files.is_empty() {
                let sources: Vec<(String, String)> = emitted_files
                    .iter()
                    .map(|file| (file.path.clone(), file.content.clone()))
                    .collect();
                let report = SyncGate::evaluate(&sources);
                self.metrics
                    .record_gate(GateKind::SyncCompat, report.passed());
                if !report.passed() {
                    errors.extend(report_errors(ErrorKind::GateError, &report));
                }
            }
            if let Some(diff) = &patch {
                errors.extend(self.check_patch_scope(diff, allowlist.as_ref()));
            }
        }
        if !errors.is_empty() {
            return self.finalize_terminal(
                ctx,
                observed,
                skill_name,
                TaskState::Failed,
                ExecutionStatus::Failed,
                errors,
                message_id,
                now,
            );
        }

        // Commit evidence artifacts, then check declared completeness.
        if let Some(map) = &trace_map {
            let bytes = serde_json::to_vec_pretty(map)
                .map_err(|err| RuntimeError::Internal(format!("trace map: {err}")))?;
            self.artifacts.write(&ctx.correlation_id, TRACE_MAP, &bytes)?;
            artifacts_written.push(TRACE_MAP.to_string());
        }
        if let Some(diff) = &patch {
            self.artifacts
                .write(&ctx.correlation_id, DIFF_PATCH, diff.as_bytes())?;
            artifacts_written.push(DIFF_PATCH.to_string());
        }

        let report = ArtifactGate::evaluate(
            &self.artifacts.correlation_dir(&ctx.correlation_id),
            &contract.required_artifacts,
        );
        self.metrics.record_gate(GateKind::Artifact, report.passed());
        if !report.passed() {
            // Committed artifacts stay for forensics; the context does not
            // advance its turn.
            return self.finalize_terminal(
                ctx,
                observed,
                skill_name,
                TaskState::Failed,
                ExecutionStatus::Failed,
                report_errors(ErrorKind::GateError, &report),
                message_id,
                now,
            );
        }

        if contract.autonomy_level.requires_allowlist() {
            if let Err(err) = self.emitter.emit(
                &ctx.correlation_id,
                skill_name,
                PromotionKind::Golden,
                &outputs,
            ) {
                self.artifacts.append_validation_log(
                    &ctx.correlation_id,
                    &[format!("promotion emit failed: {err}")],
                )?;
            }
        }

        let committed = self.commit_context(&ctx.correlation_id, ctx, observed, |candidate| {
            candidate.task_state = TaskState::Completed;
            candidate.current_turn += 1;
            candidate.total_steps += 1;
            candidate.resume_token = None;
            candidate.agent_state_detail = None;
            candidate.input_request = None;
            candidate.updated_at = now;
        })?;
        if committed.is_none() {
            return self.finalize_conflict(ctx, skill_name, message_id, now);
        }

        self.append_turn_event(ctx, skill_name, ExecutionStatus::Success, now)?;
        self.metrics.record_invocation(&InvocationMetric {
            skill: skill_name.clone(),
            status: ExecutionStatus::Success,
            duration: started.elapsed(),
            turn: ctx.current_turn,
        });

        let result = ExecutionResult {
            status: ExecutionStatus::Success,
            outputs,
            errors: Vec::new(),
            artifacts_written: artifacts_written.clone(),
            iterations: None,
            input_request: None,
        };
        self.store_result(&ctx.correlation_id, message_id, &result, now)?;
        Ok(result)
    }

    /// Reports CAS exhaustion as a blocked result.
    fn finalize_conflict(
        &self,
        ctx: &ContextState,
        skill_name: &SkillName,
        message_id: Option<&MessageId>,
        now: Timestamp,
    ) -> Result<ExecutionResult, RuntimeError> {
        self.append_turn_event(ctx, skill_name, ExecutionStatus::Blocked, now)?;
        let result = ExecutionResult {
            status: ExecutionStatus::Blocked,
            outputs: Value::Null,
            errors: vec![ErrorEntry::new(
                ErrorKind::StateConflict,
                "context version conflict after retries",
            )],
            artifacts_written: Vec::new(),
            iterations: None,
            input_request: None,
        };
        self.store_result(&ctx.correlation_id, message_id, &result, now)?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Shared persistence helpers
    // ------------------------------------------------------------------

    /// Appends the per-turn event.
    fn append_turn_event(
        &self,
        ctx: &ContextState,
        skill_name: &SkillName,
        status: ExecutionStatus,
        now: Timestamp,
    ) -> Result<(), RuntimeError> {
        let event = ConversationEvent::new(
            ctx.correlation_id.clone(),
            "turn",
            json!({"skill": skill_name, "status": status}),
            ctx.current_turn,
            now,
        );
        self.store.append_event(&event)?;
        Ok(())
    }

    /// Persists the execution result for idempotent replay.
    fn store_result(
        &self,
        correlation_id: &CorrelationId,
        message_id: Option<&MessageId>,
        result: &ExecutionResult,
        now: Timestamp,
    ) -> Result<(), RuntimeError> {
        let Some(mid) = message_id else {
            return Ok(());
        };
        let value = serde_json::to_value(result)
            .map_err(|err| RuntimeError::Internal(format!("result serialize: {err}")))?;
        let fact = PocketFact::new(
            correlation_id.clone(),
            RESULTS_BUCKET.into(),
            mid.as_str(),
            value,
            now,
        );
        self.store.put_fact(&fact)?;
        Ok(())
    }

    /// Replays the stored result for a duplicated message id.
    fn replay_result(
        &self,
        correlation_id: &CorrelationId,
        message_id: &MessageId,
        now: Timestamp,
    ) -> Result<ExecutionResult, RuntimeError> {
        let facts = self
            .store
            .get_facts(correlation_id, &RESULTS_BUCKET.into(), now)?;
        let stored = facts
            .into_iter()
            .find(|fact| fact.key == message_id.as_str())
            .and_then(|fact| serde_json::from_value::<ExecutionResult>(fact.value).ok());
        match stored {
            Some(result) => Ok(result),
            None => Ok(ExecutionResult::failed(vec![ErrorEntry::new(
                ErrorKind::DuplicateMessage,
                format!("message '{message_id}' was already processed; no stored result"),
            )])),
        }
    }

    /// Checks patch scope for non-advisor skills.
    fn check_patch_scope(&self, diff: &str, allowlist: Option<&Allowlist>) -> Vec<ErrorEntry> {
        let changed = changed_files_from_patch(diff);
        let Some(allowlist) = allowlist else {
            if changed.is_empty() {
                return Vec::new();
            }
            return vec![ErrorEntry::new(
                ErrorKind::ScopeViolation,
                "patch emitted without a pre-declared allowlist",
            )];
        };
        match ScopeGate::evaluate(allowlist, &changed) {
            Ok(report) => {
                self.metrics.record_gate(GateKind::Scope, report.passed());
                if report.passed() {
                    Vec::new()
                } else {
                    report_errors(ErrorKind::ScopeViolation, &report)
                }
            }
            Err(err) => vec![ErrorEntry::new(
                ErrorKind::ParseError,
                format!("allowlist evaluation failed: {err}"),
            )],
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// A completed skill outcome plus the declared allowlist.
struct CompletedTurn {
    /// Structured outputs.
    outputs: Value,
    /// Emitted source files.
    emitted_files: Vec<EmittedFile>,
    /// Optional trace map.
    trace_map: Option<TraceMap>,
    /// Optional unified diff.
    patch: Option<String>,
    /// Declared allowlist, when one exists.
    allowlist: Option<Allowlist>,
}

/// Distinguishes timeout from in-skill failure during supervision.
enum InvocationFailure {
    /// The hard timeout fired.
    Timeout,
    /// The skill failed or could not be started.
    Skill(String),
}

/// Extracts `(path, content)` source files from invocation inputs.
fn input_source_files(inputs: &Value) -> Option<Vec<(String, String)>> {
    let files = inputs.get("source_files")?.as_array()?;
    let mut sources = Vec::new();
    for file in files {
        let path = file.get("path")?.as_str()?;
        let content = file.get("content")?.as_str()?;
        sources.push((path.to_string(), content.to_string()));
    }
    Some(sources)
}

/// Converts gate findings into error entries under the given kind.
fn report_errors(kind: ErrorKind, report: &GateReport) -> Vec<ErrorEntry> {
    report
        .findings
        .iter()
        .map(|finding| {
            ErrorEntry::new(
                kind,
                format!(
                    "{}: {}{}",
                    finding.pattern,
                    finding.remediation,
                    finding
                        .subject
                        .as_ref()
                        .map_or_else(String::new, |subject| format!(" [{subject}]"))
                ),
            )
        })
        .collect()
}
