// crates/skillgate-runtime/src/advisor.rs
// ============================================================================
// Module: Advisor Validator
// Description: Deterministic validation of advisor-produced output.
// Purpose: Prevent stochastic output from bypassing runtime invariants.
// Dependencies: jsonschema, serde_json, skillgate-contract, skillgate-core,
// skillgate-gates
// ============================================================================

//! ## Overview
//! The advisor is, by construction, a stochastic component. This validator is
//! the deterministic backstop: output must parse against the declared output
//! schema, emitted code must pass the sync-compat gate and a syntax sanity
//! check, accompanying trace maps must pass the trace gate, and every patch
//! path must be contained in the pre-declared allowlist. Any failure marks
//! the invocation failed before side effects commit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonschema::Draft;
use serde_json::Value;

use skillgate_contract::SkillContract;
use skillgate_core::EmittedFile;
use skillgate_core::ErrorEntry;
use skillgate_core::ErrorKind;
use skillgate_core::TraceMap;
use skillgate_gates::Allowlist;
use skillgate_gates::GateReport;
use skillgate_gates::ScopeGate;
use skillgate_gates::SyncGate;
use skillgate_gates::TraceGate;
use skillgate_gates::changed_files_from_patch;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Outcome of advisor validation.
///
/// # Invariants
/// - `errors` is empty iff validation passed.
#[derive(Debug, Clone, Default)]
pub struct AdvisorVerdict {
    /// Structured errors to attach to the execution result.
    pub errors: Vec<ErrorEntry>,
    /// Human-readable log lines for `validation_logs.txt`.
    pub log_lines: Vec<String>,
}

impl AdvisorVerdict {
    /// Returns true when validation passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Folds a gate report into the verdict under the given error kind.
    fn absorb_report(&mut self, kind: ErrorKind, report: &GateReport) {
        if report.passed() {
            return;
        }
        for finding in &report.findings {
            self.errors.push(ErrorEntry::new(
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
            ));
        }
        self.log_lines.push(report.summary());
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Deterministic validator for advisor output.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisorValidator;

impl AdvisorValidator {
    /// Validates advisor output before any side effect.
    ///
    /// `allowlist` is the pre-declared scope, when one exists; a patch with
    /// no declared allowlist is itself a violation.
    #[must_use]
    pub fn validate(
        contract: &SkillContract,
        outputs: &Value,
        emitted_files: &[EmittedFile],
        trace_map: Option<&TraceMap>,
        patch: Option<&str>,
        allowlist: Option<&Allowlist>,
    ) -> AdvisorVerdict {
        let mut verdict = AdvisorVerdict::default();

        Self::check_output_schema(contract, outputs, &mut verdict);
        Self::check_emitted_code(emitted_files, &mut verdict);
        if let Some(map) = trace_map {
            let declared = declared_schema_fields(outputs);
            verdict.absorb_report(ErrorKind::GateError, &TraceGate::evaluate(map, &declared));
        }
        if let Some(diff) = patch {
            Self::check_patch_scope(diff, allowlist, &mut verdict);
        }

        verdict
    }

    /// Validates outputs against the contract's output schema.
    fn check_output_schema(contract: &SkillContract, outputs: &Value, verdict: &mut AdvisorVerdict) {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&contract.output_schema);
        let validator = match validator {
            Ok(validator) => validator,
            Err(err) => {
                verdict.errors.push(ErrorEntry::new(
                    ErrorKind::ContractError,
                    format!("output schema failed to compile: {err}"),
                ));
                return;
            }
        };
        if !validator.is_valid(outputs) {
            let detail = validator
                .iter_errors(outputs)
                .next()
                .map_or_else(|| "output schema validation failed".to_string(), |err| err.to_string());
            verdict
                .errors
                .push(ErrorEntry::new(ErrorKind::ValidationError, detail.clone()));
            verdict.log_lines.push(format!("output schema: {detail}"));
        }
    }

    /// Runs sync-compat and the syntax sanity check over emitted code.
    fn check_emitted_code(emitted_files: &[EmittedFile], verdict: &mut AdvisorVerdict) {
        if emitted_files.is_empty() {
            return;
        }
        let sources: Vec<(String, String)> = emitted_files
            .iter()
            .map(|file| (file.path.clone(), file.content.clone()))
            .collect();
        verdict.absorb_report(ErrorKind::GateError, &SyncGate::evaluate(&sources));
        for file in emitted_files {
            for finding in SyncGate::check_syntax(&file.path, &file.content) {
                verdict.errors.push(ErrorEntry::new(
                    ErrorKind::ValidationError,
                    format!("{}: {} [{}]", finding.pattern, finding.remediation, file.path),
                ));
            }
        }
    }

    /// Checks that every patch path is contained in the declared allowlist.
    fn check_patch_scope(diff: &str, allowlist: Option<&Allowlist>, verdict: &mut AdvisorVerdict) {
        let changed = changed_files_from_patch(diff);
        let Some(allowlist) = allowlist else {
            if !changed.is_empty() {
                verdict.errors.push(ErrorEntry::new(
                    ErrorKind::ScopeViolation,
                    "patch emitted without a pre-declared allowlist",
                ));
            }
            return;
        };
        match ScopeGate::evaluate(allowlist, &changed) {
            Ok(report) => verdict.absorb_report(ErrorKind::ScopeViolation, &report),
            Err(err) => verdict.errors.push(ErrorEntry::new(
                ErrorKind::ParseError,
                format!("allowlist evaluation failed: {err}"),
            )),
        }
    }
}

/// Extracts declared top-level schema fields from advisor outputs.
///
/// Advisor skills that infer a node schema return it under `outputs.schema`
/// with JSON-schema `properties`; those property names are the declared
/// fields the trace map must cover.
#[must_use]
pub fn declared_schema_fields(outputs: &Value) -> Vec<String> {
    outputs
        .get("schema")
        .and_then(|schema| schema.get("properties"))
        .and_then(Value::as_object)
        .map(|properties| properties.keys().cloned().collect())
        .unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
