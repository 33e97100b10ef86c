// crates/skillgate-cli/src/main.rs
// ============================================================================
// Module: Skillgate CLI Entry Point
// Description: Standalone gate runners and the gate orchestration command.
// Purpose: Let external tooling run the gates without the full executor.
// Dependencies: clap, serde_json, skillgate-config, skillgate-contract,
// skillgate-core, skillgate-gates
// ============================================================================

//! ## Overview
//! The `skillgate` binary exposes each gate as a standalone entry point plus
//! a gate orchestration command that runs a contract's gate stack over a
//! correlation's artifact directory. Every command emits machine-readable
//! JSON with a one-line human summary on stderr. Exit codes: 0 pass, 1 gate
//! failure, 2 internal error.
//!
//! Security posture: all file arguments are untrusted input; gates fail
//! closed on unparseable data.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde_json::json;

use skillgate_config::RuntimeSettings;
use skillgate_contract::ContractRegistry;
use skillgate_core::ArtifactKind;
use skillgate_core::CorrelationId;
use skillgate_core::RequiredArtifact;
use skillgate_core::SkillName;
use skillgate_core::TraceMap;
use skillgate_gates::Allowlist;
use skillgate_gates::ArtifactGate;
use skillgate_gates::GateReport;
use skillgate_gates::GateSet;
use skillgate_gates::ScopeGate;
use skillgate_gates::SyncGate;
use skillgate_gates::TraceGate;
use skillgate_gates::changed_files_from_patch;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Skillgate gate runners and orchestration.
#[derive(Debug, Parser)]
#[command(name = "skillgate", version, about = "Contract-first skill gate runner")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single gate standalone.
    #[command(subcommand)]
    Gate(GateCommand),
    /// Run a contract's gate stack over a correlation's artifacts.
    Run(RunCommand),
    /// Validate contract documents.
    #[command(subcommand)]
    Contract(ContractCommand),
    /// Validate runtime settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Standalone gate runners.
#[derive(Debug, Subcommand)]
enum GateCommand {
    /// Scope gate: changed files versus the allowlist.
    Scope(ScopeArgs),
    /// Trace-map gate: evidence coverage and assumption ceiling.
    Trace(TraceArgs),
    /// Sync-compat gate: forbidden constructs in sources.
    Sync(SyncArgs),
    /// Artifact gate: required artifact completeness.
    Artifact(ArtifactArgs),
}

/// Scope gate arguments.
#[derive(Debug, Args)]
struct ScopeArgs {
    /// Path to allowlist.json.
    #[arg(long)]
    allowlist: PathBuf,
    /// Path to a unified diff to extract changed files from.
    #[arg(long)]
    patch: Option<PathBuf>,
    /// Explicit changed file (repeatable).
    #[arg(long = "changed-file")]
    changed_files: Vec<String>,
}

/// Trace gate arguments.
#[derive(Debug, Args)]
struct TraceArgs {
    /// Path to trace_map.json.
    #[arg(long = "trace-map")]
    trace_map: PathBuf,
    /// Declared schema field the map must cover (repeatable).
    #[arg(long = "field")]
    fields: Vec<String>,
}

/// Sync gate arguments.
#[derive(Debug, Args)]
struct SyncArgs {
    /// Source files to scan.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Artifact gate arguments.
#[derive(Debug, Args)]
struct ArtifactArgs {
    /// Artifact directory to check.
    #[arg(long)]
    dir: PathBuf,
    /// Required artifact as `name=kind` (kind: json|patch|text|markdown).
    #[arg(long = "require")]
    requirements: Vec<String>,
}

/// Gate orchestration arguments.
#[derive(Debug, Args)]
struct RunCommand {
    /// Correlation id whose artifacts are checked.
    #[arg(long = "correlation-id")]
    correlation_id: String,
    /// Skill whose contract selects the gates.
    #[arg(long)]
    skill: String,
    /// Directory holding contract documents.
    #[arg(long = "contracts-dir", default_value = "skills")]
    contracts_dir: PathBuf,
    /// Root directory of correlation artifacts.
    #[arg(long = "artifacts-root", default_value = "artifacts")]
    artifacts_root: PathBuf,
    /// Skip the scope gate.
    #[arg(long = "skip-scope")]
    skip_scope: bool,
    /// Skip the trace-map gate.
    #[arg(long = "skip-trace")]
    skip_trace: bool,
    /// Skip the sync-compat gate.
    #[arg(long = "skip-sync")]
    skip_sync: bool,
    /// Skip the artifact gate.
    #[arg(long = "skip-artifact")]
    skip_artifact: bool,
}

/// Contract subcommands.
#[derive(Debug, Subcommand)]
enum ContractCommand {
    /// Load and cross-check every contract document in a directory.
    Validate(ContractValidateArgs),
}

/// Contract validation arguments.
#[derive(Debug, Args)]
struct ContractValidateArgs {
    /// Directory holding contract documents.
    #[arg(long)]
    dir: PathBuf,
}

/// Config subcommands.
#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Validate a settings file.
    Validate(ConfigValidateArgs),
}

/// Config validation arguments.
#[derive(Debug, Args)]
struct ConfigValidateArgs {
    /// Settings file to validate.
    #[arg(long)]
    file: PathBuf,
}

// ============================================================================
// SECTION: Errors and Exit Codes
// ============================================================================

/// Internal CLI failure carrying a user-facing message.
#[derive(Debug)]
struct CliError(String);

impl CliError {
    /// Creates an error with the given message.
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// CLI result type.
type CliResult<T> = Result<T, CliError>;

/// Exit code for gate failures.
const EXIT_GATE_FAILURE: u8 = 1;
/// Exit code for internal errors.
const EXIT_INTERNAL: u8 = 2;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(std::io::stderr(), "skillgate: {}", err.0);
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}

/// Dispatches the parsed command.
fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Gate(gate) => command_gate(&gate),
        Command::Run(run) => command_run(&run),
        Command::Contract(ContractCommand::Validate(args)) => command_contract_validate(&args),
        Command::Config(ConfigCommand::Validate(args)) => command_config_validate(&args),
    }
}

// ============================================================================
// SECTION: Gate Commands
// ============================================================================

/// Runs a standalone gate and maps its report to an exit code.
fn command_gate(command: &GateCommand) -> CliResult<ExitCode> {
    let report = match command {
        GateCommand::Scope(args) => evaluate_scope(args)?,
        GateCommand::Trace(args) => evaluate_trace(args)?,
        GateCommand::Sync(args) => evaluate_sync(args)?,
        GateCommand::Artifact(args) => evaluate_artifact(args)?,
    };
    emit_reports(&[report.clone()])?;
    Ok(report_exit(&[report]))
}

/// Evaluates the scope gate from file arguments.
fn evaluate_scope(args: &ScopeArgs) -> CliResult<GateReport> {
    let allowlist_text = read_text(&args.allowlist)?;
    let allowlist = Allowlist::from_json(&allowlist_text)
        .map_err(|err| CliError::new(err.to_string()))?;
    let mut changed = args.changed_files.clone();
    if let Some(patch_path) = &args.patch {
        let patch = read_text(patch_path)?;
        changed.extend(changed_files_from_patch(&patch));
    }
    changed.sort();
    changed.dedup();
    ScopeGate::evaluate(&allowlist, &changed).map_err(|err| CliError::new(err.to_string()))
}

/// Evaluates the trace gate from file arguments.
fn evaluate_trace(args: &TraceArgs) -> CliResult<GateReport> {
    let text = read_text(&args.trace_map)?;
    let trace_map: TraceMap = serde_json::from_str(&text)
        .map_err(|err| CliError::new(format!("{}: {err}", args.trace_map.display())))?;
    Ok(TraceGate::evaluate(&trace_map, &args.fields))
}

/// Evaluates the sync gate over the given files.
fn evaluate_sync(args: &SyncArgs) -> CliResult<GateReport> {
    let mut sources = Vec::with_capacity(args.files.len());
    for path in &args.files {
        sources.push((path.display().to_string(), read_text(path)?));
    }
    Ok(SyncGate::evaluate(&sources))
}

/// Evaluates the artifact gate from `name=kind` requirements.
fn evaluate_artifact(args: &ArtifactArgs) -> CliResult<GateReport> {
    let mut required = Vec::with_capacity(args.requirements.len());
    for requirement in &args.requirements {
        required.push(parse_requirement(requirement)?);
    }
    Ok(ArtifactGate::evaluate(&args.dir, &required))
}

/// Parses a `name=kind` artifact requirement.
fn parse_requirement(text: &str) -> CliResult<RequiredArtifact> {
    let Some((name, kind)) = text.split_once('=') else {
        return Err(CliError::new(format!(
            "requirement '{text}' must be name=kind"
        )));
    };
    let kind = match kind {
        "json" => ArtifactKind::Json,
        "patch" => ArtifactKind::Patch,
        "text" => ArtifactKind::Text,
        "markdown" => ArtifactKind::Markdown,
        other => {
            return Err(CliError::new(format!(
                "unknown artifact kind '{other}' (expected json|patch|text|markdown)"
            )));
        }
    };
    Ok(RequiredArtifact {
        name: name.to_string(),
        kind,
    })
}

// ============================================================================
// SECTION: Orchestration Command
// ============================================================================

/// Runs the selected gate stack over a correlation's artifact directory.
fn command_run(args: &RunCommand) -> CliResult<ExitCode> {
    let registry = ContractRegistry::load(&args.contracts_dir)
        .map_err(|err| CliError::new(err.to_string()))?;
    let contract = registry
        .get(&SkillName::new(args.skill.clone()))
        .map_err(|err| CliError::new(err.to_string()))?;
    let correlation_id = CorrelationId::new(args.correlation_id.clone());
    let dir = args.artifacts_root.join(correlation_id.as_str());

    let gates = GateSet {
        scope: !args.skip_scope,
        trace: !args.skip_trace,
        sync: !args.skip_sync,
        artifact: !args.skip_artifact,
    };
    let mut reports = Vec::new();

    if gates.scope && contract.autonomy_level.requires_allowlist() {
        let allowlist_path = dir.join("allowlist.json");
        let allowlist = Allowlist::from_json(&read_text(&allowlist_path)?)
            .map_err(|err| CliError::new(err.to_string()))?;
        let changed = match fs::read_to_string(dir.join("diff.patch")) {
            Ok(patch) => changed_files_from_patch(&patch),
            Err(_) => Vec::new(),
        };
        reports.push(
            ScopeGate::evaluate(&allowlist, &changed)
                .map_err(|err| CliError::new(err.to_string()))?,
        );
    }

    if gates.trace {
        if let Ok(text) = fs::read_to_string(dir.join("trace_map.json")) {
            let trace_map: TraceMap = serde_json::from_str(&text)
                .map_err(|err| CliError::new(format!("trace_map.json: {err}")))?;
            reports.push(TraceGate::evaluate(&trace_map, &[]));
        }
    }

    if gates.sync {
        let mut sources = Vec::new();
        collect_python_sources(&dir, &mut sources)?;
        if !sources.is_empty() {
            reports.push(SyncGate::evaluate(&sources));
        }
    }

    if gates.artifact {
        reports.push(ArtifactGate::evaluate(&dir, &contract.required_artifacts));
    }

    emit_reports(&reports)?;
    Ok(report_exit(&reports))
}

/// Collects `.py` sources under the artifact directory.
fn collect_python_sources(
    dir: &Path,
    sources: &mut Vec<(String, String)>,
) -> CliResult<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };
    for entry in entries {
        let entry = entry.map_err(|err| CliError::new(err.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_python_sources(&path, sources)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("py") {
            sources.push((path.display().to_string(), read_text(&path)?));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Validation Commands
// ============================================================================

/// Loads and cross-checks every contract document in a directory.
fn command_contract_validate(args: &ContractValidateArgs) -> CliResult<ExitCode> {
    match ContractRegistry::load(&args.dir) {
        Ok(registry) => {
            let names: Vec<String> = registry
                .names()
                .into_iter()
                .map(ToString::to_string)
                .collect();
            emit_json(&json!({"status": "pass", "skills": names}))?;
            summary(&format!("contracts: pass ({} loaded)", registry.len()))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            emit_json(&json!({"status": "fail", "error": err.to_string()}))?;
            summary(&format!("contracts: fail ({err})"))?;
            Ok(ExitCode::from(EXIT_GATE_FAILURE))
        }
    }
}

/// Validates a settings file.
fn command_config_validate(args: &ConfigValidateArgs) -> CliResult<ExitCode> {
    match RuntimeSettings::from_file(&args.file) {
        Ok(_) => {
            emit_json(&json!({"status": "pass"}))?;
            summary("config: pass")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            emit_json(&json!({"status": "fail", "error": err.to_string()}))?;
            summary(&format!("config: fail ({err})"))?;
            Ok(ExitCode::from(EXIT_GATE_FAILURE))
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Reads a file to text with a path-qualified error.
fn read_text(path: &Path) -> CliResult<String> {
    fs::read_to_string(path)
        .map_err(|err| CliError::new(format!("{}: {err}", path.display())))
}

/// Emits gate reports as JSON plus human summaries.
fn emit_reports(reports: &[GateReport]) -> CliResult<()> {
    emit_json(&json!({
        "reports": reports,
        "passed": reports.iter().all(GateReport::passed),
    }))?;
    for report in reports {
        summary(&report.summary())?;
    }
    Ok(())
}

/// Writes a JSON document to stdout.
fn emit_json(value: &serde_json::Value) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(err.to_string()))?;
    writeln!(std::io::stdout(), "{text}").map_err(|err| CliError::new(err.to_string()))
}

/// Writes a one-line human summary to stderr.
fn summary(line: &str) -> CliResult<()> {
    writeln!(std::io::stderr(), "{line}").map_err(|err| CliError::new(err.to_string()))
}

/// Maps gate reports to the process exit code.
fn report_exit(reports: &[GateReport]) -> ExitCode {
    if reports.iter().all(GateReport::passed) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_GATE_FAILURE)
    }
}
