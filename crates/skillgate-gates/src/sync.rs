// crates/skillgate-gates/src/sync.rs
// ============================================================================
// Module: Sync-Compat Gate
// Description: Forbidden-construct scanning over emitted Python sources.
// Purpose: Enforce the strictly synchronous execution model statically.
// Dependencies: skillgate-core
// ============================================================================

//! ## Overview
//! Skills run in a synchronous worker environment. This gate scans emitted
//! sources for constructs that would break that model: async declarations
//! and primitives, async library dependencies, outbound network calls
//! without an explicit timeout, and background threads spawned without a
//! join. Findings carry the line, the matched pattern, and a remediation.
//!
//! A light syntax sanity check (balanced delimiters, terminated strings) is
//! exposed for the advisor validator; it is not a grammar parser.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::report::GateFinding;
use crate::report::GateKind;
use crate::report::GateReport;

// ============================================================================
// SECTION: Pattern Tables
// ============================================================================

/// Async declarations and primitives, with remediations.
const ASYNC_PATTERNS: [(&str, &str); 4] = [
    ("async def", "rewrite as a plain synchronous function"),
    ("await ", "remove awaitable primitives; call synchronously"),
    ("async with", "use a synchronous context manager"),
    ("async for", "use a synchronous loop"),
];

/// Async library dependencies, matched against import-ish lines.
const ASYNC_DEPENDENCIES: [&str; 6] = [
    "asyncio",
    "aiohttp",
    "trio",
    "anyio",
    "httpx.AsyncClient",
    "aiofiles",
];

/// Outbound call prefixes that require an explicit `timeout=` argument.
const NETWORK_CALLS: [&str; 8] = [
    "requests.get(",
    "requests.post(",
    "requests.put(",
    "requests.delete(",
    "requests.patch(",
    "requests.head(",
    "requests.request(",
    "urllib.request.urlopen(",
];

// ============================================================================
// SECTION: Gate
// ============================================================================

/// The sync-compat gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncGate;

impl SyncGate {
    /// Scans one source file and returns its findings.
    #[must_use]
    pub fn scan_source(path: &str, content: &str) -> Vec<GateFinding> {
        let mut findings = Vec::new();
        let has_join = content.contains(".join(");

        for (number, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim_start();
            if line.starts_with('#') {
                continue;
            }
            let line_no = to_line_number(number);

            for (pattern, remediation) in ASYNC_PATTERNS {
                if line.contains(pattern) {
                    findings.push(
                        GateFinding::new(pattern, remediation)
                            .at_line(line_no)
                            .for_subject(path.to_string()),
                    );
                }
            }

            if line.starts_with("import ") || line.starts_with("from ") || line.contains('(') {
                for dependency in ASYNC_DEPENDENCIES {
                    if line.contains(dependency) {
                        findings.push(
                            GateFinding::new(
                                dependency,
                                "drop the async dependency; use a synchronous client",
                            )
                            .at_line(line_no)
                            .for_subject(path.to_string()),
                        );
                    }
                }
            }

            for call in NETWORK_CALLS {
                if line.contains(call) && !line.contains("timeout=") {
                    findings.push(
                        GateFinding::new(
                            call.trim_end_matches('('),
                            "pass an explicit timeout= to every outbound call",
                        )
                        .at_line(line_no)
                        .for_subject(path.to_string()),
                    );
                }
            }

            if line.contains("threading.Thread(") && !has_join {
                findings.push(
                    GateFinding::new(
                        "threading.Thread",
                        "join spawned threads before returning, or remove them",
                    )
                    .at_line(line_no)
                    .for_subject(path.to_string()),
                );
            }
        }

        findings
    }

    /// Evaluates a set of `(path, content)` sources.
    #[must_use]
    pub fn evaluate(sources: &[(String, String)]) -> GateReport {
        let mut findings = Vec::new();
        for (path, content) in sources {
            findings.extend(Self::scan_source(path, content));
        }
        GateReport::from_findings(GateKind::SyncCompat, findings)
    }

    /// Light syntax sanity check: balanced delimiters, terminated strings.
    ///
    /// Triple-quoted blocks are skipped wholesale; single-line strings must
    /// terminate on their line. This is a shape check for advisor output,
    /// not a grammar parser.
    #[must_use]
    pub fn check_syntax(path: &str, content: &str) -> Vec<GateFinding> {
        let mut findings = Vec::new();
        let mut depth_round: i64 = 0;
        let mut depth_square: i64 = 0;
        let mut depth_curly: i64 = 0;
        let mut in_triple: Option<char> = None;

        for (number, raw_line) in content.lines().enumerate() {
            let line_no = to_line_number(number);
            let mut chars = raw_line.chars().peekable();
            let mut in_string: Option<char> = None;

            while let Some(ch) = chars.next() {
                if let Some(quote) = in_triple {
                    if ch == quote && consume_two(&mut chars, quote) {
                        in_triple = None;
                    }
                    continue;
                }
                if let Some(quote) = in_string {
                    match ch {
                        '\\' => {
                            let _ = chars.next();
                        }
                        c if c == quote => in_string = None,
                        _ => {}
                    }
                    continue;
                }
                match ch {
                    '#' => break,
                    '\'' | '"' => {
                        if chars.peek() == Some(&ch) {
                            let mut lookahead = chars.clone();
                            let _ = lookahead.next();
                            if lookahead.peek() == Some(&ch) {
                                let _ = chars.next();
                                let _ = chars.next();
                                in_triple = Some(ch);
                                continue;
                            }
                        }
                        in_string = Some(ch);
                    }
                    '(' => depth_round += 1,
                    ')' => depth_round -= 1,
                    '[' => depth_square += 1,
                    ']' => depth_square -= 1,
                    '{' => depth_curly += 1,
                    '}' => depth_curly -= 1,
                    _ => {}
                }
            }

            if in_string.is_some() {
                findings.push(
                    GateFinding::new("unterminated_string", "terminate the string literal")
                        .at_line(line_no)
                        .for_subject(path.to_string()),
                );
            }
            if depth_round < 0 || depth_square < 0 || depth_curly < 0 {
                findings.push(
                    GateFinding::new("unbalanced_delimiters", "balance closing delimiters")
                        .at_line(line_no)
                        .for_subject(path.to_string()),
                );
                depth_round = depth_round.max(0);
                depth_square = depth_square.max(0);
                depth_curly = depth_curly.max(0);
            }
        }

        if in_triple.is_some() {
            findings.push(
                GateFinding::new("unterminated_string", "terminate the triple-quoted block")
                    .for_subject(path.to_string()),
            );
        }
        if depth_round > 0 || depth_square > 0 || depth_curly > 0 {
            findings.push(
                GateFinding::new("unbalanced_delimiters", "close all opened delimiters")
                    .for_subject(path.to_string()),
            );
        }
        findings
    }
}

/// Converts a zero-based enumeration index to a one-based line number.
fn to_line_number(index: usize) -> u32 {
    u32::try_from(index.saturating_add(1)).unwrap_or(u32::MAX)
}

/// Consumes two further occurrences of `quote`, reporting success.
fn consume_two(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> bool {
    if chars.peek() == Some(&quote) {
        let mut lookahead = chars.clone();
        let _ = lookahead.next();
        if lookahead.peek() == Some(&quote) {
            let _ = chars.next();
            let _ = chars.next();
            return true;
        }
    }
    false
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

    use super::SyncGate;

    #[test]
    fn clean_synchronous_source_passes() {
        let source = "\
import requests\n\
\n\
def fetch(url):\n\
    return requests.get(url, timeout=30)\n";
        let report = SyncGate::evaluate(&[("nodes/mynode.py".to_string(), source.to_string())]);
        assert!(report.passed(), "report: {report:?}");
    }

    #[test]
    fn async_def_is_reported_with_line() {
        let source = "def ok():\n    pass\n\nasync def bad():\n    pass\n";
        let findings = SyncGate::scan_source("nodes/mynode.py", source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, "async def");
        assert_eq!(findings[0].line, Some(4));
    }

    #[test]
    fn async_dependencies_are_reported() {
        let source = "import asyncio\nfrom aiohttp import ClientSession\n";
        let findings = SyncGate::scan_source("nodes/mynode.py", source);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn network_call_without_timeout_is_reported() {
        let source = "resp = requests.post(url, json=payload)\n";
        let findings = SyncGate::scan_source("nodes/mynode.py", source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, "requests.post");
    }

    #[test]
    fn comments_are_ignored() {
        let source = "# async def documented_example():\n#     await nothing\n";
        assert!(SyncGate::scan_source("nodes/mynode.py", source).is_empty());
    }

    #[test]
    fn unjoined_thread_is_reported() {
        let source = "import threading\nworker = threading.Thread(target=run)\nworker.start()\n";
        let findings = SyncGate::scan_source("nodes/mynode.py", source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern, "threading.Thread");
    }

    #[test]
    fn joined_thread_passes() {
        let source = "\
import threading\n\
worker = threading.Thread(target=run)\n\
worker.start()\n\
worker.join(timeout=5)\n";
        assert!(SyncGate::scan_source("nodes/mynode.py", source).is_empty());
    }

    #[test]
    fn syntax_check_accepts_wellformed_source() {
        let source = "\
def handler(payload):\n\
    \"\"\"Docstring with (unbalanced in prose.\"\"\"\n\
    items = [1, 2, {\"k\": (3, 4)}]\n\
    return items\n";
        assert!(SyncGate::check_syntax("nodes/mynode.py", source).is_empty());
    }

    #[test]
    fn syntax_check_reports_unterminated_string() {
        let findings = SyncGate::check_syntax("x.py", "name = \"unfinished\n");
        assert_eq!(findings[0].pattern, "unterminated_string");
    }

    #[test]
    fn syntax_check_reports_unbalanced_delimiters() {
        let findings = SyncGate::check_syntax("x.py", "items = [1, 2\n");
        assert!(findings.iter().any(|f| f.pattern == "unbalanced_delimiters"));
    }
}
