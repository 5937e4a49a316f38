//! Run reporting
//!
//! ## HarnessReporter Trait
//!
//! The driver never prints. It calls a `HarnessReporter` at each step of the
//! run, which keeps presentation separate from orchestration. Two reporters
//! ship with the crate:
//!
//! - [`ConsoleReporter`]: colored, human-oriented lines
//! - [`JsonReporter`]: one JSON object per event, for CI

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};

use super::config::HarnessConfig;
use super::driver::{FixtureOutcome, FixtureReport, RunOutcome, RunPhase, TestRun};
use super::error::HarnessError;
use super::fixtures::{FixtureKind, TestFixture};

/// Counts for a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Skipped because the run stopped at an earlier failure
    pub not_run: usize,
    pub duration: Duration,
}

/// Trait for reporting harness progress.
///
/// Implement this trait to customize output format.
pub trait HarnessReporter {
    fn on_run_start(&mut self, _config: &HarnessConfig) {}

    fn on_phase(&mut self, _phase: RunPhase) {}

    /// The converter binary already exists, no build needed
    fn on_build_cached(&mut self, binary: &Path);

    /// The converter binary is missing and is about to be built
    fn on_build_start(&mut self, binary: &Path);

    fn on_build_complete(&mut self, binary: &Path);

    /// Build or discovery failed; no fixture will run
    fn on_setup_error(&mut self, error: &HarnessError);

    fn on_collection_complete(&mut self, negatives: usize, positives: usize);

    fn on_fixture_start(&mut self, fixture: &TestFixture);

    fn on_fixture_complete(&mut self, report: &FixtureReport);

    fn on_run_complete(&mut self, run: &TestRun, summary: &RunSummary);
}

// ============================================================================
// Console reporter
// ============================================================================

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// Default console reporter
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color && !color.is_empty() {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    // Console output is best effort: a closed stdout must not fail the run.
    fn line(&mut self, color: &str, text: &str) {
        let painted = self.paint(color, text);
        let _ = writeln!(self.out, "{painted}");
    }

    fn blank(&mut self) {
        let _ = writeln!(self.out);
    }
}

impl<W: Write> HarnessReporter for ConsoleReporter<W> {
    fn on_run_start(&mut self, _config: &HarnessConfig) {
        let rule = "#".repeat(40);
        self.line(BLUE, &rule);
        self.line(BLUE, "# Running HEIC converter regression suite");
        self.line(BLUE, &rule);
        self.blank();
    }

    fn on_build_cached(&mut self, binary: &Path) {
        self.line(GREEN, &format!("> converter binary found at {}", binary.display()));
    }

    fn on_build_start(&mut self, binary: &Path) {
        self.line(YELLOW, &format!("Building converter {}", binary.display()));
    }

    fn on_build_complete(&mut self, binary: &Path) {
        self.line(GREEN, &format!("> built {}", binary.display()));
    }

    fn on_setup_error(&mut self, error: &HarnessError) {
        self.line(RED, &error.to_string());
    }

    fn on_collection_complete(&mut self, negatives: usize, positives: usize) {
        self.blank();
        if negatives + positives == 0 {
            self.line(YELLOW, "No fixtures collected");
        } else {
            self.line("", &format!("collected {negatives} negative and {positives} positive fixture(s)"));
        }
        self.blank();
    }

    fn on_fixture_start(&mut self, fixture: &TestFixture) {
        let text = match fixture.kind {
            FixtureKind::Negative => format!("> Expecting rejection of {}", fixture.input_name()),
            FixtureKind::Positive => format!("> Converting {}", fixture.input_name()),
        };
        self.line(YELLOW, &text);
    }

    fn on_fixture_complete(&mut self, report: &FixtureReport) {
        match &report.outcome {
            FixtureOutcome::Rejected { exit_code } => {
                self.line(GREEN, &format!("Rejected (exit code {exit_code})"));
            }
            FixtureOutcome::Similar(score) => {
                self.line(CYAN, "> Comparing visual similarity");
                self.line(GREEN, &format!("Similarity: {:.1}%", score.percent()));
            }
            FixtureOutcome::Failed(HarnessError::SimilarityBelowThreshold { score, threshold, .. }) => {
                self.line(CYAN, "> Comparing visual similarity");
                self.line(RED, &format!("Similarity: {:.1}%", score * 100.0));
                self.line(RED, &format!("This is below our acceptance rate of {threshold:.2}!"));
            }
            FixtureOutcome::Failed(HarnessError::ConversionFailure { exit_code, .. }) => {
                self.line(RED, &format!("Converting heic image failed with exit code {exit_code}!"));
            }
            FixtureOutcome::Failed(err) => {
                self.line(RED, &err.to_string());
            }
        }
        self.blank();
    }

    fn on_run_complete(&mut self, run: &TestRun, summary: &RunSummary) {
        let failures: Vec<_> = run.failures().collect();
        if failures.len() > 1 {
            self.line(BOLD_RED, "=================== FAILURES ===================");
            for (fixture, err) in &failures {
                self.line("", &format!("  {} [{}]: {}", fixture.id, err.kind(), err));
            }
            self.blank();
        }

        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(format!("{} passed", summary.passed));
        }
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed));
        }
        if summary.not_run > 0 {
            parts.push(format!("{} not run", summary.not_run));
        }
        if parts.is_empty() {
            parts.push("no fixtures".to_string());
        }

        let color = match run.outcome() {
            RunOutcome::Pass => BOLD_GREEN,
            RunOutcome::Fail => BOLD_RED,
        };
        let mut text = format!(
            "====== {} in {:.2}s ======",
            parts.join(", "),
            summary.duration.as_secs_f64()
        );
        if let Some(id) = run.failing_fixture_id().filter(|_| summary.not_run > 0) {
            text.push_str(&format!(" (stopped at {id})"));
        }
        self.line(color, &text);
    }
}

// ============================================================================
// JSON lines reporter
// ============================================================================

/// Writes one JSON object per line
pub struct JsonReporter<W: Write> {
    out: W,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: Value) {
        let _ = writeln!(self.out, "{value}");
    }
}

fn kind_str(kind: FixtureKind) -> &'static str {
    match kind {
        FixtureKind::Positive => "positive",
        FixtureKind::Negative => "negative",
    }
}

fn error_json(err: &HarnessError) -> Value {
    json!({ "kind": err.kind(), "message": err.to_string() })
}

impl<W: Write> HarnessReporter for JsonReporter<W> {
    fn on_run_start(&mut self, config: &HarnessConfig) {
        self.emit(json!({
            "event": "run_start",
            "binary": config.binary.display().to_string(),
            "fixtures_dir": config.fixtures_dir.display().to_string(),
            "pairing": config.pairing.as_str(),
            "threshold": config.threshold,
        }));
    }

    fn on_phase(&mut self, phase: RunPhase) {
        self.emit(json!({ "event": "phase", "phase": phase.to_string() }));
    }

    fn on_build_cached(&mut self, binary: &Path) {
        self.emit(json!({ "event": "build", "status": "cached", "binary": binary.display().to_string() }));
    }

    fn on_build_start(&mut self, binary: &Path) {
        self.emit(json!({ "event": "build", "status": "started", "binary": binary.display().to_string() }));
    }

    fn on_build_complete(&mut self, binary: &Path) {
        self.emit(json!({ "event": "build", "status": "built", "binary": binary.display().to_string() }));
    }

    fn on_setup_error(&mut self, error: &HarnessError) {
        self.emit(json!({ "event": "setup_error", "error": error_json(error) }));
    }

    fn on_collection_complete(&mut self, negatives: usize, positives: usize) {
        self.emit(json!({ "event": "collected", "negatives": negatives, "positives": positives }));
    }

    fn on_fixture_start(&mut self, _fixture: &TestFixture) {}

    fn on_fixture_complete(&mut self, report: &FixtureReport) {
        let mut value = json!({
            "event": "fixture",
            "id": report.fixture.id,
            "kind": kind_str(report.fixture.kind),
            "input": report.fixture.input_path.display().to_string(),
            "duration_ms": report.duration.as_millis() as u64,
        });
        match &report.outcome {
            FixtureOutcome::Rejected { exit_code } => {
                value["status"] = json!("passed");
                value["exit_code"] = json!(exit_code);
            }
            FixtureOutcome::Similar(score) => {
                value["status"] = json!("passed");
                value["score"] = json!(score.value);
            }
            FixtureOutcome::Failed(err) => {
                value["status"] = json!("failed");
                if let HarnessError::SimilarityBelowThreshold { score, .. } = err {
                    value["score"] = json!(score);
                }
                value["error"] = error_json(err);
            }
        }
        self.emit(value);
    }

    fn on_run_complete(&mut self, run: &TestRun, summary: &RunSummary) {
        let outcome = match run.outcome() {
            RunOutcome::Pass => "pass",
            RunOutcome::Fail => "fail",
        };
        self.emit(json!({
            "event": "run_complete",
            "outcome": outcome,
            "failing_fixture": run.failing_fixture_id(),
            "setup_error": run.setup_error().map(error_json),
            "total": summary.total,
            "passed": summary.passed,
            "failed": summary.failed,
            "not_run": summary.not_run,
            "duration_s": summary.duration.as_secs_f64(),
        }));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::harness::similarity::SimilarityScore;
    use std::path::PathBuf;

    /// Records what the driver told it, for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingReporter {
        pub phases: Vec<RunPhase>,
        pub collected: Option<(usize, usize)>,
        pub started: Vec<String>,
        pub completed: Vec<String>,
        pub setup_errors: usize,
        pub build_events: Vec<&'static str>,
    }

    impl HarnessReporter for RecordingReporter {
        fn on_phase(&mut self, phase: RunPhase) {
            self.phases.push(phase);
        }
        fn on_build_cached(&mut self, _: &Path) {
            self.build_events.push("cached");
        }
        fn on_build_start(&mut self, _: &Path) {
            self.build_events.push("start");
        }
        fn on_build_complete(&mut self, _: &Path) {
            self.build_events.push("built");
        }
        fn on_setup_error(&mut self, _: &HarnessError) {
            self.setup_errors += 1;
        }
        fn on_collection_complete(&mut self, negatives: usize, positives: usize) {
            self.collected = Some((negatives, positives));
        }
        fn on_fixture_start(&mut self, fixture: &TestFixture) {
            self.started.push(fixture.id.clone());
        }
        fn on_fixture_complete(&mut self, report: &FixtureReport) {
            self.completed.push(report.fixture.id.clone());
        }
        fn on_run_complete(&mut self, _: &TestRun, _: &RunSummary) {}
    }

    fn positive(id: &str) -> TestFixture {
        TestFixture::positive(
            id,
            PathBuf::from(format!("/f/{id}.heic")),
            PathBuf::from(format!("/f/{id}_ref.jpg")),
        )
    }

    fn report(fixture: TestFixture, outcome: FixtureOutcome) -> FixtureReport {
        FixtureReport {
            fixture,
            outcome,
            duration: Duration::ZERO,
        }
    }

    fn console_output(f: impl FnOnce(&mut ConsoleReporter<Vec<u8>>)) -> String {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        f(&mut reporter);
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_console_passing_similarity() {
        let out = console_output(|r| {
            let fixture = positive("cat");
            r.on_fixture_start(&fixture);
            r.on_fixture_complete(&report(fixture, FixtureOutcome::Similar(SimilarityScore::new(0.97, 0.90))));
        });
        insta::assert_snapshot!(out.trim_end(), @r"
        > Converting cat.heic
        > Comparing visual similarity
        Similarity: 97.0%
        ");
    }

    #[test]
    fn test_console_below_threshold() {
        let out = console_output(|r| {
            let err = HarnessError::SimilarityBelowThreshold {
                fixture: "cat".to_string(),
                score: 0.85,
                threshold: 0.90,
            };
            r.on_fixture_complete(&report(positive("cat"), FixtureOutcome::Failed(err)));
        });
        assert!(out.contains("Similarity: 85.0%"));
        assert!(out.contains("This is below our acceptance rate of 0.90!"));
    }

    #[test]
    fn test_console_negative_rejection() {
        let out = console_output(|r| {
            let fixture = TestFixture::negative("corrupt.heic", PathBuf::from("/n/corrupt.heic"));
            r.on_fixture_start(&fixture);
            r.on_fixture_complete(&report(fixture, FixtureOutcome::Rejected { exit_code: 1 }));
        });
        insta::assert_snapshot!(out.trim_end(), @r"
        > Expecting rejection of corrupt.heic
        Rejected (exit code 1)
        ");
    }

    #[test]
    fn test_console_color_codes() {
        let mut reporter = ConsoleReporter::new(Vec::new(), true);
        reporter.on_build_cached(Path::new("/b/tifig"));
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.starts_with(GREEN));
        assert!(out.trim_end().ends_with(RESET));
    }

    #[test]
    fn test_json_fixture_event() {
        let mut reporter = JsonReporter::new(Vec::new());
        let err = HarnessError::NegativeCaseRegression {
            fixture: "corrupt.heic".to_string(),
            input: PathBuf::from("/n/corrupt.heic"),
        };
        let fixture = TestFixture::negative("corrupt.heic", PathBuf::from("/n/corrupt.heic"));
        reporter.on_fixture_complete(&report(fixture, FixtureOutcome::Failed(err)));

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let value: Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["event"], "fixture");
        assert_eq!(value["kind"], "negative");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"]["kind"], "NegativeCaseRegression");
    }

    #[test]
    fn test_json_one_line_per_event() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.on_phase(RunPhase::Building);
        reporter.on_collection_complete(1, 2);
        let out = String::from_utf8(reporter.into_inner()).unwrap();

        let lines: Vec<Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["phase"], "building");
        assert_eq!(lines[1]["positives"], 2);
    }
}
