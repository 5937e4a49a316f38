//! Run orchestration
//!
//! The driver sequences a run through
//! `NotStarted → Building → (NegativeTesting) → PositiveTesting → Passed | Failed`.
//!
//! Every component hands back an explicit result; nothing below the driver
//! ends the process. The driver records one [`FixtureReport`] per fixture it
//! processed and, under [`FailurePolicy::FailFast`], stops at the first
//! failure without touching the remaining fixtures.

use std::fmt;
use std::fs;
use std::time::{Duration, Instant};

use super::build::{BinaryHandle, BuildOrchestrator, BuildOutcome};
use super::config::{FailurePolicy, HarnessConfig};
use super::convert::ConversionRunner;
use super::error::{HarnessError, HarnessResult, ScoringError};
use super::fixtures::{FixtureRegistry, TestFixture, ensure_unique_ids};
use super::interfaces::{
    CommandRunner, Converter, DefaultCommandRunner, DefaultConverter, DefaultSimilarity, SimilarityAlgorithm,
};
use super::negative::NegativeCaseValidator;
use super::report::{HarnessReporter, RunSummary};
use super::similarity::{SimilarityScore, SimilarityScorer};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Building,
    NegativeTesting,
    PositiveTesting,
    Passed,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::NotStarted => "not started",
            RunPhase::Building => "building",
            RunPhase::NegativeTesting => "negative testing",
            RunPhase::PositiveTesting => "positive testing",
            RunPhase::Passed => "passed",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Pass,
    Fail,
}

/// What happened to one fixture
#[derive(Debug)]
pub enum FixtureOutcome {
    /// Negative fixture rejected, as required
    Rejected { exit_code: i32 },
    /// Positive fixture converted and scored at or above the threshold
    Similar(SimilarityScore),
    Failed(HarnessError),
}

impl FixtureOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FixtureOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct FixtureReport {
    pub fixture: TestFixture,
    pub outcome: FixtureOutcome,
    pub duration: Duration,
}

/// State of one harness run, owned and mutated only by the [`Driver`]
#[derive(Debug)]
pub struct TestRun {
    phase: RunPhase,
    policy: FailurePolicy,
    /// Processed fixtures, in processing order
    fixtures: Vec<FixtureReport>,
    /// Fixtures discovered but never processed because the run stopped early
    not_run: usize,
    build: Option<BuildOutcome>,
    /// Build or discovery failure, which ends the run before any fixture
    setup_error: Option<HarnessError>,
    failing_fixture_id: Option<String>,
    duration: Duration,
}

impl TestRun {
    fn new(policy: FailurePolicy) -> Self {
        Self {
            phase: RunPhase::NotStarted,
            policy,
            fixtures: Vec::new(),
            not_run: 0,
            build: None,
            setup_error: None,
            failing_fixture_id: None,
            duration: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.setup_error.is_some() || self.fixtures.iter().any(|r| r.outcome.is_failure()) {
            RunOutcome::Fail
        } else {
            RunOutcome::Pass
        }
    }

    pub fn fixtures(&self) -> &[FixtureReport] {
        &self.fixtures
    }

    /// Id of the first fixture that failed.
    pub fn failing_fixture_id(&self) -> Option<&str> {
        self.failing_fixture_id.as_deref()
    }

    pub fn setup_error(&self) -> Option<&HarnessError> {
        self.setup_error.as_ref()
    }

    pub fn build_outcome(&self) -> Option<BuildOutcome> {
        self.build
    }

    /// Failed fixtures in processing order.
    pub fn failures(&self) -> impl Iterator<Item = (&TestFixture, &HarnessError)> {
        self.fixtures.iter().filter_map(|r| match &r.outcome {
            FixtureOutcome::Failed(err) => Some((&r.fixture, err)),
            _ => None,
        })
    }

    /// The first error of the run, setup or fixture.
    pub fn first_error(&self) -> Option<&HarnessError> {
        self.setup_error.as_ref().or_else(|| self.failures().next().map(|(_, err)| err))
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        match self.outcome() {
            RunOutcome::Pass => 0,
            RunOutcome::Fail => 1,
        }
    }

    pub fn summary(&self) -> RunSummary {
        let failed = self.fixtures.iter().filter(|r| r.outcome.is_failure()).count();
        RunSummary {
            total: self.fixtures.len() + self.not_run,
            passed: self.fixtures.len() - failed,
            failed,
            not_run: self.not_run,
            duration: self.duration,
        }
    }

    fn record(&mut self, report: FixtureReport) {
        if report.outcome.is_failure() && self.failing_fixture_id.is_none() {
            self.failing_fixture_id = Some(report.fixture.id.clone());
        }
        self.fixtures.push(report);
    }

    /// Whether the last recorded fixture ends the run.
    fn should_stop(&self) -> bool {
        self.policy == FailurePolicy::FailFast
            && self.fixtures.last().is_some_and(|r| r.outcome.is_failure())
    }
}

/// Sequences build, negative checks and similarity checks
pub struct Driver<'a> {
    config: &'a HarnessConfig,
    build_runner: Box<dyn CommandRunner + 'a>,
    converter: Box<dyn Converter + 'a>,
    similarity: Box<dyn SimilarityAlgorithm + 'a>,
}

impl<'a> Driver<'a> {
    /// Driver with the real build commands, converter and SSIM.
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self {
            config,
            build_runner: Box::new(DefaultCommandRunner),
            converter: Box::new(DefaultConverter),
            similarity: Box::new(DefaultSimilarity),
        }
    }

    pub fn with_build_runner(mut self, runner: impl CommandRunner + 'a) -> Self {
        self.build_runner = Box::new(runner);
        self
    }

    pub fn with_converter(mut self, converter: impl Converter + 'a) -> Self {
        self.converter = Box::new(converter);
        self
    }

    pub fn with_similarity(mut self, similarity: impl SimilarityAlgorithm + 'a) -> Self {
        self.similarity = Box::new(similarity);
        self
    }

    /// Execute a full run and return its final state.
    #[tracing::instrument(skip_all)]
    pub fn run(&self, reporter: &mut dyn HarnessReporter) -> TestRun {
        let start = Instant::now();
        let mut run = TestRun::new(self.config.policy);
        reporter.on_run_start(self.config);

        self.execute(&mut run, reporter);

        let final_phase = match run.outcome() {
            RunOutcome::Pass => RunPhase::Passed,
            RunOutcome::Fail => RunPhase::Failed,
        };
        advance(&mut run, final_phase, reporter);
        run.duration = start.elapsed();
        reporter.on_run_complete(&run, &run.summary());
        run
    }

    fn execute(&self, run: &mut TestRun, reporter: &mut dyn HarnessReporter) {
        advance(run, RunPhase::Building, reporter);
        let binary = match self.build(reporter) {
            Ok((binary, outcome)) => {
                run.build = Some(outcome);
                binary
            }
            Err(err) => {
                run.setup_error = Some(err);
                return;
            }
        };

        let (negatives, positives) = match self.collect() {
            Ok(sets) => sets,
            Err(err) => {
                reporter.on_setup_error(&err);
                run.setup_error = Some(err);
                return;
            }
        };
        reporter.on_collection_complete(negatives.len(), positives.len());

        let runner = ConversionRunner::new(&binary, self.converter.as_ref());

        if self.config.negatives_dir.is_some() {
            advance(run, RunPhase::NegativeTesting, reporter);
            let scratch = self.config.negative_scratch_path();
            let validator = NegativeCaseValidator::new(&runner, &scratch);

            for (index, fixture) in negatives.iter().enumerate() {
                reporter.on_fixture_start(fixture);
                let started = Instant::now();
                let outcome = match validator.validate(fixture) {
                    Ok(exit_code) => FixtureOutcome::Rejected { exit_code },
                    Err(err) => FixtureOutcome::Failed(err),
                };
                self.finish_fixture(run, reporter, fixture, outcome, started);
                if run.should_stop() {
                    run.not_run = negatives.len() - index - 1 + positives.len();
                    return;
                }
            }
        }

        advance(run, RunPhase::PositiveTesting, reporter);
        let scorer = SimilarityScorer::new(self.similarity.as_ref(), self.config.threshold);

        for (index, fixture) in positives.iter().enumerate() {
            reporter.on_fixture_start(fixture);
            let started = Instant::now();
            let outcome = match self.check_positive(&runner, &scorer, fixture) {
                Ok(score) => FixtureOutcome::Similar(score),
                Err(err) => FixtureOutcome::Failed(err),
            };
            self.finish_fixture(run, reporter, fixture, outcome, started);
            if run.should_stop() {
                run.not_run = positives.len() - index - 1;
                return;
            }
        }
    }

    fn build(&self, reporter: &mut dyn HarnessReporter) -> HarnessResult<(BinaryHandle, BuildOutcome)> {
        let orchestrator = BuildOrchestrator::new(self.config, self.build_runner.as_ref());
        let result = orchestrator.ensure_binary(|binary| reporter.on_build_start(binary));
        match &result {
            Ok((binary, BuildOutcome::Cached)) => reporter.on_build_cached(binary.path()),
            Ok((binary, BuildOutcome::Built)) => reporter.on_build_complete(binary.path()),
            Err(err) => reporter.on_setup_error(err),
        }
        result
    }

    /// Negative then positive fixtures. Ids must be unique across both sets.
    fn collect(&self) -> HarnessResult<(Vec<TestFixture>, Vec<TestFixture>)> {
        let registry = FixtureRegistry::new(self.config);
        let negatives = registry.discover_negatives()?;
        let positives = registry.discover()?;
        ensure_unique_ids(negatives.iter().chain(positives.iter()))?;
        Ok((negatives, positives))
    }

    fn check_positive<C: Converter, S: SimilarityAlgorithm>(
        &self,
        runner: &ConversionRunner<'_, C>,
        scorer: &SimilarityScorer<S>,
        fixture: &TestFixture,
    ) -> HarnessResult<SimilarityScore> {
        let output = self.config.converted_path(&fixture.id);
        let conversion = runner.convert(&fixture.id, &fixture.input_path, &output)?;
        if !conversion.succeeded() {
            return Err(HarnessError::ConversionFailure {
                fixture: fixture.id.clone(),
                input: fixture.input_path.clone(),
                exit_code: conversion.exit_code,
            });
        }

        let Some(reference) = &fixture.reference_path else {
            // Discovery never builds a positive fixture without a reference.
            return Err(HarnessError::Scoring {
                fixture: fixture.id.clone(),
                source: ScoringError::Compare("fixture has no reference image".to_string()),
            });
        };

        let heatmap = self.config.heatmap_path(&fixture.id);
        let score = scorer
            .score(reference, &conversion.output_path, heatmap.as_deref())
            .map_err(|source| HarnessError::Scoring {
                fixture: fixture.id.clone(),
                source,
            })?;

        if !score.passed() {
            return Err(HarnessError::SimilarityBelowThreshold {
                fixture: fixture.id.clone(),
                score: score.value,
                threshold: score.threshold,
            });
        }

        // Converted output only outlives a passing fixture when removal fails.
        if let Err(e) = fs::remove_file(&conversion.output_path) {
            tracing::debug!(error = %e, "could not remove converted output");
        }
        Ok(score)
    }

    fn finish_fixture(
        &self,
        run: &mut TestRun,
        reporter: &mut dyn HarnessReporter,
        fixture: &TestFixture,
        outcome: FixtureOutcome,
        started: Instant,
    ) {
        if let FixtureOutcome::Failed(err) = &outcome {
            tracing::debug!(fixture = %fixture.id, kind = err.kind(), "fixture failed");
        }
        let report = FixtureReport {
            fixture: fixture.clone(),
            outcome,
            duration: started.elapsed(),
        };
        reporter.on_fixture_complete(&report);
        run.record(report);
    }
}

fn advance(run: &mut TestRun, next: RunPhase, reporter: &mut dyn HarnessReporter) {
    tracing::debug!(from = %run.phase, to = %next, "run phase");
    run.phase = next;
    reporter.on_phase(next);
}
