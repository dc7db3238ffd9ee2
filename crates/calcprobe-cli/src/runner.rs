//! Scenario runner

use std::time::{Duration, Instant};

use calcprobe::{BrowserHost, Harness, Scenario, ScenarioOutcome, ScenarioStatus};
use serde::{Deserialize, Serialize};

use crate::config::CliConfig;
use crate::output::ProgressReporter;

/// How a scenario ended, flattened for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Passed
    Pass,
    /// Failed
    Fail,
    /// Skipped by the environment
    Skip,
}

/// Scenario execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Scenario name
    pub name: String,
    /// Verdict
    pub verdict: Verdict,
    /// Failure message or skip reason
    pub message: Option<String>,
    /// Wall time in milliseconds, setup included
    pub duration_ms: u64,
}

impl TestResult {
    /// Create a passing result
    #[must_use]
    pub fn pass(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Pass,
            message: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create a failing result
    #[must_use]
    pub fn fail(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Fail,
            message: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Create a skipped result
    #[must_use]
    pub fn skip(name: impl Into<String>, reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Skip,
            message: Some(reason.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

impl From<ScenarioOutcome> for TestResult {
    fn from(outcome: ScenarioOutcome) -> Self {
        match outcome.status {
            ScenarioStatus::Passed => Self::pass(outcome.name, outcome.duration),
            ScenarioStatus::Failed(msg) => Self::fail(outcome.name, msg, outcome.duration),
            ScenarioStatus::Skipped(reason) => Self::skip(outcome.name, reason, outcome.duration),
        }
    }
}

/// Aggregated results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    /// Individual results in execution order
    pub results: Vec<TestResult>,
    /// Total wall time in milliseconds
    pub duration_ms: u64,
}

impl TestResults {
    /// Create new empty results
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result
    pub fn add(&mut self, result: TestResult) {
        self.results.push(result);
    }

    fn count(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }

    /// Number of passed scenarios
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(Verdict::Pass)
    }

    /// Number of failed scenarios
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(Verdict::Fail)
    }

    /// Number of skipped scenarios
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(Verdict::Skip)
    }

    /// Total number of scenarios run
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// No scenario failed; skips do not count against the run
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Failed results
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results
            .iter()
            .filter(|r| r.verdict == Verdict::Fail)
            .collect()
    }
}

/// Runs scenarios through a [`Harness`] and reports as it goes
#[derive(Debug)]
pub struct TestRunner {
    config: CliConfig,
    reporter: ProgressReporter,
}

impl TestRunner {
    /// Create a new runner
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self { config, reporter }
    }

    /// Reporter used for progress and summary lines
    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Run `scenarios` in order, each on a fresh page
    pub async fn run<H: BrowserHost>(
        &mut self,
        harness: &Harness<H>,
        scenarios: &[Scenario],
    ) -> TestResults {
        let start = Instant::now();
        let mut results = TestResults::new();

        self.reporter.header("calcprobe");
        self.reporter
            .start_progress(scenarios.len() as u64, "Running scenarios...");

        for scenario in scenarios {
            self.reporter.set_message(scenario.name());
            let result = TestResult::from(harness.run(scenario).await);
            self.report(&result);
            self.reporter.increment(1);

            let stop = self.config.fail_fast && result.verdict == Verdict::Fail;
            results.add(result);
            if stop {
                self.reporter
                    .warning("Stopping after first failure (--fail-fast)");
                break;
            }
        }

        self.reporter.finish();
        results.duration_ms = start.elapsed().as_millis() as u64;
        self.reporter.summary(
            results.passed(),
            results.failed(),
            results.skipped(),
            start.elapsed(),
        );
        results
    }

    fn report(&self, result: &TestResult) {
        let message = result.message.as_deref().unwrap_or_default();
        match result.verdict {
            Verdict::Pass => self
                .reporter
                .success(&format!("{} ({}ms)", result.name, result.duration_ms)),
            Verdict::Fail => self.reporter.failure(&format!("{}: {message}", result.name)),
            Verdict::Skip => self.reporter.skipped(&format!("{}: {message}", result.name)),
        }
    }
}
