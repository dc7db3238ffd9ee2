//! Declarative calculator scenarios and their outcomes.

use std::fmt;
use std::time::Duration;

use crate::calculator::{CalculatorPage, ClearKind, Control};
use crate::driver::PageDriver;
use crate::result::{ProbeError, ProbeResult};

/// Expression → expected display
pub const ARITHMETIC_CASES: [(&str, &str); 6] = [
    ("2+3=", "5"),
    ("5-2=", "3"),
    ("4×3=", "12"),
    ("8÷2=", "4"),
    ("1.5+2.5=", "4"),
    ("10÷2+3×4-5=", "12"),
];

/// One step of a scripted scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Press a control
    Press(Control),
    /// Click a clear control, optionally holding it
    Clear {
        /// Which clear control
        kind: ClearKind,
        /// Hold for the configured long-press duration
        long_press: bool,
    },
    /// Assert the display text
    Expect(String),
}

impl Step {
    async fn run<D: PageDriver>(&self, calc: &CalculatorPage<D>) -> ProbeResult<()> {
        match self {
            Self::Press(control) => calc.press_control(*control).await,
            Self::Clear { kind, long_press } => calc.clear_all(*kind, *long_press).await,
            Self::Expect(expected) => calc.assert_equals(expected).await,
        }
    }
}

/// What a scenario does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Full-clear, evaluate the expression, compare the display
    Arithmetic {
        /// Keys to press, e.g. `"2+3="`
        expression: String,
        /// Expected display afterwards
        expected: String,
    },
    /// Scripted steps
    Steps(Vec<Step>),
}

/// A named scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    name: String,
    kind: ScenarioKind,
}

impl Scenario {
    /// Arithmetic scenario named `arithmetic[<expression>]`
    #[must_use]
    pub fn arithmetic(expression: &str, expected: &str) -> Self {
        Self {
            name: format!("arithmetic[{expression}]"),
            kind: ScenarioKind::Arithmetic {
                expression: expression.to_string(),
                expected: expected.to_string(),
            },
        }
    }

    /// Scripted scenario
    #[must_use]
    pub fn steps(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            kind: ScenarioKind::Steps(steps),
        }
    }

    /// Tap vs hold on the last-entry-clear control
    #[must_use]
    pub fn clear_functionality() -> Self {
        let tap = Step::Clear {
            kind: ClearKind::LastEntry,
            long_press: false,
        };
        let hold = Step::Clear {
            kind: ClearKind::LastEntry,
            long_press: true,
        };
        let mut steps = Vec::new();
        steps.extend([Control::One, Control::Two, Control::Three].map(Step::Press));
        steps.push(tap.clone());
        steps.push(Step::Expect("12".to_string()));
        steps.push(hold.clone());
        steps.push(Step::Expect("0".to_string()));
        steps.extend([Control::Four, Control::Subtract, Control::Six].map(Step::Press));
        steps.push(tap);
        steps.push(Step::Expect("4 -".to_string()));
        steps.extend([Control::Seven, Control::Add, Control::Nine].map(Step::Press));
        steps.push(hold);
        steps.push(Step::Expect("0".to_string()));
        Self::steps("clear_functionality", steps)
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scenario body
    #[must_use]
    pub const fn kind(&self) -> &ScenarioKind {
        &self.kind
    }

    /// Run against a ready calculator
    ///
    /// # Errors
    ///
    /// Returns the first failing operation or assertion.
    pub async fn execute<D: PageDriver>(&self, calc: &CalculatorPage<D>) -> ProbeResult<()> {
        tracing::info!(scenario = %self.name, "executing");
        match &self.kind {
            ScenarioKind::Arithmetic {
                expression,
                expected,
            } => {
                calc.press_control(Control::AllClear).await?;
                calc.evaluate(expression).await?;
                calc.assert_equals(expected).await
            }
            ScenarioKind::Steps(steps) => {
                for step in steps {
                    step.run(calc).await?;
                }
                Ok(())
            }
        }
    }
}

/// The full suite in execution order
#[must_use]
pub fn all_scenarios() -> Vec<Scenario> {
    let mut scenarios: Vec<Scenario> = ARITHMETIC_CASES
        .iter()
        .map(|(expression, expected)| Scenario::arithmetic(expression, expected))
        .collect();
    scenarios.push(Scenario::clear_functionality());
    scenarios
}

/// Keep scenarios whose name contains `pattern`
#[must_use]
pub fn filter_scenarios(scenarios: Vec<Scenario>, pattern: Option<&str>) -> Vec<Scenario> {
    match pattern {
        Some(p) if !p.is_empty() => scenarios
            .into_iter()
            .filter(|s| s.name.contains(p))
            .collect(),
        _ => scenarios,
    }
}

/// How a scenario ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStatus {
    /// All steps passed
    Passed,
    /// A step failed
    Failed(String),
    /// The environment prevented the run
    Skipped(String),
}

impl ScenarioStatus {
    /// Status for a scenario result
    #[must_use]
    pub fn from_result(result: &ProbeResult<()>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(ProbeError::Skipped { reason }) => Self::Skipped(reason.clone()),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Result of one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    /// Scenario name
    pub name: String,
    /// How it ended
    pub status: ScenarioStatus,
    /// Wall time including setup
    pub duration: Duration,
}

impl ScenarioOutcome {
    /// Whether the scenario passed
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.status, ScenarioStatus::Passed)
    }

    /// Whether the scenario failed
    #[must_use]
    pub const fn failed(&self) -> bool {
        matches!(self.status, ScenarioStatus::Failed(_))
    }

    /// Whether the scenario was skipped
    #[must_use]
    pub const fn skipped(&self) -> bool {
        matches!(self.status, ScenarioStatus::Skipped(_))
    }
}
