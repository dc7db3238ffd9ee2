//! Browser session and per-test page scopes.
//!
//! A [`BrowserHost`] is the session-wide resource (one browser process).
//! Each scenario gets its own page through a [`PageScope`], which is
//! released explicitly so teardown can await the end-of-test screenshot and
//! the page close. [`Harness`] ties the two together with setup retries.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::calculator::{CalculatorPage, Control};
use crate::config::{self, ProbeConfig};
use crate::diagnostics::Diagnostics;
use crate::driver::PageDriver;
use crate::overlay::{ManualIntervention, OverlayResolver, TerminalPrompt};
use crate::result::{ProbeError, ProbeResult};
use crate::scenario::{Scenario, ScenarioOutcome, ScenarioStatus};
use crate::search::{self, SearchPage};

/// Session-wide browser that hands out pages
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Page type produced by this host
    type Page: PageDriver + 'static;

    /// Open a fresh page
    async fn new_page(&self) -> ProbeResult<Self::Page>;

    /// Tear down the browser
    async fn shutdown(&mut self) -> ProbeResult<()>;
}

/// State of a page scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Page is open and owned by the running test
    Acquired,
    /// Page has been released
    Released,
}

/// One page owned by one test
#[derive(Debug)]
pub struct PageScope<D: PageDriver> {
    test_name: String,
    driver: Arc<D>,
    diagnostics: Diagnostics,
    state: ScopeState,
}

impl<D: PageDriver> PageScope<D> {
    /// Open a page for `test_name`
    ///
    /// # Errors
    ///
    /// Returns the host's page creation error.
    pub async fn acquire<H>(host: &H, test_name: &str, diagnostics: Diagnostics) -> ProbeResult<Self>
    where
        H: BrowserHost<Page = D>,
    {
        let page = host.new_page().await?;
        tracing::debug!(test = test_name, "page acquired");
        Ok(Self {
            test_name: test_name.to_string(),
            driver: Arc::new(page),
            diagnostics,
            state: ScopeState::Acquired,
        })
    }

    /// Driver for the scoped page
    #[must_use]
    pub const fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ScopeState {
        self.state
    }

    /// Take the end-of-test screenshot and close the page.
    ///
    /// # Errors
    ///
    /// Returns the driver's close error; the screenshot is best-effort.
    pub async fn release(mut self) -> ProbeResult<()> {
        self.state = ScopeState::Released;
        let _ = self
            .diagnostics
            .capture_test(&*self.driver, &self.test_name)
            .await;
        let result = self.driver.close().await;
        tracing::debug!(test = %self.test_name, "page released");
        result
    }
}

impl<D: PageDriver> Drop for PageScope<D> {
    fn drop(&mut self) {
        if self.state == ScopeState::Acquired {
            tracing::warn!(test = %self.test_name, "page scope dropped without release");
        }
    }
}

async fn smoke_check<D: PageDriver>(
    search: &SearchPage<D>,
    calculator: &CalculatorPage<D>,
    query: &str,
) -> ProbeResult<()> {
    search.search_for_widget(query).await?;
    calculator.verify_ready().await?;
    calculator.press_control(Control::One).await?;
    calculator.assert_equals("1").await?;
    calculator.press_control(Control::AllClear).await
}

/// Search for the widget and make sure it responds, retrying after a reload.
///
/// Each attempt searches, checks readiness, then presses `1`, expects `1`
/// on the display and clears with AC. A retry reloads the page when the
/// previous navigation succeeded and opens the base URL again when it did
/// not; either way the overlays are cleared before searching.
///
/// # Errors
///
/// Passes [`ProbeError::Skipped`] through; otherwise returns
/// [`ProbeError::SetupFailed`] with the last error after a
/// `calculator_setup_failed` screenshot.
pub async fn prepare_calculator<D: PageDriver>(
    driver: Arc<D>,
    config: &ProbeConfig,
    diagnostics: &Diagnostics,
    intervention: Arc<dyn ManualIntervention>,
) -> ProbeResult<CalculatorPage<D>> {
    let overlays = OverlayResolver::new(
        driver.clone(),
        search::default_locators()?,
        config.timeouts.clone(),
    )
    .with_captcha_policy(config.captcha, config::is_ci())
    .with_intervention(intervention);
    let search = SearchPage::new(
        driver.clone(),
        overlays,
        diagnostics.clone(),
        config.timeouts.clone(),
    )?;
    let calculator =
        CalculatorPage::new(driver.clone(), diagnostics.clone(), config.timeouts.clone())?;

    let attempts = config.setup_attempts.max(1);
    let mut last_error = String::new();
    let mut page_loaded = false;
    for attempt in 1..=attempts {
        let navigated = if page_loaded {
            search.reload().await
        } else {
            search.open(&config.base_url).await
        };
        page_loaded = navigated.is_ok();
        let result = match navigated {
            Ok(()) => smoke_check(&search, &calculator, &config.query).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!(attempt, "calculator ready for testing");
                return Ok(calculator);
            }
            Err(e) if e.is_skip() => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, attempts, error = %e, "calculator setup failed");
                last_error = e.to_string();
            }
        }
    }

    let _ = diagnostics
        .capture(&*driver, "calculator_setup_failed")
        .await;
    Err(ProbeError::SetupFailed {
        attempts,
        message: last_error,
    })
}

/// Runs scenarios on a browser host, one page per scenario
#[derive(Debug)]
pub struct Harness<H> {
    host: H,
    config: ProbeConfig,
    diagnostics: Diagnostics,
    intervention: Arc<dyn ManualIntervention>,
}

impl<H: BrowserHost> Harness<H> {
    /// Harness writing diagnostics under `config.reports_dir`
    #[must_use]
    pub fn new(host: H, config: ProbeConfig) -> Self {
        let diagnostics = Diagnostics::new(config.reports_dir.clone());
        Self {
            host,
            config,
            diagnostics,
            intervention: Arc::new(TerminalPrompt),
        }
    }

    /// Replace the terminal CAPTCHA prompt
    #[must_use]
    pub fn with_intervention(mut self, intervention: Arc<dyn ManualIntervention>) -> Self {
        self.intervention = intervention;
        self
    }

    /// Replace the diagnostics sink
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Run one scenario on a fresh page; the page is released either way
    pub async fn run(&self, scenario: &Scenario) -> ScenarioOutcome {
        let started = Instant::now();
        let result = match PageScope::acquire(&self.host, scenario.name(), self.diagnostics.clone())
            .await
        {
            Ok(scope) => {
                let result = async {
                    let calculator = prepare_calculator(
                        scope.driver().clone(),
                        &self.config,
                        &self.diagnostics,
                        self.intervention.clone(),
                    )
                    .await?;
                    scenario.execute(&calculator).await
                }
                .await;
                if let Err(e) = scope.release().await {
                    tracing::warn!(scenario = scenario.name(), error = %e, "page close failed");
                }
                result
            }
            Err(e) => Err(e),
        };

        let status = ScenarioStatus::from_result(&result);
        tracing::info!(scenario = scenario.name(), %status, "scenario finished");
        ScenarioOutcome {
            name: scenario.name().to_string(),
            status,
            duration: started.elapsed(),
        }
    }

    /// Shut the browser down
    ///
    /// # Errors
    ///
    /// Returns the host's shutdown error.
    pub async fn shutdown(mut self) -> ProbeResult<()> {
        self.host.shutdown().await
    }
}
