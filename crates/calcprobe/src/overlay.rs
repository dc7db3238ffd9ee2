//! Consent, sign-in and CAPTCHA overlays.
//!
//! Overlays are third-party noise in front of the widget. Each step waits a
//! short bound for its overlay and reports `handled: bool`; absence is the
//! common case and is never an error. Only transport failures propagate.

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CaptchaPolicy, Timeouts};
use crate::driver::{ClickOptions, ElementState, PageDriver};
use crate::locator::LocatorMap;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::appears_within;

/// Locator names checked for a CAPTCHA challenge
pub const CAPTCHA_INDICATORS: [&str; 2] = ["captcha_frame", "captcha_text"];

const CAPTCHA_PROMPT: &str =
    "CAPTCHA detected. Solve it in the browser window, then press Enter to continue...";

/// Blocks until a human has dealt with something on the page
#[async_trait]
pub trait ManualIntervention: Send + Sync + fmt::Debug {
    /// Show `message` and wait for the human to confirm
    async fn wait_for_human(&self, message: &str) -> ProbeResult<()>;
}

/// Prompt on stderr, confirm with Enter on stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl ManualIntervention for TerminalPrompt {
    async fn wait_for_human(&self, message: &str) -> ProbeResult<()> {
        eprintln!("{message}");
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| ())
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }
}

/// Resolves transient overlays on the search page
#[derive(Debug)]
pub struct OverlayResolver<D: PageDriver> {
    driver: Arc<D>,
    locators: LocatorMap,
    timeouts: Timeouts,
    skip_captcha: bool,
    intervention: Arc<dyn ManualIntervention>,
}

impl<D: PageDriver> OverlayResolver<D> {
    /// Resolver over the search page's locator map.
    ///
    /// Defaults to the [`CaptchaPolicy::Auto`] policy with the CI signal read
    /// from the environment, prompting on the terminal.
    #[must_use]
    pub fn new(driver: Arc<D>, locators: LocatorMap, timeouts: Timeouts) -> Self {
        Self {
            driver,
            locators,
            timeouts,
            skip_captcha: CaptchaPolicy::Auto.should_skip(crate::config::is_ci()),
            intervention: Arc::new(TerminalPrompt),
        }
    }

    /// Choose skip-vs-block for CAPTCHA challenges
    #[must_use]
    pub const fn with_captcha_policy(mut self, policy: CaptchaPolicy, ci: bool) -> Self {
        self.skip_captcha = policy.should_skip(ci);
        self
    }

    /// Replace the terminal prompt
    #[must_use]
    pub fn with_intervention(mut self, intervention: Arc<dyn ManualIntervention>) -> Self {
        self.intervention = intervention;
        self
    }

    /// Click "stay signed out" if the prompt shows up.
    ///
    /// # Errors
    ///
    /// Only driver failures; absence returns `Ok(false)`.
    pub async fn dismiss_sign_in(&self) -> ProbeResult<bool> {
        let handled = self
            .click_if_visible("stay_signed_out", self.timeouts.sign_in_ms)
            .await?;
        if handled {
            tracing::info!("dismissed sign-in prompt");
        }
        Ok(handled)
    }

    /// Accept the consent dialog, or reject it if there is no accept button.
    ///
    /// # Errors
    ///
    /// Only driver failures; absence returns `Ok(false)`.
    pub async fn resolve_consent(&self) -> ProbeResult<bool> {
        if self
            .click_if_visible("accept_consent", self.timeouts.consent_accept_ms)
            .await?
        {
            tracing::info!("accepted consent dialog");
            return Ok(true);
        }
        if self
            .click_if_visible("reject_consent", self.timeouts.consent_reject_ms)
            .await?
        {
            tracing::info!("rejected consent dialog");
            return Ok(true);
        }
        Ok(false)
    }

    /// Check for a CAPTCHA and either skip or wait for a human.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Skipped`] when a CAPTCHA is present and the
    /// policy says skip, or any error from the driver or the prompt.
    pub async fn detect_and_wait_for_captcha(&self) -> ProbeResult<bool> {
        let mut present = false;
        for name in CAPTCHA_INDICATORS {
            let selector = self.locators.resolve(name)?;
            if self.driver.count(selector).await? > 0 {
                present = true;
                break;
            }
        }
        if !present {
            return Ok(false);
        }

        if self.skip_captcha {
            tracing::warn!("CAPTCHA detected, skipping");
            return Err(ProbeError::Skipped {
                reason: "CAPTCHA detected in CI environment".to_string(),
            });
        }
        tracing::warn!("CAPTCHA detected, waiting for manual intervention");
        self.intervention.wait_for_human(CAPTCHA_PROMPT).await?;
        Ok(true)
    }

    async fn click_if_visible(&self, name: &str, timeout_ms: u64) -> ProbeResult<bool> {
        let selector = self.locators.resolve(name)?;
        let wait = self.timeouts.wait(timeout_ms);
        if !appears_within(&*self.driver, selector, ElementState::Visible, &wait).await? {
            return Ok(false);
        }
        let click = ClickOptions::new(Duration::from_millis(timeout_ms));
        match self.driver.click(selector, click).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_timeout() => {
                tracing::warn!(overlay = name, error = %e, "overlay vanished before click");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::search;
    use crate::sim::{ConsentMode, SimOptions, SimulatedPage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Solves the simulated CAPTCHA instead of reading stdin
    #[derive(Debug)]
    struct ScriptedHuman {
        page: Arc<SimulatedPage>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ManualIntervention for ScriptedHuman {
        async fn wait_for_human(&self, _message: &str) -> ProbeResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page.solve_captcha();
            Ok(())
        }
    }

    async fn loaded(options: SimOptions) -> Arc<SimulatedPage> {
        let page = Arc::new(SimulatedPage::new(options));
        page.goto("https://www.google.com", Duration::from_secs(10))
            .await
            .unwrap();
        page
    }

    fn resolver(page: &Arc<SimulatedPage>) -> OverlayResolver<SimulatedPage> {
        OverlayResolver::new(
            page.clone(),
            search::default_locators().unwrap(),
            Timeouts::default(),
        )
        .with_captcha_policy(CaptchaPolicy::Auto, false)
    }

    mod consent_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_absent_overlays_are_not_errors() {
            let page = loaded(SimOptions::default()).await;
            let overlays = resolver(&page);
            assert!(!overlays.resolve_consent().await.unwrap());
            assert!(!overlays.dismiss_sign_in().await.unwrap());
            assert!(!page.was_called("click"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_accept_preferred() {
            let page = loaded(SimOptions {
                consent: ConsentMode::AcceptAndReject,
                ..SimOptions::default()
            })
            .await;
            assert!(resolver(&page).resolve_consent().await.unwrap());
            assert!(page.history().contains(&"click:accept_consent".to_string()));
            assert!(!page.was_called("click:reject_consent"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_reject_used_when_accept_missing() {
            let page = loaded(SimOptions {
                consent: ConsentMode::RejectOnly,
                ..SimOptions::default()
            })
            .await;
            let started = tokio::time::Instant::now();
            assert!(resolver(&page).resolve_consent().await.unwrap());
            assert!(page.history().contains(&"click:reject_consent".to_string()));
            // Accept was given its full bound first
            assert!(started.elapsed() >= Duration::from_millis(3_000));
        }

        #[tokio::test(start_paused = true)]
        async fn test_sign_in_prompt_dismissed() {
            let page = loaded(SimOptions {
                sign_in_popup: true,
                ..SimOptions::default()
            })
            .await;
            let overlays = resolver(&page);
            assert!(overlays.dismiss_sign_in().await.unwrap());
            assert!(!overlays.dismiss_sign_in().await.unwrap());
        }
    }

    mod captcha_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_no_captcha_returns_immediately() {
            let page = loaded(SimOptions::default()).await;
            assert!(!resolver(&page).detect_and_wait_for_captcha().await.unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_captcha_in_ci_is_skipped() {
            let page = loaded(SimOptions {
                captcha: true,
                ..SimOptions::default()
            })
            .await;
            let overlays = resolver(&page).with_captcha_policy(CaptchaPolicy::Auto, true);
            let err = overlays.detect_and_wait_for_captcha().await.unwrap_err();
            assert!(err.is_skip());
        }

        #[tokio::test(start_paused = true)]
        async fn test_captcha_outside_ci_waits_for_human() {
            let page = loaded(SimOptions {
                captcha: true,
                ..SimOptions::default()
            })
            .await;
            let human = Arc::new(ScriptedHuman {
                page: page.clone(),
                calls: AtomicUsize::new(0),
            });
            let overlays = resolver(&page).with_intervention(human.clone());
            assert!(overlays.detect_and_wait_for_captcha().await.unwrap());
            assert_eq!(human.calls.load(Ordering::SeqCst), 1);
            assert!(!overlays.detect_and_wait_for_captcha().await.unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_skip_policy_ignores_ci_signal() {
            let page = loaded(SimOptions {
                captcha: true,
                ..SimOptions::default()
            })
            .await;
            let overlays = resolver(&page).with_captcha_policy(CaptchaPolicy::Skip, false);
            assert!(overlays.detect_and_wait_for_captcha().await.is_err());
        }
    }
}
