//! Search page: navigation, query submission and widget discovery.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Timeouts;
use crate::diagnostics::Diagnostics;
use crate::driver::{ElementState, PageDriver};
use crate::locator::{LocatorMap, Selector};
use crate::overlay::OverlayResolver;
use crate::page_object::{self, PageObject};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::wait_for_state;

/// Default search page locator table
///
/// # Errors
///
/// Fails only if the table repeats a name.
pub fn default_locators() -> ProbeResult<LocatorMap> {
    LocatorMap::from_entries(
        "search",
        [
            ("search_input", Selector::css("textarea[name='q']")),
            ("search_button", Selector::css("input[value='Google Search']")),
            ("stay_signed_out", Selector::role("button", "Stay signed out")),
            ("accept_consent", Selector::role("button", "Accept all")),
            ("reject_consent", Selector::role("button", "Reject all")),
            ("widget_container", Selector::css("div[jsname='j93WEe']")),
            // Digit 1 inside the widget
            ("widget_sentinel", Selector::css("div[jsname='N10B9']")),
            (
                "captcha_frame",
                Selector::xpath("//iframe[contains(@src, 'recaptcha')]"),
            ),
            ("captcha_text", Selector::text("I'm not a robot")),
        ],
    )
}

/// Page object for the search engine front page and results
#[derive(Debug)]
pub struct SearchPage<D: PageDriver> {
    driver: Arc<D>,
    locators: LocatorMap,
    overlays: OverlayResolver<D>,
    diagnostics: Diagnostics,
    timeouts: Timeouts,
}

impl<D: PageDriver> SearchPage<D> {
    /// Search page with the default locator table
    ///
    /// # Errors
    ///
    /// Fails if the default locator table is invalid.
    pub fn new(
        driver: Arc<D>,
        overlays: OverlayResolver<D>,
        diagnostics: Diagnostics,
        timeouts: Timeouts,
    ) -> ProbeResult<Self> {
        Ok(Self {
            driver,
            locators: default_locators()?,
            overlays,
            diagnostics,
            timeouts,
        })
    }

    /// Overlay resolver used by this page
    #[must_use]
    pub const fn overlays(&self) -> &OverlayResolver<D> {
        &self.overlays
    }

    /// Load `url`, then clear consent and sign-in overlays once.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Navigation`] if the page does not load in time,
    /// or a driver failure from overlay handling.
    pub async fn open(&self, url: &str) -> ProbeResult<()> {
        tracing::info!(url, "opening search page");
        self.driver
            .goto(url, Duration::from_millis(self.timeouts.navigation_ms))
            .await?;
        self.overlays.resolve_consent().await?;
        self.overlays.dismiss_sign_in().await?;
        Ok(())
    }

    /// Submit `query` and wait for the calculator widget.
    ///
    /// The container must be visible and the sentinel control inside it must
    /// be both visible and attached; each predicate has its own bound.
    ///
    /// # Errors
    ///
    /// Passes [`ProbeError::Skipped`] through unchanged; anything else is
    /// reported as [`ProbeError::SearchFailed`] after a `search_failed`
    /// screenshot.
    pub async fn search_for_widget(&self, query: &str) -> ProbeResult<()> {
        let result = async {
            let t = &self.timeouts;
            page_object::wait_until_ready(self, &*self.driver, &t.wait(t.navigation_ms)).await?;
            let input = self.locators.resolve("search_input")?;
            self.driver.fill(input, query).await?;
            if self.overlays.detect_and_wait_for_captcha().await? {
                // Solving the challenge can reset the form
                self.driver.fill(input, query).await?;
            }
            self.driver.press_key(input, "Enter").await?;

            let container = self.locators.resolve("widget_container")?;
            let sentinel = self.locators.resolve("widget_sentinel")?;
            wait_for_state(
                &*self.driver,
                container,
                ElementState::Visible,
                &t.wait(t.widget_container_ms),
            )
            .await?;
            wait_for_state(
                &*self.driver,
                sentinel,
                ElementState::Visible,
                &t.wait(t.sentinel_ms),
            )
            .await?;
            wait_for_state(
                &*self.driver,
                sentinel,
                ElementState::Attached,
                &t.wait(t.sentinel_ms),
            )
            .await?;
            Ok::<_, ProbeError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(query, "calculator widget found");
                Ok(())
            }
            Err(e) if e.is_skip() => Err(e),
            Err(e) => {
                let _ = self.diagnostics.capture(&*self.driver, "search_failed").await;
                Err(ProbeError::SearchFailed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Reload the current page and clear overlays again.
    ///
    /// # Errors
    ///
    /// Returns the driver's reload error, or [`ProbeError::Navigation`] if
    /// the reload does not finish within the navigation bound.
    pub async fn reload(&self) -> ProbeResult<()> {
        tracing::info!("reloading search page");
        self.driver
            .reload(Duration::from_millis(self.timeouts.navigation_ms))
            .await?;
        self.overlays.resolve_consent().await?;
        self.overlays.dismiss_sign_in().await?;
        Ok(())
    }
}

impl<D: PageDriver> PageObject for SearchPage<D> {
    fn page_name(&self) -> &str {
        "search"
    }

    fn locators(&self) -> &LocatorMap {
        &self.locators
    }

    fn ready_selector(&self) -> Option<&str> {
        Some("search_input")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CaptchaPolicy;
    use crate::overlay::ManualIntervention;
    use crate::sim::{ConsentMode, SimOptions, SimulatedPage};

    fn search_page(page: &Arc<SimulatedPage>, diagnostics: Diagnostics) -> SearchPage<SimulatedPage> {
        let overlays = OverlayResolver::new(
            page.clone(),
            default_locators().unwrap(),
            Timeouts::default(),
        )
        .with_captcha_policy(CaptchaPolicy::Skip, false);
        SearchPage::new(page.clone(), overlays, diagnostics, Timeouts::default()).unwrap()
    }

    #[test]
    fn test_default_locators() {
        let map = default_locators().unwrap();
        assert_eq!(map.len(), 9);
        assert_eq!(
            map.resolve("stay_signed_out").unwrap().to_string(),
            "role=button[name=\"Stay signed out\"]"
        );
        assert!(map.resolve("calculator").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_clears_overlays_before_search() {
        let page = Arc::new(SimulatedPage::new(SimOptions {
            consent: ConsentMode::AcceptAndReject,
            sign_in_popup: true,
            ..SimOptions::default()
        }));
        let search = search_page(&page, Diagnostics::disabled());
        search.open("https://www.google.com").await.unwrap();
        search.search_for_widget("calculator").await.unwrap();

        let history = page.history();
        let consent = history.iter().position(|c| c == "click:accept_consent").unwrap();
        let fill = history.iter().position(|c| c == "fill:search_input").unwrap();
        assert!(consent < fill);
        assert!(history.contains(&"click:stay_signed_out".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_widget_within_bound() {
        let page = Arc::new(SimulatedPage::new(SimOptions {
            widget_delay: Duration::from_secs(4),
            ..SimOptions::default()
        }));
        let search = search_page(&page, Diagnostics::disabled());
        search.open("https://www.google.com").await.unwrap();
        search.search_for_widget("calculator").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_widget_is_search_failed_with_capture() {
        let dir = tempfile::tempdir().unwrap();
        let page = Arc::new(SimulatedPage::new(SimOptions {
            widget_available: false,
            ..SimOptions::default()
        }));
        let search = search_page(&page, Diagnostics::new(dir.path()));
        search.open("https://www.google.com").await.unwrap();
        let err = search.search_for_widget("calculator").await.unwrap_err();
        assert!(matches!(err, ProbeError::SearchFailed { .. }));
        assert!(err.to_string().contains("j93WEe"));
        assert!(dir.path().join("search_failed.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_waits_for_input_before_filling() {
        let page = Arc::new(SimulatedPage::new(SimOptions::default()));
        let search = search_page(&page, Diagnostics::disabled());
        let err = search.search_for_widget("calculator").await.unwrap_err();
        assert!(matches!(err, ProbeError::SearchFailed { .. }));
        assert!(err.to_string().contains("textarea[name='q']"));
        assert!(!page.was_called("fill"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_clears_sign_in() {
        let page = Arc::new(SimulatedPage::new(SimOptions {
            sign_in_popup: true,
            ..SimOptions::default()
        }));
        let search = search_page(&page, Diagnostics::disabled());
        search.open("https://www.google.com").await.unwrap();
        search.reload().await.unwrap();

        let dismissals = page
            .history()
            .iter()
            .filter(|c| *c == "click:stay_signed_out")
            .count();
        assert_eq!(dismissals, 2);
        search.search_for_widget("calculator").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_captcha_skip_passes_through() {
        let page = Arc::new(SimulatedPage::new(SimOptions {
            captcha: true,
            ..SimOptions::default()
        }));
        let search = search_page(&page, Diagnostics::disabled());
        search.open("https://www.google.com").await.unwrap();
        let err = search.search_for_widget("calculator").await.unwrap_err();
        assert!(err.is_skip());
    }

    #[derive(Debug)]
    struct SolvingHuman(Arc<SimulatedPage>);

    #[async_trait::async_trait]
    impl ManualIntervention for SolvingHuman {
        async fn wait_for_human(&self, _message: &str) -> ProbeResult<()> {
            self.0.solve_captcha();
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_solved_captcha_refills_query() {
        let page = Arc::new(SimulatedPage::new(SimOptions {
            captcha: true,
            ..SimOptions::default()
        }));
        let overlays = OverlayResolver::new(
            page.clone(),
            default_locators().unwrap(),
            Timeouts::default(),
        )
        .with_captcha_policy(CaptchaPolicy::Prompt, true)
        .with_intervention(Arc::new(SolvingHuman(page.clone())));
        let search =
            SearchPage::new(page.clone(), overlays, Diagnostics::disabled(), Timeouts::default())
                .unwrap();
        search.open("https://www.google.com").await.unwrap();
        search.search_for_widget("calculator").await.unwrap();

        let fills = page
            .history()
            .iter()
            .filter(|c| *c == "fill:search_input")
            .count();
        assert_eq!(fills, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_timeout() {
        let page = Arc::new(SimulatedPage::new(SimOptions {
            navigation_delay: Duration::from_secs(30),
            ..SimOptions::default()
        }));
        let search = search_page(&page, Diagnostics::disabled());
        let err = search.open("https://www.google.com").await.unwrap_err();
        assert!(matches!(err, ProbeError::Navigation { .. }));
    }
}
