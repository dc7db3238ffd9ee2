//! Run configuration
//!
//! Defaults reproduce the bounds the suite has been tuned with. A YAML file
//! can override any subset of fields; the CLI applies its flags on top.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::result::{ProbeError, ProbeResult};

/// Environment variable that marks a continuous-integration run
pub const CI_ENV_VAR: &str = "CI";

/// Upper bound accepted for any single timeout (10 minutes)
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Whether the process runs under CI (`CI=true`)
#[must_use]
pub fn is_ci() -> bool {
    std::env::var(CI_ENV_VAR).is_ok_and(|v| v == "true")
}

/// What to do when a CAPTCHA shows up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaPolicy {
    /// Skip under CI, prompt for a human otherwise
    #[default]
    Auto,
    /// Always skip the scenario
    Skip,
    /// Always block until a human solves it
    Prompt,
}

impl CaptchaPolicy {
    /// Resolve to "skip" (`true`) or "prompt" (`false`) given the CI signal
    #[must_use]
    pub const fn should_skip(self, ci: bool) -> bool {
        match self {
            Self::Auto => ci,
            Self::Skip => true,
            Self::Prompt => false,
        }
    }
}

/// Chrome major versions a generated user agent claims
pub const CHROME_MAJOR_VERSIONS: RangeInclusive<u32> = 100..=125;

/// Desktop Chrome user agent for `major`
#[must_use]
pub fn chrome_user_agent(major: u32) -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36"
    )
}

/// Coordinates reported to the page's geolocation API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Fixed user agent (None = desktop Chrome with a random major version)
    pub user_agent: Option<String>,
    /// IANA timezone the page sees (None = host timezone)
    pub timezone: Option<String>,
    /// Geolocation override, granted without a prompt
    pub geolocation: Option<Geolocation>,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Accept-Language / navigator.languages locale
    pub locale: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: 1280,
            viewport_height: 800,
            user_agent: None,
            timezone: Some("America/New_York".to_string()),
            geolocation: Some(Geolocation {
                latitude: 37.39,
                longitude: -122.08,
            }),
            chromium_path: None,
            sandbox: true,
            locale: "en-US".to_string(),
        }
    }
}

impl BrowserSettings {
    /// User agent for a new page; each call without a fixed one draws a
    /// fresh major version from [`CHROME_MAJOR_VERSIONS`].
    #[must_use]
    pub fn resolve_user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(|| {
            chrome_user_agent(rand::thread_rng().gen_range(CHROME_MAJOR_VERSIONS))
        })
    }
}

/// Per-operation bounds, all in milliseconds.
///
/// Bounds are independent: a sequence of presses does not share a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Page load
    pub navigation_ms: u64,
    /// "Stay signed out" prompt
    pub sign_in_ms: u64,
    /// Consent "accept" button
    pub consent_accept_ms: u64,
    /// Consent "reject" button, tried after accept times out
    pub consent_reject_ms: u64,
    /// Widget container becoming visible after search
    pub widget_container_ms: u64,
    /// Sentinel control inside the widget (each predicate)
    pub sentinel_ms: u64,
    /// Each control sampled by the readiness check
    pub control_ready_ms: u64,
    /// Display visibility before reading it
    pub display_ms: u64,
    /// Control clicks
    pub click_ms: u64,
    /// Priming digit click in the full-clear fallback
    pub prime_click_ms: u64,
    /// Plain last-entry-clear click
    pub clear_entry_ms: u64,
    /// Hold duration for a long press; tuned against the live widget
    pub long_press_ms: u64,
    /// Polling interval for every wait
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 10_000,
            sign_in_ms: 2_000,
            consent_accept_ms: 3_000,
            consent_reject_ms: 2_000,
            widget_container_ms: 10_000,
            sentinel_ms: 5_000,
            control_ready_ms: 2_000,
            display_ms: 1_500,
            click_ms: 5_000,
            prime_click_ms: 3_000,
            clear_entry_ms: 3_000,
            long_press_ms: 1_000,
            poll_interval_ms: crate::wait::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Timeouts {
    /// Long-press hold as a Duration
    #[must_use]
    pub const fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    /// Wait options for a bound from this table
    #[must_use]
    pub const fn wait(&self, timeout_ms: u64) -> crate::wait::WaitOptions {
        crate::wait::WaitOptions::from_millis(timeout_ms).with_poll_interval(self.poll_interval_ms)
    }

    fn named(&self) -> [(&'static str, u64); 13] {
        [
            ("navigation_ms", self.navigation_ms),
            ("sign_in_ms", self.sign_in_ms),
            ("consent_accept_ms", self.consent_accept_ms),
            ("consent_reject_ms", self.consent_reject_ms),
            ("widget_container_ms", self.widget_container_ms),
            ("sentinel_ms", self.sentinel_ms),
            ("control_ready_ms", self.control_ready_ms),
            ("display_ms", self.display_ms),
            ("click_ms", self.click_ms),
            ("prime_click_ms", self.prime_click_ms),
            ("clear_entry_ms", self.clear_entry_ms),
            ("long_press_ms", self.long_press_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ]
    }
}

/// Full run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Search engine start page
    pub base_url: String,
    /// Query that brings up the calculator widget
    pub query: String,
    /// Where diagnostic screenshots go
    pub reports_dir: PathBuf,
    /// Setup attempts per scenario (2 = one retry after a reload)
    pub setup_attempts: u32,
    /// CAPTCHA handling
    pub captcha: CaptchaPolicy,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Per-operation bounds
    pub timeouts: Timeouts,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.google.com".to_string(),
            query: "calculator".to_string(),
            reports_dir: PathBuf::from("reports"),
            setup_attempts: 2,
            captcha: CaptchaPolicy::Auto,
            browser: BrowserSettings::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl ProbeConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from YAML; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the values are invalid.
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    /// Set the reports directory
    #[must_use]
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    /// Set the long-press hold duration
    #[must_use]
    pub const fn with_long_press_ms(mut self, ms: u64) -> Self {
        self.timeouts.long_press_ms = ms;
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Config`] describing the first invalid value.
    pub fn validate(&self) -> ProbeResult<()> {
        if self.setup_attempts == 0 {
            return Err(config_error("setup_attempts must be at least 1"));
        }
        if self.query.trim().is_empty() {
            return Err(config_error("query must not be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(config_error(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        for (name, value) in self.timeouts.named() {
            if value > MAX_TIMEOUT_MS {
                return Err(config_error(format!(
                    "timeouts.{name} = {value} exceeds {MAX_TIMEOUT_MS}"
                )));
            }
        }
        if self.timeouts.long_press_ms == 0 {
            return Err(config_error("timeouts.long_press_ms must be positive"));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(config_error("timeouts.poll_interval_ms must be positive"));
        }
        if let Some(geo) = self.browser.geolocation {
            if !(-90.0..=90.0).contains(&geo.latitude) || !(-180.0..=180.0).contains(&geo.longitude)
            {
                return Err(config_error(format!(
                    "browser.geolocation ({}, {}) is out of range",
                    geo.latitude, geo.longitude
                )));
            }
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> ProbeError {
    ProbeError::Config {
        message: message.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            let config = ProbeConfig::default();
            config.validate().unwrap();
            assert_eq!(config.setup_attempts, 2);
            assert_eq!(config.timeouts.long_press_ms, 1000);
            assert_eq!(config.timeouts.consent_accept_ms, 3000);
            assert!(!config.browser.headless);
        }

        #[test]
        fn test_builder_overrides() {
            let config = ProbeConfig::new()
                .with_headless(true)
                .with_reports_dir("/tmp/out")
                .with_long_press_ms(1500);
            assert!(config.browser.headless);
            assert_eq!(config.reports_dir, PathBuf::from("/tmp/out"));
            assert_eq!(config.timeouts.long_press(), Duration::from_millis(1500));
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = ProbeConfig::from_yaml_str(
                "query: calc\ntimeouts:\n  long_press_ms: 800\nbrowser:\n  headless: true\n",
            )
            .unwrap();
            assert_eq!(config.query, "calc");
            assert_eq!(config.timeouts.long_press_ms, 800);
            assert_eq!(config.timeouts.display_ms, 1500);
            assert!(config.browser.headless);
            assert_eq!(config.browser.viewport_width, 1280);
        }

        #[test]
        fn test_captcha_policy_snake_case() {
            let config = ProbeConfig::from_yaml_str("captcha: prompt\n").unwrap();
            assert_eq!(config.captcha, CaptchaPolicy::Prompt);
        }

        #[test]
        fn test_zero_attempts_rejected() {
            let err = ProbeConfig::from_yaml_str("setup_attempts: 0\n").unwrap_err();
            assert!(err.to_string().contains("setup_attempts"));
        }

        #[test]
        fn test_huge_timeout_rejected() {
            let err =
                ProbeConfig::from_yaml_str("timeouts:\n  click_ms: 99999999\n").unwrap_err();
            assert!(err.to_string().contains("timeouts.click_ms"));
        }

        #[test]
        fn test_malformed_yaml_is_yaml_error() {
            let err = ProbeConfig::from_yaml_str("query: [unterminated").unwrap_err();
            assert!(matches!(err, ProbeError::Yaml(_)));
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("calcprobe.yaml");
            std::fs::write(&path, "base_url: http://localhost:8080\n").unwrap();
            let config = ProbeConfig::load(&path).unwrap();
            assert_eq!(config.base_url, "http://localhost:8080");
        }
    }

    mod browser_tests {
        use super::*;

        #[test]
        fn test_generated_user_agent_in_range() {
            let settings = BrowserSettings::default();
            for _ in 0..50 {
                let ua = settings.resolve_user_agent();
                let major: u32 = ua
                    .split("Chrome/")
                    .nth(1)
                    .and_then(|rest| rest.split('.').next())
                    .unwrap()
                    .parse()
                    .unwrap();
                assert!(CHROME_MAJOR_VERSIONS.contains(&major), "{ua}");
            }
        }

        #[test]
        fn test_fixed_user_agent_wins() {
            let settings = BrowserSettings {
                user_agent: Some("calcprobe/1.0".to_string()),
                ..BrowserSettings::default()
            };
            assert_eq!(settings.resolve_user_agent(), "calcprobe/1.0");
        }

        #[test]
        fn test_default_context_is_us_east() {
            let settings = BrowserSettings::default();
            assert_eq!(settings.timezone.as_deref(), Some("America/New_York"));
            let geo = settings.geolocation.unwrap();
            assert_eq!(geo.latitude, 37.39);
            assert_eq!(geo.longitude, -122.08);
        }

        #[test]
        fn test_yaml_clears_overrides() {
            let config = ProbeConfig::from_yaml_str(
                "browser:\n  timezone: null\n  geolocation: null\n",
            )
            .unwrap();
            assert!(config.browser.timezone.is_none());
            assert!(config.browser.geolocation.is_none());
        }

        #[test]
        fn test_out_of_range_geolocation_rejected() {
            let err = ProbeConfig::from_yaml_str(
                "browser:\n  geolocation:\n    latitude: 91.0\n    longitude: 0.0\n",
            )
            .unwrap_err();
            assert!(err.to_string().contains("browser.geolocation"));
        }
    }

    mod captcha_policy_tests {
        use super::*;

        #[test]
        fn test_auto_follows_ci() {
            assert!(CaptchaPolicy::Auto.should_skip(true));
            assert!(!CaptchaPolicy::Auto.should_skip(false));
        }

        #[test]
        fn test_explicit_policies_ignore_ci() {
            assert!(CaptchaPolicy::Skip.should_skip(false));
            assert!(!CaptchaPolicy::Prompt.should_skip(true));
        }
    }
}
