//! Calculator widget page object.
//!
//! The widget keeps its own state; this controller never mirrors it. Every
//! operation is a guarded click against the locator map followed, where it
//! matters, by a fresh read of the display.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Timeouts;
use crate::diagnostics::Diagnostics;
use crate::driver::{ClickOptions, ElementState, PageDriver};
use crate::locator::{LocatorMap, Selector};
use crate::page_object::{self, PageObject};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::wait_for_state;

/// Logical name of the display readout in the widget's locator map
pub const DISPLAY: &str = "display";

/// Controls sampled by [`CalculatorPage::verify_ready`]
pub const READINESS_SAMPLE: [Control; 8] = [
    Control::One,
    Control::Five,
    Control::Nine,
    Control::Add,
    Control::Subtract,
    Control::Multiply,
    Control::Divide,
    Control::Equals,
];

/// A widget control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Control {
    /// Digit 0
    Zero,
    /// Digit 1
    One,
    /// Digit 2
    Two,
    /// Digit 3
    Three,
    /// Digit 4
    Four,
    /// Digit 5
    Five,
    /// Digit 6
    Six,
    /// Digit 7
    Seven,
    /// Digit 8
    Eight,
    /// Digit 9
    Nine,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `×`
    Multiply,
    /// `÷`
    Divide,
    /// `=`
    Equals,
    /// `.`
    Decimal,
    /// `%`
    Percent,
    /// Last-entry-clear (CE)
    ClearEntry,
    /// Full-clear (AC)
    AllClear,
}

impl Control {
    /// Every control, in locator-table order
    pub const ALL: [Self; 19] = [
        Self::Zero,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Equals,
        Self::Decimal,
        Self::Percent,
        Self::ClearEntry,
        Self::AllClear,
    ];

    /// Logical name, also the key in the locator map
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "×",
            Self::Divide => "÷",
            Self::Equals => "=",
            Self::Decimal => ".",
            Self::Percent => "%",
            Self::ClearEntry => "CE",
            Self::AllClear => "AC",
        }
    }

    /// File-name friendly form for screenshot tags
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Add => "plus",
            Self::Subtract => "minus",
            Self::Multiply => "times",
            Self::Divide => "divide",
            Self::Equals => "equals",
            Self::Decimal => "decimal",
            Self::Percent => "percent",
            other => other.name(),
        }
    }

    /// The digit character, for digit controls
    #[must_use]
    pub const fn digit(self) -> Option<char> {
        match self {
            Self::Zero => Some('0'),
            Self::One => Some('1'),
            Self::Two => Some('2'),
            Self::Three => Some('3'),
            Self::Four => Some('4'),
            Self::Five => Some('5'),
            Self::Six => Some('6'),
            Self::Seven => Some('7'),
            Self::Eight => Some('8'),
            Self::Nine => Some('9'),
            _ => None,
        }
    }

    /// Whether this is one of the four arithmetic operators
    #[must_use]
    pub const fn is_operator(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide
        )
    }

    /// Control for a single expression character
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::UnknownControl`] for characters with no control.
    pub fn from_char(c: char) -> ProbeResult<Self> {
        let mut buf = [0u8; 4];
        c.encode_utf8(&mut buf).parse()
    }
}

impl FromStr for Control {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" | "x" => return Ok(Self::Multiply),
            "/" => return Ok(Self::Divide),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ProbeError::UnknownControl {
                control: s.to_string(),
            })
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which clear control to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClearKind {
    /// CE: a tap removes the last token
    LastEntry,
    /// AC: resets the expression
    Full,
}

impl ClearKind {
    /// The control behind this kind
    #[must_use]
    pub const fn control(self) -> Control {
        match self {
            Self::LastEntry => Control::ClearEntry,
            Self::Full => Control::AllClear,
        }
    }
}

/// Default widget locator table (jsname attributes of the live widget)
///
/// # Errors
///
/// Fails only if the table repeats a name.
pub fn default_locators() -> ProbeResult<LocatorMap> {
    LocatorMap::from_entries(
        "calculator",
        [
            // Numbers
            ("0", Selector::css("div[jsname='bkEvMb']")),
            ("1", Selector::css("div[jsname='N10B9']")),
            ("2", Selector::css("div[jsname='lVjWed']")),
            ("3", Selector::css("div[jsname='KN1kY']")),
            ("4", Selector::css("div[jsname='xAP7E']")),
            ("5", Selector::css("div[jsname='Ax5wH']")),
            ("6", Selector::css("div[jsname='abcgof']")),
            ("7", Selector::css("div[jsname='rk7bOd']")),
            ("8", Selector::css("div[jsname='T7PMFe']")),
            ("9", Selector::css("div[jsname='XoxYJ']")),
            // Operators
            ("+", Selector::css("div[jsname='XSr6wc']")),
            ("-", Selector::css("div[jsname='pPHzQc']")),
            ("×", Selector::css("div[jsname='YovRWb']")),
            ("÷", Selector::css("div[jsname='WxTTNd']")),
            ("=", Selector::css("div[jsname='Pt8tGc']")),
            // Other buttons
            (".", Selector::css("div[jsname='YrdHyf']")),
            ("AC", Selector::css("div[jsname='SLn8gc']")),
            ("CE", Selector::css("div[jsname='H7sWPd']")),
            ("%", Selector::css("div[jsname='F0gbu']")),
            (DISPLAY, Selector::css("span#cwos")),
        ],
    )
}

/// Page object for the calculator widget
#[derive(Debug)]
pub struct CalculatorPage<D: PageDriver> {
    driver: Arc<D>,
    locators: LocatorMap,
    diagnostics: Diagnostics,
    timeouts: Timeouts,
}

impl<D: PageDriver> CalculatorPage<D> {
    /// Calculator page over `driver` with the default locator table
    ///
    /// # Errors
    ///
    /// Fails if the default locator table is invalid.
    pub fn new(driver: Arc<D>, diagnostics: Diagnostics, timeouts: Timeouts) -> ProbeResult<Self> {
        Ok(Self::with_locators(
            driver,
            default_locators()?,
            diagnostics,
            timeouts,
        ))
    }

    /// Calculator page with a custom locator table
    #[must_use]
    pub const fn with_locators(
        driver: Arc<D>,
        locators: LocatorMap,
        diagnostics: Diagnostics,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            driver,
            locators,
            diagnostics,
            timeouts,
        }
    }

    /// Check that a representative set of controls and the display are usable.
    ///
    /// Returns `true` or fails; it never reports "not ready" as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::WidgetNotReady`] naming the first control that
    /// was not visible and enabled in time. A sampled control or the display
    /// missing from the locator map fails before any wait with
    /// [`ProbeError::UnknownControl`] or [`ProbeError::UnknownElement`].
    pub async fn verify_ready(&self) -> ProbeResult<bool> {
        let selectors = READINESS_SAMPLE
            .into_iter()
            .map(|control| self.control_selector(control))
            .collect::<ProbeResult<Vec<_>>>()?;
        let display = self.locators.resolve(DISPLAY)?;

        let result = async {
            for selector in selectors {
                let wait = self.timeouts.wait(self.timeouts.control_ready_ms);
                wait_for_state(&*self.driver, selector, ElementState::Visible, &wait).await?;
                wait_for_state(&*self.driver, selector, ElementState::Enabled, &wait).await?;
            }
            let wait = self.timeouts.wait(self.timeouts.control_ready_ms);
            wait_for_state(&*self.driver, display, ElementState::Visible, &wait).await?;
            Ok::<_, ProbeError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!("calculator ready");
                Ok(true)
            }
            Err(e) => {
                self.capture("calculator_not_ready").await;
                Err(ProbeError::WidgetNotReady {
                    message: format!("Calculator buttons not available: {e}"),
                })
            }
        }
    }

    /// Press a control by logical name (e.g. `"7"`, `"×"`, `"AC"`).
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::UnknownControl`] for names with no control, or
    /// any error from [`CalculatorPage::press_control`].
    pub async fn press(&self, control: &str) -> ProbeResult<()> {
        let control: Control = control.parse()?;
        self.press_control(control).await
    }

    /// Press a control.
    ///
    /// Every control gets a forced click. Full-clear falls back to priming
    /// the widget with a digit and clicking again. Digits are verified
    /// against the display afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::UnknownControl`] if the locator map has no
    /// entry for the control, [`ProbeError::ClickNotRegistered`] if a digit
    /// does not show up on the display, or the click error.
    pub async fn press_control(&self, control: Control) -> ProbeResult<()> {
        let selector = self.control_selector(control)?;
        tracing::debug!(%control, "press");

        let result = async {
            let click = ClickOptions::new(self.click_timeout()).forced();
            if control == Control::AllClear {
                self.click_all_clear(selector, click).await?;
            } else {
                self.driver.click(selector, click).await?;
            }

            if let Some(digit) = control.digit() {
                let display = self.read_display().await?;
                if !display.contains(digit) {
                    return Err(ProbeError::ClickNotRegistered {
                        control: control.name().to_string(),
                        display,
                    });
                }
            }
            Ok(())
        }
        .await;

        if result.is_err() {
            self.capture(&format!("click_failed_{}", control.slug()))
                .await;
        }
        result
    }

    /// Forced full-clear click; if it does not register, press a digit to
    /// give the widget focus and try once more.
    async fn click_all_clear(&self, selector: &Selector, click: ClickOptions) -> ProbeResult<()> {
        match self.driver.click(selector, click).await {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(error = %first, "AC click did not register, priming widget");
                let prime = self.control_selector(Control::One)?;
                let prime_click =
                    ClickOptions::new(Duration::from_millis(self.timeouts.prime_click_ms));
                self.driver.click(prime, prime_click).await?;
                self.driver.click(selector, click).await
            }
        }
    }

    /// Read the display text.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::DisplayUnavailable`] if the display is not
    /// visible within the display bound or its text cannot be read, and
    /// [`ProbeError::UnknownElement`] if the map has no display entry.
    pub async fn read_display(&self) -> ProbeResult<String> {
        let display = self.locators.resolve(DISPLAY)?;
        let result = async {
            let wait = self.timeouts.wait(self.timeouts.display_ms);
            page_object::wait_until_ready(self, &*self.driver, &wait).await?;
            self.driver.inner_text(display).await
        }
        .await;

        match result {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => {
                self.capture("display_read_failed").await;
                Err(ProbeError::DisplayUnavailable {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Tap last-entry-clear, press each character of `expression`, and
    /// return the display.
    ///
    /// # Errors
    ///
    /// Returns the first failing press or display read.
    pub async fn evaluate(&self, expression: &str) -> ProbeResult<String> {
        tracing::debug!(expression, "evaluate");
        let result = async {
            self.clear_all(ClearKind::LastEntry, false).await?;
            for c in expression.chars() {
                self.press_control(Control::from_char(c)?).await?;
            }
            self.read_display().await
        }
        .await;

        if result.is_err() {
            self.capture("operation_failed").await;
        }
        result
    }

    /// Compare the display with `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::AssertionFailed`] with both values on mismatch.
    pub async fn assert_equals(&self, expected: &str) -> ProbeResult<()> {
        let actual = self.read_display().await?;
        if actual == expected {
            Ok(())
        } else {
            self.capture("assertion_failed").await;
            Err(ProbeError::AssertionFailed {
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Single tap on last-entry-clear
    ///
    /// # Errors
    ///
    /// Returns the click error.
    pub async fn clear_last_entry(&self) -> ProbeResult<()> {
        let selector = self.control_selector(Control::ClearEntry)?;
        let click = ClickOptions::new(Duration::from_millis(self.timeouts.clear_entry_ms));
        let result = self.driver.click(selector, click).await;
        if result.is_err() {
            self.capture("clear_last_entry_failed").await;
        }
        result
    }

    /// Click a clear control, holding it for the configured long-press
    /// duration when `long_press` is set.
    ///
    /// A tap on CE removes the last token; a hold on either control resets
    /// the widget to its zero state.
    ///
    /// # Errors
    ///
    /// Returns the click error.
    pub async fn clear_all(&self, kind: ClearKind, long_press: bool) -> ProbeResult<()> {
        let control = kind.control();
        let selector = self.control_selector(control)?;
        let mut click = ClickOptions::new(self.click_timeout());
        if long_press {
            click = click.with_hold(self.timeouts.long_press());
        }
        tracing::debug!(%control, long_press, "clear");

        let result = self.driver.click(selector, click).await;
        if result.is_err() {
            let tag = if long_press {
                format!("{}_long_press_failed", control.slug())
            } else {
                format!("{}_click_failed", control.slug())
            };
            self.capture(&tag).await;
        }
        result
    }

    /// The driver this page talks to
    #[must_use]
    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    fn control_selector(&self, control: Control) -> ProbeResult<&Selector> {
        self.locators
            .resolve(control.name())
            .map_err(|_| ProbeError::UnknownControl {
                control: control.name().to_string(),
            })
    }

    const fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.click_ms)
    }

    async fn capture(&self, tag: &str) {
        let _ = self.diagnostics.capture(&*self.driver, tag).await;
    }
}

impl<D: PageDriver> PageObject for CalculatorPage<D> {
    fn page_name(&self) -> &str {
        "calculator"
    }

    fn locators(&self) -> &LocatorMap {
        &self.locators
    }

    fn ready_selector(&self) -> Option<&str> {
        Some(DISPLAY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sim::{SimOptions, SimulatedPage};
    use proptest::prelude::*;

    async fn ready_page(options: SimOptions) -> (Arc<SimulatedPage>, CalculatorPage<SimulatedPage>) {
        let sim = Arc::new(SimulatedPage::new(options));
        sim.show_widget();
        let calc = CalculatorPage::new(sim.clone(), Diagnostics::disabled(), Timeouts::default())
            .unwrap();
        (sim, calc)
    }

    async fn press_all(calc: &CalculatorPage<SimulatedPage>, keys: &[&str]) {
        for key in keys {
            calc.press(key).await.unwrap();
        }
    }

    mod control_tests {
        use super::*;

        #[test]
        fn test_parse_names_and_aliases() {
            assert_eq!("AC".parse::<Control>().unwrap(), Control::AllClear);
            assert_eq!("×".parse::<Control>().unwrap(), Control::Multiply);
            assert_eq!("*".parse::<Control>().unwrap(), Control::Multiply);
            assert_eq!("/".parse::<Control>().unwrap(), Control::Divide);
            assert_eq!(Control::from_char('7').unwrap(), Control::Seven);
        }

        #[test]
        fn test_unknown_control() {
            let err = "sqrt".parse::<Control>().unwrap_err();
            assert!(matches!(err, ProbeError::UnknownControl { ref control } if control == "sqrt"));
            assert!(Control::from_char('(').is_err());
        }

        #[test]
        fn test_digits() {
            let digits: String = Control::ALL.iter().filter_map(|c| c.digit()).collect();
            assert_eq!(digits, "0123456789");
            assert!(Control::AllClear.digit().is_none());
        }

        #[test]
        fn test_slugs_are_file_safe() {
            for control in Control::ALL {
                assert!(control
                    .slug()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric()));
            }
        }

        #[test]
        fn test_every_control_resolves_to_non_empty_selector() {
            let map = default_locators().unwrap();
            for control in Control::ALL {
                let selector = map.resolve(control.name()).unwrap();
                assert!(!selector.to_string().is_empty(), "{control}");
            }
            assert!(map.resolve(DISPLAY).is_ok());
        }
    }

    mod readiness_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_ready_widget() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            assert!(calc.verify_ready().await.unwrap());
        }

        #[tokio::test(start_paused = true)]
        async fn test_disabled_operator_raises() {
            let options = SimOptions {
                disabled_controls: vec![Control::Divide],
                ..SimOptions::default()
            };
            let (_, calc) = ready_page(options).await;
            let err = calc.verify_ready().await.unwrap_err();
            assert!(matches!(err, ProbeError::WidgetNotReady { .. }));
            assert!(err.to_string().contains("enabled"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_widget_raises_and_captures() {
            let dir = tempfile::tempdir().unwrap();
            let sim = Arc::new(SimulatedPage::new(SimOptions::default()));
            let calc = CalculatorPage::new(
                sim.clone(),
                Diagnostics::new(dir.path()),
                Timeouts::default(),
            )
            .unwrap();
            assert!(calc.verify_ready().await.is_err());
            assert!(dir.path().join("calculator_not_ready.png").exists());
        }

        #[tokio::test(start_paused = true)]
        async fn test_incomplete_map_fails_before_waiting() {
            let dir = tempfile::tempdir().unwrap();
            let sim = Arc::new(SimulatedPage::new(SimOptions::default()));
            sim.show_widget();
            let map = LocatorMap::from_entries("partial", [(DISPLAY, Selector::css("span#cwos"))])
                .unwrap();
            let calc = CalculatorPage::with_locators(
                sim.clone(),
                map,
                Diagnostics::new(dir.path()),
                Timeouts::default(),
            );

            let started = tokio::time::Instant::now();
            let err = calc.verify_ready().await.unwrap_err();
            assert!(matches!(err, ProbeError::UnknownControl { ref control } if control == "1"));
            assert_eq!(started.elapsed(), Duration::ZERO);
            assert!(!dir.path().join("calculator_not_ready.png").exists());
        }

        #[tokio::test(start_paused = true)]
        async fn test_map_without_display_is_unknown_element() {
            let sim = Arc::new(SimulatedPage::new(SimOptions::default()));
            sim.show_widget();
            let map = LocatorMap::from_entries("buttons", [("1", Selector::css("div[jsname='N10B9']"))])
                .unwrap();
            let calc = CalculatorPage::with_locators(
                sim,
                map,
                Diagnostics::disabled(),
                Timeouts::default(),
            );
            let err = calc.read_display().await.unwrap_err();
            assert!(matches!(err, ProbeError::UnknownElement { ref name, .. } if name == DISPLAY));
        }
    }

    mod press_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_unknown_control_fails_fast() {
            let (sim, calc) = ready_page(SimOptions::default()).await;
            let err = calc.press("√").await.unwrap_err();
            assert!(matches!(err, ProbeError::UnknownControl { .. }));
            assert!(!sim.was_called("click"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_map_without_control_is_unknown_control() {
            let sim = Arc::new(SimulatedPage::new(SimOptions::default()));
            sim.show_widget();
            let map = LocatorMap::from_entries("partial", [(DISPLAY, Selector::css("span#cwos"))])
                .unwrap();
            let calc = CalculatorPage::with_locators(
                sim,
                map,
                Diagnostics::disabled(),
                Timeouts::default(),
            );
            let err = calc.press("5").await.unwrap_err();
            assert!(matches!(err, ProbeError::UnknownControl { ref control } if control == "5"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_ac_yields_zero_state() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            press_all(&calc, &["9", "+", "4"]).await;
            calc.press("AC").await.unwrap();
            assert_eq!(calc.read_display().await.unwrap(), "0");
        }

        #[tokio::test(start_paused = true)]
        async fn test_ac_fallback_primes_with_digit() {
            let options = SimOptions {
                all_clear_misses: 1,
                ..SimOptions::default()
            };
            let (sim, calc) = ready_page(options).await;
            press_all(&calc, &["4", "2"]).await;
            calc.press("AC").await.unwrap();
            assert_eq!(calc.read_display().await.unwrap(), "0");
            let clicks: Vec<_> = sim
                .history()
                .into_iter()
                .filter(|c| c.starts_with("click:"))
                .collect();
            assert_eq!(
                &clicks[clicks.len() - 3..],
                ["click:AC", "click:1", "click:AC"]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_ac_fallback_gives_up_after_second_miss() {
            let options = SimOptions {
                all_clear_misses: 2,
                ..SimOptions::default()
            };
            let (_, calc) = ready_page(options).await;
            assert!(calc.press("AC").await.is_err());
        }

        #[tokio::test(start_paused = true)]
        async fn test_stale_digit_is_click_not_registered() {
            let options = SimOptions {
                stale_digits: true,
                ..SimOptions::default()
            };
            let dir = tempfile::tempdir().unwrap();
            let sim = Arc::new(SimulatedPage::new(options));
            sim.show_widget();
            let calc =
                CalculatorPage::new(sim, Diagnostics::new(dir.path()), Timeouts::default())
                    .unwrap();
            let err = calc.press("7").await.unwrap_err();
            assert!(matches!(
                err,
                ProbeError::ClickNotRegistered { ref control, ref display } if control == "7" && display == "0"
            ));
            assert!(dir.path().join("click_failed_7.png").exists());
        }

        #[tokio::test(start_paused = true)]
        async fn test_display_unavailable_without_widget() {
            let sim = Arc::new(SimulatedPage::new(SimOptions::default()));
            let calc =
                CalculatorPage::new(sim, Diagnostics::disabled(), Timeouts::default()).unwrap();
            let err = calc.read_display().await.unwrap_err();
            assert!(matches!(err, ProbeError::DisplayUnavailable { .. }));
        }
    }

    mod clear_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_tap_ce_removes_last_digit_then_hold_ac_resets() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            press_all(&calc, &["1", "2", "3"]).await;
            calc.clear_all(ClearKind::LastEntry, false).await.unwrap();
            calc.assert_equals("12").await.unwrap();
            calc.clear_all(ClearKind::Full, true).await.unwrap();
            calc.assert_equals("0").await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_tap_ce_mid_expression_keeps_operator() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            press_all(&calc, &["4", "-", "6"]).await;
            calc.clear_last_entry().await.unwrap();
            calc.assert_equals("4 -").await.unwrap();
            press_all(&calc, &["7", "+", "9"]).await;
            calc.clear_all(ClearKind::LastEntry, true).await.unwrap();
            calc.assert_equals("0").await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_long_press_full_clear_is_idempotent() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            press_all(&calc, &["8", "×", "3"]).await;
            calc.clear_all(ClearKind::Full, true).await.unwrap();
            let first = calc.read_display().await.unwrap();
            calc.clear_all(ClearKind::Full, true).await.unwrap();
            let second = calc.read_display().await.unwrap();
            assert_eq!(first, "0");
            assert_eq!(first, second);
        }

        #[tokio::test(start_paused = true)]
        async fn test_short_hold_below_threshold_is_a_tap() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            let calc = CalculatorPage::new(
                calc.driver().clone(),
                Diagnostics::disabled(),
                Timeouts {
                    long_press_ms: 100,
                    ..Timeouts::default()
                },
            )
            .unwrap();
            press_all(&calc, &["5", "6"]).await;
            calc.clear_all(ClearKind::LastEntry, true).await.unwrap();
            calc.assert_equals("5").await.unwrap();
        }

        #[tokio::test(start_paused = true)]
        async fn test_assert_equals_reports_both_values() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            press_all(&calc, &["3"]).await;
            let err = calc.assert_equals("4").await.unwrap_err();
            assert!(matches!(
                err,
                ProbeError::AssertionFailed { ref expected, ref actual } if expected == "4" && actual == "3"
            ));
        }
    }

    mod evaluate_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_arithmetic_table() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            for (expression, expected) in [
                ("2+3=", "5"),
                ("5-2=", "3"),
                ("4×3=", "12"),
                ("8÷2=", "4"),
                ("1.5+2.5=", "4"),
                ("10÷2+3×4-5=", "12"),
            ] {
                calc.press("AC").await.unwrap();
                assert_eq!(calc.evaluate(expression).await.unwrap(), expected, "{expression}");
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_unknown_character_fails() {
            let (_, calc) = ready_page(SimOptions::default()).await;
            let err = calc.evaluate("2^3=").await.unwrap_err();
            assert!(matches!(err, ProbeError::UnknownControl { ref control } if control == "^"));
        }
    }

    fn digit_key() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"])
    }

    fn any_key() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "+", "-", "×", "÷", "=", ".", "%",
            "CE",
        ])
    }

    fn paused_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_ac_always_reaches_zero(keys in prop::collection::vec(any_key(), 0..12)) {
            let display = paused_runtime().block_on(async {
                let (_, calc) = ready_page(SimOptions::default()).await;
                for key in keys {
                    // only the state after AC is checked
                    let _ = calc.press(key).await;
                }
                calc.press("AC").await.unwrap();
                calc.read_display().await.unwrap()
            });
            prop_assert_eq!(display, "0");
        }

        #[test]
        fn prop_tap_ce_drops_exactly_one_digit(digits in prop::collection::vec(digit_key(), 2..8)) {
            let (before, after) = paused_runtime().block_on(async {
                let (_, calc) = ready_page(SimOptions::default()).await;
                press_all(&calc, &digits).await;
                let before = calc.read_display().await.unwrap();
                calc.clear_last_entry().await.unwrap();
                (before, calc.read_display().await.unwrap())
            });
            let mut expected = before[..before.len() - 1].to_string();
            if expected.is_empty() {
                expected.push('0');
            }
            prop_assert_eq!(after, expected);
        }
    }
}
