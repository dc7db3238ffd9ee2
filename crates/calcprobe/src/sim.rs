//! In-process model of the search page and calculator widget.
//!
//! [`SimulatedPage`] implements [`PageDriver`] against a small state machine
//! that behaves like the live widget: overlays that come and go, a widget
//! that appears some time after the search, and tap vs hold semantics on
//! the clear controls. Knobs in [`SimOptions`] inject the failures the
//! recovery paths exist for.
//!
//! Selectors are resolved by identity against the default locator tables,
//! so a page object pointed at this driver exercises its real tables.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use crate::calculator::{self, Control};
use crate::driver::{ElementProbe, PageDriver};
use crate::fixture::BrowserHost;
use crate::locator::Selector;
use crate::result::{ProbeError, ProbeResult};
use crate::search;

/// PNG file signature; the simulated screenshot is just the header
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Which consent buttons the simulated dialog offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentMode {
    /// No consent dialog
    #[default]
    None,
    /// "Accept all" and "Reject all"
    AcceptAndReject,
    /// Only "Reject all"
    RejectOnly,
}

/// Behavior knobs for [`SimulatedPage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOptions {
    /// Consent dialog shown after navigation
    pub consent: ConsentMode,
    /// "Stay signed out" prompt shown after navigation
    pub sign_in_popup: bool,
    /// CAPTCHA challenge shown after navigation
    pub captcha: bool,
    /// Whether a search ever brings up the widget
    pub widget_available: bool,
    /// Delay between submitting the search and the widget rendering
    pub widget_delay: Duration,
    /// Time a navigation takes
    pub navigation_delay: Duration,
    /// Number of initial navigations that fail at the transport
    pub fail_navigations: u32,
    /// Number of initial searches that render no widget
    pub fail_searches: u32,
    /// Number of initial full-clear clicks that do not register
    pub all_clear_misses: u32,
    /// Digit clicks never reach the display
    pub stale_digits: bool,
    /// Controls rendered but disabled
    pub disabled_controls: Vec<Control>,
    /// Shortest hold the clear controls treat as a long press
    pub hold_threshold: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            consent: ConsentMode::None,
            sign_in_popup: false,
            captcha: false,
            widget_available: true,
            widget_delay: Duration::ZERO,
            navigation_delay: Duration::ZERO,
            fail_navigations: 0,
            fail_searches: 0,
            all_clear_misses: 0,
            stale_digits: false,
            disabled_controls: Vec::new(),
            hold_threshold: Duration::from_millis(600),
        }
    }
}

impl SimOptions {
    /// Overlays and latency roughly like a fresh browser profile
    #[must_use]
    pub fn live_like() -> Self {
        Self {
            consent: ConsentMode::AcceptAndReject,
            sign_in_popup: true,
            widget_delay: Duration::from_millis(400),
            navigation_delay: Duration::from_millis(250),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    SearchInput,
    SearchButton,
    StaySignedOut,
    AcceptConsent,
    RejectConsent,
    WidgetContainer,
    CaptchaFrame,
    CaptchaText,
    Display,
    Control(Control),
}

impl Element {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "search_input" => Self::SearchInput,
            "search_button" => Self::SearchButton,
            "stay_signed_out" => Self::StaySignedOut,
            "accept_consent" => Self::AcceptConsent,
            "reject_consent" => Self::RejectConsent,
            "widget_container" => Self::WidgetContainer,
            "widget_sentinel" => Self::Control(Control::One),
            "captcha_frame" => Self::CaptchaFrame,
            "captcha_text" => Self::CaptchaText,
            calculator::DISPLAY => Self::Display,
            other => Self::Control(other.parse().ok()?),
        })
    }

    fn label(self) -> &'static str {
        match self {
            Self::SearchInput => "search_input",
            Self::SearchButton => "search_button",
            Self::StaySignedOut => "stay_signed_out",
            Self::AcceptConsent => "accept_consent",
            Self::RejectConsent => "reject_consent",
            Self::WidgetContainer => "widget_container",
            Self::CaptchaFrame => "captcha_frame",
            Self::CaptchaText => "captcha_text",
            Self::Display => calculator::DISPLAY,
            Self::Control(c) => c.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Operator(Control),
}

/// Expression entry with the widget's display conventions
#[derive(Debug, Default)]
struct CalcModel {
    tokens: Vec<Token>,
    result: Option<String>,
}

impl CalcModel {
    fn display(&self) -> String {
        if self.tokens.is_empty() {
            return self.result.clone().unwrap_or_else(|| "0".to_string());
        }
        self.tokens
            .iter()
            .map(|t| match t {
                Token::Number(n) => n.as_str(),
                Token::Operator(op) => op.name(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn reset(&mut self) {
        self.tokens.clear();
        self.result = None;
    }

    fn input(&mut self, control: Control) {
        match control {
            Control::AllClear => self.reset(),
            Control::ClearEntry => self.clear_entry(),
            Control::Equals => self.equals(),
            Control::Percent => self.percent(),
            Control::Decimal => self.decimal(),
            op if op.is_operator() => self.operator(op),
            digit => {
                if let Some(d) = digit.digit() {
                    self.digit(d);
                }
            }
        }
    }

    fn digit(&mut self, d: char) {
        if self.result.take().is_some() {
            self.tokens.clear();
        }
        match self.tokens.last_mut() {
            Some(Token::Number(n)) if n.as_str() == "0" => *n = d.to_string(),
            Some(Token::Number(n)) => n.push(d),
            _ => self.tokens.push(Token::Number(d.to_string())),
        }
    }

    fn decimal(&mut self) {
        if self.result.take().is_some() {
            self.tokens.clear();
        }
        match self.tokens.last_mut() {
            Some(Token::Number(n)) if n.contains('.') => {}
            Some(Token::Number(n)) => n.push('.'),
            _ => self.tokens.push(Token::Number("0.".to_string())),
        }
    }

    fn operator(&mut self, op: Control) {
        if let Some(result) = self.result.take() {
            if result.parse::<f64>().is_err() {
                self.result = Some(result);
                return;
            }
            self.tokens = vec![Token::Number(result)];
        }
        match self.tokens.last_mut() {
            Some(Token::Operator(last)) => *last = op,
            Some(Token::Number(_)) => self.tokens.push(Token::Operator(op)),
            None => {
                self.tokens.push(Token::Number("0".to_string()));
                self.tokens.push(Token::Operator(op));
            }
        }
    }

    fn percent(&mut self) {
        if let Some(Token::Number(n)) = self.tokens.last_mut() {
            if let Ok(value) = n.parse::<f64>() {
                *n = format_number(value / 100.0);
            }
        }
    }

    fn equals(&mut self) {
        if self.tokens.is_empty() {
            return;
        }
        let value = evaluate(&self.tokens);
        self.result = Some(value.map_or_else(|| "Error".to_string(), format_number));
        self.tokens.clear();
    }

    /// Tap semantics: drop the last character of the operand being typed, or
    /// the trailing operator. A finished result clears entirely.
    fn clear_entry(&mut self) {
        if self.result.take().is_some() {
            self.tokens.clear();
            return;
        }
        match self.tokens.last_mut() {
            Some(Token::Number(n)) if n.chars().count() > 1 => {
                n.pop();
            }
            Some(_) => {
                self.tokens.pop();
            }
            None => {}
        }
    }
}

/// Left-to-right with multiplication and division binding tighter
fn evaluate(tokens: &[Token]) -> Option<f64> {
    let mut terms: Vec<(Control, f64)> = Vec::new();
    let mut pending = Control::Add;
    for token in tokens {
        match token {
            Token::Number(n) => {
                let value: f64 = n.parse().ok()?;
                match (pending, terms.last_mut()) {
                    (Control::Multiply, Some((_, acc))) => *acc *= value,
                    (Control::Divide, Some((_, acc))) => {
                        if value == 0.0 {
                            return None;
                        }
                        *acc /= value;
                    }
                    _ => terms.push((pending, value)),
                }
            }
            Token::Operator(op) => pending = *op,
        }
    }
    Some(terms.iter().fold(0.0, |sum, (op, v)| {
        if *op == Control::Subtract {
            sum - v
        } else {
            sum + v
        }
    }))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug)]
struct PageState {
    options: SimOptions,
    loaded: bool,
    closed: bool,
    consent_resolved: bool,
    sign_in_visible: bool,
    captcha_visible: bool,
    query: String,
    widget_at: Option<Instant>,
    navigations_failed: u32,
    searches_failed: u32,
    all_clear_misses: u32,
    calc: CalcModel,
    history: Vec<String>,
}

impl PageState {
    fn consent_visible(&self) -> bool {
        self.loaded && self.options.consent != ConsentMode::None && !self.consent_resolved
    }

    fn widget_visible(&self) -> bool {
        self.loaded && self.widget_at.is_some_and(|at| Instant::now() >= at)
    }

    fn probe(&self, element: Element) -> ElementProbe {
        let shown = match element {
            Element::SearchInput | Element::SearchButton => self.loaded,
            Element::StaySignedOut => self.loaded && self.sign_in_visible,
            Element::AcceptConsent => {
                self.consent_visible() && self.options.consent == ConsentMode::AcceptAndReject
            }
            Element::RejectConsent => self.consent_visible(),
            Element::CaptchaFrame | Element::CaptchaText => self.loaded && self.captcha_visible,
            Element::WidgetContainer | Element::Display | Element::Control(_) => {
                self.widget_visible()
            }
        };
        if !shown {
            return ElementProbe::DETACHED;
        }
        let enabled = match element {
            Element::Control(c) => !self.options.disabled_controls.contains(&c),
            _ => true,
        };
        ElementProbe {
            attached: true,
            visible: true,
            enabled,
        }
    }

    fn submit(&mut self) {
        if self.captcha_visible || self.query.trim().is_empty() {
            return;
        }
        if self.searches_failed < self.options.fail_searches {
            self.searches_failed += 1;
            return;
        }
        if self.options.widget_available {
            self.widget_at = Some(Instant::now() + self.options.widget_delay);
        }
    }

    fn click(&mut self, element: Element, hold: Duration) -> ProbeResult<()> {
        let long = !hold.is_zero() && hold >= self.options.hold_threshold;
        match element {
            Element::StaySignedOut => self.sign_in_visible = false,
            Element::AcceptConsent | Element::RejectConsent => self.consent_resolved = true,
            Element::SearchButton => self.submit(),
            Element::Control(Control::AllClear) if self.all_clear_misses > 0 => {
                self.all_clear_misses -= 1;
                return Err(ProbeError::page("click on AC did not register"));
            }
            Element::Control(Control::AllClear | Control::ClearEntry) if long => {
                self.calc.reset();
            }
            Element::Control(c) if c.digit().is_some() && self.options.stale_digits => {}
            Element::Control(c) => self.calc.input(c),
            _ => {}
        }
        Ok(())
    }
}

/// Simulated browser page
#[derive(Debug)]
pub struct SimulatedPage {
    elements: HashMap<Selector, Element>,
    state: Mutex<PageState>,
}

impl SimulatedPage {
    /// New blank page; nothing is attached until [`PageDriver::goto`]
    #[must_use]
    pub fn new(options: SimOptions) -> Self {
        let mut elements = HashMap::new();
        // Widget first so the shared sentinel selector resolves to digit 1
        let tables = [calculator::default_locators(), search::default_locators()];
        for map in tables.iter().flatten() {
            for (name, selector) in map.iter() {
                if let Some(element) = Element::from_name(name) {
                    elements.entry(selector.clone()).or_insert(element);
                }
            }
        }
        let all_clear_misses = options.all_clear_misses;
        Self {
            elements,
            state: Mutex::new(PageState {
                options,
                loaded: false,
                closed: false,
                consent_resolved: false,
                sign_in_visible: false,
                captcha_visible: false,
                query: String::new(),
                widget_at: None,
                navigations_failed: 0,
                searches_failed: 0,
                all_clear_misses,
                calc: CalcModel::default(),
                history: Vec::new(),
            }),
        }
    }

    /// Load the page with the widget already rendered and no overlays
    pub fn show_widget(&self) {
        let mut state = self.lock();
        state.loaded = true;
        state.consent_resolved = true;
        state.widget_at = Some(Instant::now());
    }

    /// Clear the CAPTCHA the way a human would; the form is reset
    pub fn solve_captcha(&self) {
        let mut state = self.lock();
        state.captcha_visible = false;
        state.query.clear();
        state.history.push("solve_captcha".to_string());
    }

    /// Driver calls so far, as `method:target`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Whether `method` (or an exact `method:target` entry) was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        let prefix = format!("{method}:");
        self.lock()
            .history
            .iter()
            .any(|entry| entry == method || entry.starts_with(&prefix))
    }

    /// Whether the page has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current display text regardless of visibility
    #[must_use]
    pub fn display_text(&self) -> String {
        self.lock().calc.display()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn element(&self, selector: &Selector) -> Option<Element> {
        self.elements.get(selector).copied()
    }

    fn attached(&self, selector: &Selector) -> ProbeResult<Element> {
        let state = self.lock();
        match self.element(selector) {
            Some(element) if state.probe(element).attached => Ok(element),
            _ => Err(ProbeError::page(format!("no element matches {selector}"))),
        }
    }
}

#[async_trait]
impl PageDriver for SimulatedPage {
    async fn goto(&self, url: &str, timeout: Duration) -> ProbeResult<()> {
        let delay = {
            let mut state = self.lock();
            state.history.push(format!("goto:{url}"));
            if state.navigations_failed < state.options.fail_navigations {
                state.navigations_failed += 1;
                return Err(ProbeError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }
            state.options.navigation_delay
        };
        if delay > timeout {
            sleep(timeout).await;
            return Err(ProbeError::Navigation {
                url: url.to_string(),
                message: format!("load did not finish within {}ms", timeout.as_millis()),
            });
        }
        sleep(delay).await;

        let mut state = self.lock();
        state.loaded = true;
        state.sign_in_visible = state.options.sign_in_popup;
        state.captcha_visible = state.options.captcha;
        state.query.clear();
        state.widget_at = None;
        state.calc.reset();
        Ok(())
    }

    async fn reload(&self, timeout: Duration) -> ProbeResult<()> {
        let delay = {
            let mut state = self.lock();
            state.history.push("reload".to_string());
            if !state.loaded {
                return Err(ProbeError::Navigation {
                    url: "about:blank".to_string(),
                    message: "nothing to reload".to_string(),
                });
            }
            state.options.navigation_delay
        };
        if delay > timeout {
            sleep(timeout).await;
            return Err(ProbeError::Navigation {
                url: "reload".to_string(),
                message: format!("load did not finish within {}ms", timeout.as_millis()),
            });
        }
        sleep(delay).await;

        let mut state = self.lock();
        state.sign_in_visible = state.options.sign_in_popup;
        state.widget_at = None;
        state.query.clear();
        state.calc.reset();
        Ok(())
    }

    async fn probe(&self, selector: &Selector) -> ProbeResult<ElementProbe> {
        let state = self.lock();
        Ok(self
            .element(selector)
            .map_or(ElementProbe::DETACHED, |element| state.probe(element)))
    }

    async fn count(&self, selector: &Selector) -> ProbeResult<usize> {
        Ok(usize::from(self.probe(selector).await?.attached))
    }

    async fn dispatch_click(&self, selector: &Selector, hold: Duration) -> ProbeResult<()> {
        let element = self.attached(selector)?;
        self.lock()
            .history
            .push(format!("click:{}", element.label()));
        if !hold.is_zero() {
            sleep(hold).await;
        }
        self.lock().click(element, hold)
    }

    async fn fill(&self, selector: &Selector, text: &str) -> ProbeResult<()> {
        let element = self.attached(selector)?;
        let mut state = self.lock();
        state.history.push(format!("fill:{}", element.label()));
        if element != Element::SearchInput {
            return Err(ProbeError::page(format!("{selector} is not editable")));
        }
        if state.consent_visible() {
            return Err(ProbeError::page("search box is covered by the consent dialog"));
        }
        state.query = text.to_string();
        Ok(())
    }

    async fn press_key(&self, selector: &Selector, key: &str) -> ProbeResult<()> {
        let element = self.attached(selector)?;
        let mut state = self.lock();
        state.history.push(format!("key:{key}"));
        if element == Element::SearchInput && key == "Enter" {
            state.submit();
        }
        Ok(())
    }

    async fn inner_text(&self, selector: &Selector) -> ProbeResult<String> {
        let element = self.attached(selector)?;
        let state = self.lock();
        Ok(match element {
            Element::Display => state.calc.display(),
            Element::SearchInput => state.query.clone(),
            Element::Control(c) => c.name().to_string(),
            other => other.label().to_string(),
        })
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        self.lock().history.push("screenshot".to_string());
        Ok(PNG_SIGNATURE.to_vec())
    }

    async fn close(&self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

/// Browser host handing out [`SimulatedPage`]s
#[derive(Debug, Clone, Default)]
pub struct SimulatedHost {
    options: SimOptions,
}

impl SimulatedHost {
    /// Host whose pages use `options`
    #[must_use]
    pub const fn new(options: SimOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrowserHost for SimulatedHost {
    type Page = SimulatedPage;

    async fn new_page(&self) -> ProbeResult<SimulatedPage> {
        Ok(SimulatedPage::new(self.options.clone()))
    }

    async fn shutdown(&mut self) -> ProbeResult<()> {
        Ok(())
    }
}
