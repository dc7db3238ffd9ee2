//! calcprobe: end-to-end checks for a search engine's calculator widget
//!
//! Drives a browser to the search page, gets past consent, sign-in and
//! CAPTCHA overlays, locates the embedded calculator and asserts its
//! arithmetic and clear-button behavior.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Scenario ──► Harness ──► prepare_calculator (1 retry)          │
//! │                               │                                 │
//! │               ┌───────────────┴───────────────┐                 │
//! │               ▼                               ▼                 │
//! │          SearchPage ──► OverlayResolver   CalculatorPage        │
//! │               │                               │                 │
//! │               └──────────► LocatorMap ◄───────┘                 │
//! │                               │                                 │
//! │                          PageDriver                             │
//! │                 (ChromiumPage | SimulatedPage)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod calculator;
#[cfg(feature = "browser")]
pub mod chromium;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod fixture;
pub mod locator;
pub mod overlay;
pub mod page_object;
pub mod result;
pub mod scenario;
pub mod search;
pub mod sim;
pub mod wait;

pub use calculator::{CalculatorPage, ClearKind, Control};
#[cfg(feature = "browser")]
pub use chromium::{ChromiumHost, ChromiumPage};
pub use config::{BrowserSettings, CaptchaPolicy, Geolocation, ProbeConfig, Timeouts};
pub use diagnostics::Diagnostics;
pub use driver::{ClickOptions, ElementProbe, ElementState, PageDriver};
pub use fixture::{prepare_calculator, BrowserHost, Harness, PageScope, ScopeState};
pub use locator::{LocatorMap, Selector};
pub use overlay::{ManualIntervention, OverlayResolver, TerminalPrompt};
pub use page_object::PageObject;
pub use result::{ProbeError, ProbeResult};
pub use scenario::{
    all_scenarios, filter_scenarios, Scenario, ScenarioKind, ScenarioOutcome, ScenarioStatus, Step,
};
pub use search::SearchPage;
pub use sim::{ConsentMode, SimOptions, SimulatedHost, SimulatedPage};
pub use wait::{wait_for_state, WaitOptions};
