//! PageDriver - abstract page automation trait
//!
//! Page objects never touch a browser API directly. They go through
//! [`PageDriver`], which has two implementations:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  PageDriver (async trait)                                  │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────┐    ┌─────────────────────────┐  │
//! │  │  ChromiumPage         │    │  SimulatedPage          │  │
//! │  │  (feature "browser")  │    │  (in-process widget     │  │
//! │  │  CDP via chromiumoxide│    │   model, tests/dry runs)│  │
//! │  └───────────────────────┘    └─────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations provide primitive operations against elements that are
//! expected to exist. Actionability waiting lives in the provided
//! [`PageDriver::click`] so both drivers share it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::locator::Selector;
use crate::result::ProbeResult;
use crate::wait::{wait_for_state, WaitOptions};

/// Point-in-time state of the first element matching a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementProbe {
    /// Element is present in the DOM
    pub attached: bool,
    /// Element has a non-empty box and is not hidden by style
    pub visible: bool,
    /// Element is not disabled
    pub enabled: bool,
}

impl ElementProbe {
    /// Probe for a selector with no match
    pub const DETACHED: Self = Self {
        attached: false,
        visible: false,
        enabled: false,
    };

    /// Probe for a present, visible, enabled element
    pub const READY: Self = Self {
        attached: true,
        visible: true,
        enabled: true,
    };

    /// Whether this probe satisfies a wait state
    #[must_use]
    pub const fn satisfies(&self, state: ElementState) -> bool {
        match state {
            ElementState::Attached => self.attached,
            ElementState::Visible => self.attached && self.visible,
            ElementState::Enabled => self.attached && self.enabled,
            ElementState::Actionable => self.attached && self.visible && self.enabled,
            ElementState::Hidden => !self.attached || !self.visible,
        }
    }
}

/// Element states a wait can target (Playwright parity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// Present in the DOM
    Attached,
    /// Present and visible
    Visible,
    /// Present and enabled
    Enabled,
    /// Visible and enabled (what a normal click waits for)
    Actionable,
    /// Absent or not visible
    Hidden,
}

impl ElementState {
    /// Name used in log lines and timeout messages
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
            Self::Enabled => "enabled",
            Self::Actionable => "actionable",
            Self::Hidden => "hidden",
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOptions {
    /// How long to wait for the element before giving up
    pub timeout: Duration,
    /// Skip the visible/enabled check and click as soon as the element is attached
    pub force: bool,
    /// Time between mouse down and mouse up (zero for a tap)
    pub hold: Duration,
}

impl ClickOptions {
    /// Normal tap with the given timeout
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            force: false,
            hold: Duration::ZERO,
        }
    }

    /// Force the click
    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Hold the button down for `hold` before releasing
    #[must_use]
    pub const fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Whether this is a long press
    #[must_use]
    pub const fn is_hold(&self) -> bool {
        !self.hold.is_zero()
    }
}

/// Abstract page driver
///
/// One driver instance is one browser page. All methods take `&self`;
/// implementations serialize access internally.
#[async_trait]
pub trait PageDriver: Send + Sync + fmt::Debug {
    /// Navigate to `url`, failing if the load does not finish within `timeout`
    async fn goto(&self, url: &str, timeout: Duration) -> ProbeResult<()>;

    /// Reload the current page within `timeout`
    async fn reload(&self, timeout: Duration) -> ProbeResult<()>;

    /// Current state of the first element matching `selector`
    async fn probe(&self, selector: &Selector) -> ProbeResult<ElementProbe>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &Selector) -> ProbeResult<usize>;

    /// Press and release the mouse on the element's center, holding for `hold`
    async fn dispatch_click(&self, selector: &Selector, hold: Duration) -> ProbeResult<()>;

    /// Replace the value of an input element
    async fn fill(&self, selector: &Selector, text: &str) -> ProbeResult<()>;

    /// Focus the element and press a named key (e.g. "Enter")
    async fn press_key(&self, selector: &Selector, key: &str) -> ProbeResult<()>;

    /// Rendered text of the element
    async fn inner_text(&self, selector: &Selector) -> ProbeResult<String>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> ProbeResult<Vec<u8>>;

    /// Close the page
    async fn close(&self) -> ProbeResult<()>;

    /// Click an element, auto-waiting for it first.
    ///
    /// A normal click waits until the element is visible and enabled; a
    /// forced click only waits for it to be attached.
    async fn click(&self, selector: &Selector, options: ClickOptions) -> ProbeResult<()> {
        let state = if options.force {
            ElementState::Attached
        } else {
            ElementState::Actionable
        };
        wait_for_state(self, selector, state, &WaitOptions::new(options.timeout)).await?;
        tracing::debug!(%selector, force = options.force, hold_ms = options.hold.as_millis() as u64, "click");
        self.dispatch_click(selector, options.hold).await
    }
}
