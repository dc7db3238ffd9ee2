//! Result and error types for calcprobe.

use thiserror::Error;

/// Result type for calcprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving the search page and calculator widget
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Logical element name missing from a locator map
    #[error("Unknown element '{name}' in locator map '{map}'")]
    UnknownElement {
        /// Locator map the lookup ran against
        map: String,
        /// Logical name that was requested
        name: String,
    },

    /// Control name that the widget does not have
    #[error("Unknown control '{control}'")]
    UnknownControl {
        /// Requested control
        control: String,
    },

    /// Widget controls or display did not become usable in time
    #[error("Calculator not ready: {message}")]
    WidgetNotReady {
        /// Error message
        message: String,
    },

    /// Display could not be read
    #[error("Failed to read display: {message}")]
    DisplayUnavailable {
        /// Error message
        message: String,
    },

    /// A digit click did not show up on the display
    #[error("Button press '{control}' not registered. Display: {display}")]
    ClickNotRegistered {
        /// Control that was pressed
        control: String,
        /// Display text after the press
        display: String,
    },

    /// Display did not match the expected value
    #[error("Expected {expected}, got {actual}")]
    AssertionFailed {
        /// Expected display text
        expected: String,
        /// Actual display text
        actual: String,
    },

    /// A bounded wait expired
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Scenario cannot run in this environment (e.g. CAPTCHA under CI)
    #[error("Skipped: {reason}")]
    Skipped {
        /// Why the scenario was skipped
        reason: String,
    },

    /// Search did not bring up the widget
    #[error("Failed to search for calculator: {message}")]
    SearchFailed {
        /// Error message
        message: String,
    },

    /// Widget setup failed after all attempts
    #[error("Failed to initialize calculator after {attempts} attempt(s): {message}")]
    SetupFailed {
        /// Attempts made
        attempts: u32,
        /// Last error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page-level driver error (click, fill, evaluate)
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Whether this error is an expired bounded wait
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the scenario should be reported as skipped rather than failed
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}
