//! Wait mechanisms
//!
//! Bounded polling of element state. Every wait in the crate goes through
//! [`wait_for_state`]; there is no implicit deadline shared across calls.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::driver::{ElementProbe, ElementState, PageDriver};
use crate::locator::Selector;
use crate::result::{ProbeError, ProbeResult};

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl WaitOptions {
    /// Wait up to `timeout` with the default polling interval
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Wait up to `timeout_ms` milliseconds
    #[must_use]
    pub const fn from_millis(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Poll `selector` until it reaches `state` or the timeout expires.
///
/// The element is probed at least once, so a zero timeout is a plain check.
///
/// # Errors
///
/// Returns [`ProbeError::Timeout`] when the deadline passes, or the driver's
/// own error if probing fails.
pub async fn wait_for_state<D>(
    driver: &D,
    selector: &Selector,
    state: ElementState,
    options: &WaitOptions,
) -> ProbeResult<ElementProbe>
where
    D: PageDriver + ?Sized,
{
    let deadline = Instant::now() + options.timeout();
    loop {
        let probe = driver.probe(selector).await?;
        if probe.satisfies(state) {
            return Ok(probe);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ProbeError::Timeout {
                what: format!("{selector} to be {state}"),
                ms: options.timeout_ms,
            });
        }
        sleep(options.poll_interval().min(deadline - now)).await;
    }
}

/// Like [`wait_for_state`], but an expired wait is `Ok(false)`.
///
/// Used for optional elements whose absence is the common case.
///
/// # Errors
///
/// Returns the driver's error if probing fails.
pub async fn appears_within<D>(
    driver: &D,
    selector: &Selector,
    state: ElementState,
    options: &WaitOptions,
) -> ProbeResult<bool>
where
    D: PageDriver + ?Sized,
{
    match wait_for_state(driver, selector, state, options).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_timeout() => Ok(false),
        Err(e) => Err(e),
    }
}
