//! Page Object Model support
//!
//! Each page object owns a [`LocatorMap`] and exposes semantic operations
//! built on it. The trait only carries what the harness needs generically:
//! a name for logs and the map for call-time resolution.

use crate::driver::{ElementState, PageDriver};
use crate::locator::{LocatorMap, Selector};
use crate::result::ProbeResult;
use crate::wait::{wait_for_state, WaitOptions};

/// Trait for page objects representing a page or component in the UI.
pub trait PageObject {
    /// Name used in log lines
    fn page_name(&self) -> &str;

    /// Locator table backing this page object
    fn locators(&self) -> &LocatorMap;

    /// Logical name of an element whose presence means the page is usable
    fn ready_selector(&self) -> Option<&str> {
        None
    }

    /// Resolve a logical name against this page's locator table
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProbeError::UnknownElement`] if the name is absent.
    fn selector(&self, name: &str) -> ProbeResult<&Selector> {
        self.locators().resolve(name)
    }
}

/// Wait for the page's ready element to become visible.
///
/// Pages without a ready element return immediately.
///
/// # Errors
///
/// Returns [`crate::ProbeError::UnknownElement`] if the ready element is not
/// in the page's map, or [`crate::ProbeError::Timeout`] if it stays hidden.
pub async fn wait_until_ready<P, D>(page: &P, driver: &D, options: &WaitOptions) -> ProbeResult<()>
where
    P: PageObject + Sync + ?Sized,
    D: PageDriver + ?Sized,
{
    let Some(name) = page.ready_selector() else {
        return Ok(());
    };
    let selector = page.selector(name)?;
    tracing::debug!(page = page.page_name(), element = name, "waiting for page");
    wait_for_state(driver, selector, ElementState::Visible, options).await?;
    Ok(())
}
