//! Screenshot capture for post-mortem diagnosis.
//!
//! Captures are advisory. A failed capture is logged and otherwise ignored
//! so it never replaces the error that triggered it.

use std::path::{Path, PathBuf};

use crate::driver::PageDriver;

/// Subdirectory for end-of-test screenshots
pub const TEST_SCREENSHOT_DIR: &str = "screenshots";

/// Writes tagged screenshots under a reports directory
#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    /// Capture into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Drop every capture
    #[must_use]
    pub const fn disabled() -> Self {
        Self { dir: None }
    }

    /// Reports directory, if capturing
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Where the screenshot for an operation tag lands
    #[must_use]
    pub fn path_for(&self, tag: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.png", sanitize(tag))))
    }

    /// Where the end-of-test screenshot for `test_name` lands
    #[must_use]
    pub fn test_path_for(&self, test_name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| {
            dir.join(TEST_SCREENSHOT_DIR)
                .join(format!("{}.png", sanitize(test_name)))
        })
    }

    /// Capture a screenshot tagged with the failing operation
    pub async fn capture<D>(&self, driver: &D, tag: &str) -> Option<PathBuf>
    where
        D: PageDriver + ?Sized,
    {
        let path = self.path_for(tag)?;
        write_screenshot(driver, path).await
    }

    /// Capture the end-of-test screenshot
    pub async fn capture_test<D>(&self, driver: &D, test_name: &str) -> Option<PathBuf>
    where
        D: PageDriver + ?Sized,
    {
        let path = self.test_path_for(test_name)?;
        write_screenshot(driver, path).await
    }
}

async fn write_screenshot<D>(driver: &D, path: PathBuf) -> Option<PathBuf>
where
    D: PageDriver + ?Sized,
{
    let bytes = match driver.screenshot().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "screenshot capture failed");
            return None;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(dir = %parent.display(), error = %e, "cannot create reports directory");
            return None;
        }
    }
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "screenshot saved");
            Some(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot write screenshot");
            None
        }
    }
}

/// Keep file names portable: ASCII alphanumerics, `-`, `_`, `.`
fn sanitize(tag: &str) -> String {
    let cleaned: String = tag
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
