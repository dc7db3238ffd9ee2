//! Chromium over CDP (feature `browser`).
//!
//! [`ChromiumHost`] owns the browser process and the CDP event pump;
//! [`ChromiumPage`] implements [`PageDriver`] by evaluating small scripts
//! built from [`Selector::to_query`] and dispatching real mouse and key
//! events, so clicks go through the page's own hit testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetGeolocationOverrideParams, SetTimezoneOverrideParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::BrowserSettings;
use crate::driver::{ElementProbe, PageDriver};
use crate::fixture::BrowserHost;
use crate::locator::Selector;
use crate::result::{ProbeError, ProbeResult};

/// Hides the usual automation fingerprints from the page
const STEALTH_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.navigator.chrome = { runtime: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
    parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery(parameters)
);
";

fn page_error(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::page(e.to_string())
}

/// Chromium browser session
#[derive(Debug)]
pub struct ChromiumHost {
    browser: Arc<Mutex<CdpBrowser>>,
    handle: tokio::task::JoinHandle<()>,
    settings: BrowserSettings,
}

impl ChromiumHost {
    /// Launch chromium with `settings`
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::BrowserLaunch`] if the process cannot start.
    pub async fn launch(settings: &BrowserSettings) -> ProbeResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg(format!("--lang={}", settings.locale));

        if !settings.headless {
            builder = builder.with_head();
        }

        if !settings.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = settings.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder
            .build()
            .map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });

        if settings.geolocation.is_some() {
            browser
                .execute(GrantPermissionsParams::new(vec![PermissionType::Geolocation]))
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: format!("cannot grant geolocation: {e}"),
                })?;
        }

        tracing::info!(headless = settings.headless, "chromium launched");
        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handle,
            settings: settings.clone(),
        })
    }
}

#[async_trait]
impl BrowserHost for ChromiumHost {
    type Page = ChromiumPage;

    async fn new_page(&self) -> ProbeResult<ChromiumPage> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(page_error)?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(self.settings.viewport_width))
            .height(i64::from(self.settings.viewport_height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(page_error)?;
        page.execute(metrics).await.map_err(page_error)?;

        let user_agent = self.settings.resolve_user_agent();
        tracing::debug!(%user_agent, "new page");
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .accept_language(self.settings.locale.clone())
            .build()
            .map_err(page_error)?;
        page.execute(user_agent).await.map_err(page_error)?;

        if let Some(ref timezone) = self.settings.timezone {
            page.execute(SetTimezoneOverrideParams::new(timezone.clone()))
                .await
                .map_err(page_error)?;
        }
        if let Some(geo) = self.settings.geolocation {
            let params = SetGeolocationOverrideParams::builder()
                .latitude(geo.latitude)
                .longitude(geo.longitude)
                .accuracy(100.0)
                .build();
            page.execute(params).await.map_err(page_error)?;
        }
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            STEALTH_SCRIPT,
        ))
        .await
        .map_err(page_error)?;

        Ok(ChromiumPage { page })
    }

    async fn shutdown(&mut self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;
        let _ = browser.wait().await;
        self.handle.abort();
        tracing::info!("chromium closed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

/// One chromium tab
#[derive(Debug)]
pub struct ChromiumPage {
    page: CdpPage,
}

impl ChromiumPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> ProbeResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(page_error)?
            .into_value()
            .map_err(page_error)
    }

    async fn mouse(
        &self,
        kind: DispatchMouseEventType,
        at: &Point,
        button: Option<MouseButton>,
    ) -> ProbeResult<()> {
        let mut params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(at.x)
            .y(at.y);
        if let Some(button) = button {
            params = params.button(button).click_count(1);
        }
        self.page
            .execute(params.build().map_err(page_error)?)
            .await
            .map_err(page_error)?;
        Ok(())
    }

    async fn key(&self, down: bool, key: &str) -> ProbeResult<()> {
        let kind = if down {
            DispatchKeyEventType::KeyDown
        } else {
            DispatchKeyEventType::KeyUp
        };
        let mut params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key)
            .code(key);
        if key == "Enter" {
            params = params.windows_virtual_key_code(13);
            if down {
                params = params.text("\r");
            }
        }
        self.page
            .execute(params.build().map_err(page_error)?)
            .await
            .map_err(page_error)?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> ProbeResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ProbeError::Navigation {
                url: url.to_string(),
                message: format!("load did not finish within {}ms", timeout.as_millis()),
            }),
        }
    }

    async fn reload(&self, timeout: Duration) -> ProbeResult<()> {
        match tokio::time::timeout(timeout, self.page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(page_error(e)),
            Err(_) => Err(ProbeError::Navigation {
                url: "reload".to_string(),
                message: format!("reload did not finish within {}ms", timeout.as_millis()),
            }),
        }
    }

    async fn probe(&self, selector: &Selector) -> ProbeResult<ElementProbe> {
        let script = format!(
            "(() => {{
                const el = {};
                if (!el) return {{ attached: false, visible: false, enabled: false }};
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                const visible = rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
                const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';
                return {{ attached: true, visible, enabled }};
            }})()",
            selector.to_query()
        );
        self.eval(script).await
    }

    async fn count(&self, selector: &Selector) -> ProbeResult<usize> {
        self.eval(selector.to_count_query()).await
    }

    async fn dispatch_click(&self, selector: &Selector, hold: Duration) -> ProbeResult<()> {
        let script = format!(
            "(() => {{
                const el = {};
                if (!el) return null;
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                const r = el.getBoundingClientRect();
                return {{ x: r.left + r.width / 2, y: r.top + r.height / 2 }};
            }})()",
            selector.to_query()
        );
        let at: Option<Point> = self.eval(script).await?;
        let at = at.ok_or_else(|| page_error(format!("no element matches {selector}")))?;

        self.mouse(DispatchMouseEventType::MouseMoved, &at, None)
            .await?;
        self.mouse(DispatchMouseEventType::MousePressed, &at, Some(MouseButton::Left))
            .await?;
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
        self.mouse(DispatchMouseEventType::MouseReleased, &at, Some(MouseButton::Left))
            .await
    }

    async fn fill(&self, selector: &Selector, text: &str) -> ProbeResult<()> {
        let value = serde_json::Value::String(text.to_string());
        let script = format!(
            "(() => {{
                const el = {};
                if (!el) return false;
                el.focus();
                el.value = {value};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()",
            selector.to_query()
        );
        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(page_error(format!("no element matches {selector}")))
        }
    }

    async fn press_key(&self, selector: &Selector, key: &str) -> ProbeResult<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.focus(); return true; }})()",
            selector.to_query()
        );
        if !self.eval::<bool>(script).await? {
            return Err(page_error(format!("no element matches {selector}")));
        }
        self.key(true, key).await?;
        self.key(false, key).await
    }

    async fn inner_text(&self, selector: &Selector) -> ProbeResult<String> {
        let script = format!(
            "(() => {{ const el = {}; return el ? el.innerText : null; }})()",
            selector.to_query()
        );
        let text: Option<String> = self.eval(script).await?;
        text.ok_or_else(|| page_error(format!("no element matches {selector}")))
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let screenshot = self
            .page
            .execute(params)
            .await
            .map_err(|e| ProbeError::Screenshot {
                message: e.to_string(),
            })?;

        base64::engine::general_purpose::STANDARD
            .decode(&screenshot.data)
            .map_err(|e| ProbeError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn close(&self) -> ProbeResult<()> {
        self.page.clone().close().await.map_err(page_error)
    }
}
