//! Chrome DevTools Protocol backend.
//!
//! [`CdpDriver`] implements [`BrowserDriver`] on top of `chromiumoxide`. It
//! launches a Chromium instance, keeps a single page, and runs three
//! background listeners on that page:
//!
//! - `Page.javascriptDialogOpening` is forwarded to the dialog broadcast,
//! - `Page.loadEventFired` bumps the load generation,
//! - `Runtime.consoleAPICalled` is echoed to `tracing` at debug level.
//!
//! Selectors are resolved in the page by a single script (see
//! [`RESOLVE_JS`]) that applies the same matching rules as
//! [`Selector::matches_text`](crate::selector::Selector::matches_text).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, DialogType, EventJavascriptDialogOpening, EventLoadEventFired,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{HarnessConfig, Viewport};
use crate::driver::{BrowserDriver, DialogEvent, DialogKind, DialogResolution, DriverError, LoadState};
use crate::selector::Selector;

/// How long the resource list must stay unchanged to count as network idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

const LOAD_POLL: Duration = Duration::from_millis(100);

/// In-page selector resolution. Called as `(RESOLVE_JS)(selector, op)` where
/// `op` is `count`, `scroll` or `locate`.
const RESOLVE_JS: &str = r#"(sel, op) => {
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const loose = (hay, needle) => norm(hay).toLowerCase().includes(norm(needle).toLowerCase());
  const visible = (el) => {
    const r = el.getBoundingClientRect();
    const st = window.getComputedStyle(el);
    return r.width > 0 && r.height > 0 && st.visibility !== 'hidden' && st.display !== 'none';
  };
  let nodes = [];
  if (sel.kind === 'css') {
    nodes = Array.from(document.querySelectorAll(sel.css));
    if (sel.has_text != null) nodes = nodes.filter((el) => loose(el.innerText, sel.has_text));
  } else if (sel.kind === 'role') {
    const implicit = { button: 'button, input[type=button], input[type=submit]', link: 'a[href]' };
    const query = `[role="${sel.role}"]` + (implicit[sel.role] ? `, ${implicit[sel.role]}` : '');
    nodes = Array.from(document.querySelectorAll(query)).filter((el) =>
      loose(el.getAttribute('aria-label') || el.innerText || el.value, sel.name));
  } else {
    const match = (t) => (sel.exact ? norm(t) === norm(sel.text) : loose(t, sel.text));
    const all = document.body ? Array.from(document.body.querySelectorAll('*')) : [];
    const hits = all.filter((el) => match(el.innerText));
    nodes = hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
  }
  nodes = nodes.filter(visible);
  if (sel.nth != null) nodes = nodes[sel.nth] ? [nodes[sel.nth]] : [];
  if (op === 'count') return nodes.length;
  const el = nodes[0];
  if (!el) return { found: false };
  el.scrollIntoView({ block: 'center', inline: 'center' });
  const r = el.getBoundingClientRect();
  return { found: true, x: r.left + r.width / 2, y: r.top + r.height / 2 };
}"#;

const LOAD_STATE_JS: &str =
    "({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })";

#[derive(Debug, Default, Deserialize)]
struct Located {
    found: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

#[derive(Debug, Deserialize)]
struct PageLoad {
    ready: String,
    resources: u64,
}

/// Browser launch parameters.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub viewport: Viewport,
}

impl LaunchOptions {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            headless: config.headless,
            viewport: config.viewport.viewport(),
        }
    }
}

fn cdp(err: CdpError) -> DriverError {
    DriverError::CommandFailed(err.to_string())
}

fn dialog_kind(kind: &DialogType) -> DialogKind {
    match kind {
        DialogType::Alert => DialogKind::Alert,
        DialogType::Confirm => DialogKind::Confirm,
        DialogType::Prompt => DialogKind::Prompt,
        DialogType::Beforeunload => DialogKind::BeforeUnload,
    }
}

/// [`BrowserDriver`] backed by a local Chromium over CDP.
pub struct CdpDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    loads: Arc<AtomicU64>,
    dialogs: broadcast::Sender<DialogEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl CdpDriver {
    /// Launch Chromium, open a blank page and start the event listeners.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport.width, options.viewport.height)
            .arg("--disable-gpu");
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        }));

        let page = browser.new_page("about:blank").await.map_err(cdp)?;
        let loads = Arc::new(AtomicU64::new(0));
        let (dialogs, _) = broadcast::channel(16);

        let mut opened = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(cdp)?;
        let tx = dialogs.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = opened.next().await {
                let dialog = DialogEvent {
                    kind: dialog_kind(&event.r#type),
                    message: event.message.clone(),
                };
                debug!(kind = ?dialog.kind, message = %dialog.message, "dialog opened");
                // No receivers just means nobody is listening yet.
                let _ = tx.send(dialog);
            }
        }));

        let mut loaded = page.event_listener::<EventLoadEventFired>().await.map_err(cdp)?;
        let counter = loads.clone();
        tasks.push(tokio::spawn(async move {
            while loaded.next().await.is_some() {
                let generation = counter.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(generation, "document loaded");
            }
        }));

        let mut console = page.event_listener::<EventConsoleApiCalled>().await.map_err(cdp)?;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                let text: Vec<String> = event
                    .args
                    .iter()
                    .map(|arg| match (&arg.value, &arg.description) {
                        (Some(serde_json::Value::String(s)), _) => s.clone(),
                        (Some(value), _) => value.to_string(),
                        (None, Some(desc)) => desc.clone(),
                        (None, None) => String::new(),
                    })
                    .collect();
                debug!(target: "browser_console", kind = ?event.r#type, "{}", text.join(" "));
            }
        }));

        info!(headless = options.headless, "browser launched");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            loads,
            dialogs,
            tasks,
        })
    }

    async fn resolve(&self, selector: &Selector, op: &str) -> Result<serde_json::Value, DriverError> {
        let json = serde_json::to_string(selector).map_err(|e| DriverError::Evaluation(e.to_string()))?;
        let script = format!("({})({}, \"{}\")", RESOLVE_JS, json, op);
        let result = self.page.evaluate(script).await.map_err(|e| DriverError::Evaluation(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }

    async fn locate(&self, selector: &Selector, op: &str) -> Result<Located, DriverError> {
        let value = self.resolve(selector, op).await?;
        let located: Located = serde_json::from_value(value).map_err(|e| DriverError::Evaluation(e.to_string()))?;
        if !located.found {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        Ok(located)
    }

    async fn page_load(&self) -> Result<PageLoad, DriverError> {
        let result = self
            .page
            .evaluate(LOAD_STATE_JS)
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        result
            .into_value::<PageLoad>()
            .map_err(|e| DriverError::Evaluation(e.to_string()))
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await.map_err(cdp)?;
        Ok(())
    }

    async fn count(&self, selector: &Selector) -> Result<usize, DriverError> {
        let value = self.resolve(selector, "count").await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| DriverError::Evaluation(format!("count returned {}", value)))
    }

    async fn click(&self, selector: &Selector) -> Result<(), DriverError> {
        let at = self.locate(selector, "locate").await?;
        debug!(%selector, x = at.x, y = at.y, "click");
        self.page.click(Point::new(at.x, at.y)).await.map_err(cdp)?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &Selector) -> Result<(), DriverError> {
        self.locate(selector, "scroll").await.map(drop)
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        let mut last_resources = None;
        let mut quiet_since = Instant::now();
        loop {
            // The execution context disappears mid-reload; that is "not yet".
            if let Ok(load) = self.page_load().await {
                let reached = match state {
                    LoadState::DomContentLoaded => load.ready == "interactive" || load.ready == "complete",
                    LoadState::Load => load.ready == "complete",
                    LoadState::NetworkIdle => {
                        if last_resources != Some(load.resources) {
                            last_resources = Some(load.resources);
                            quiet_since = Instant::now();
                        }
                        load.ready == "complete" && quiet_since.elapsed() >= NETWORK_QUIET
                    }
                };
                if reached {
                    return Ok(());
                }
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            tokio::time::sleep(LOAD_POLL).await;
        }
    }

    fn load_generation(&self) -> u64 {
        self.loads.load(Ordering::Acquire)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let params = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png).build();
        self.page.screenshot(params).await.map_err(cdp)
    }

    async fn content(&self) -> Result<String, DriverError> {
        self.page.content().await.map_err(cdp)
    }

    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), DriverError> {
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(viewport.scale)
            .mobile(viewport.mobile)
            .build()
            .map_err(DriverError::CommandFailed)?;
        self.page.execute(metrics).await.map_err(cdp)?;
        if viewport.touch {
            self.page
                .execute(SetTouchEmulationEnabledParams::new(true))
                .await
                .map_err(cdp)?;
        }
        debug!(width = viewport.width, height = viewport.height, scale = viewport.scale, "viewport applied");
        Ok(())
    }

    fn dialog_events(&self) -> broadcast::Receiver<DialogEvent> {
        self.dialogs.subscribe()
    }

    async fn resolve_dialog(&self, resolution: DialogResolution) -> Result<(), DriverError> {
        self.page
            .execute(HandleJavaScriptDialogParams::new(resolution.accepts()))
            .await
            .map_err(cdp)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = browser.close().await {
            warn!(error = %e, "browser close request failed");
        }
        browser.wait().await.map_err(DriverError::Io)?;
        for task in &self.tasks {
            task.abort();
        }
        info!("browser closed");
        Ok(())
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
