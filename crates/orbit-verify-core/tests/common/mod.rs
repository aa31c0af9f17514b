//! Shared test helpers for orbit-verify-core integration tests.
//!
//! [`MockBrowser`] simulates the Orbit app behind the [`BrowserDriver`] seam:
//! a four-tab bar, per-view landmarks, the Logger and System segmented
//! controls, and seed/reset buttons that raise a blocking native confirm and
//! then reload the page. Fault switches make each failure mode reachable.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};

use orbit_verify_core::app::AppContract;
use orbit_verify_core::config::{HarnessConfig, Timeouts, Viewport};
use orbit_verify_core::driver::{
    BrowserDriver, DialogEvent, DialogKind, DialogResolution, DriverError, LoadState,
};
use orbit_verify_core::nav::{NavigationState, Navigator, ViewMode};
use orbit_verify_core::seed::SeedKind;
use orbit_verify_core::selector::Selector;
use orbit_verify_core::session::Harness;

pub const BASE_URL: &str = "http://orbit.test";

// ---------------------------------------------------------------------------
// Fault switches
// ---------------------------------------------------------------------------

/// Ways the simulated app can misbehave.
#[derive(Debug, Clone)]
pub struct Faults {
    /// The tab bar never renders.
    pub hide_tabs: bool,
    /// These views render nothing but the tab bar.
    pub blank_views: Vec<NavigationState>,
    /// Seed/reset buttons ask for confirmation first.
    pub confirm_seed: bool,
    /// Seed/reset reload the page once applied.
    pub reload_after_seed: bool,
    pub reload_delay: Duration,
    /// System → Settings renders without the seed/reset buttons.
    pub missing_seed_controls: bool,
    /// The network never goes idle.
    pub network_busy: bool,
    /// Clicking this tab raises a blocking "discard changes?" confirm.
    pub confirm_on_tab: Option<NavigationState>,
    pub screenshot_fails: bool,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            hide_tabs: false,
            blank_views: Vec::new(),
            confirm_seed: true,
            reload_after_seed: true,
            reload_delay: Duration::from_millis(30),
            missing_seed_controls: false,
            network_busy: false,
            confirm_on_tab: None,
            screenshot_fails: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulated page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tap {
    Nothing,
    Tab(NavigationState),
    Mode(ViewMode),
    Seed(SeedKind),
    Edit,
    EditDone,
    LaunchSetup,
    Stopwatch,
    NewActivity,
    AddMetric,
}

#[derive(Debug, Clone)]
struct Element {
    tag: &'static str,
    role: Option<&'static str>,
    text: String,
    tap: Tap,
}

impl Element {
    fn text(text: &str) -> Self {
        Self { tag: "span", role: None, text: text.to_string(), tap: Tap::Nothing }
    }

    fn heading(text: &str) -> Self {
        Self { tag: "h1", role: Some("heading"), text: text.to_string(), tap: Tap::Nothing }
    }

    fn button(text: &str, tap: Tap) -> Self {
        Self { tag: "button", role: Some("button"), text: text.to_string(), tap }
    }

    fn segment(text: &str, tap: Tap) -> Self {
        Self { tag: "span", role: None, text: text.to_string(), tap }
    }

    fn tab(state: NavigationState) -> Self {
        Self { tag: ".tab-item", role: Some("tab"), text: state.label().to_string(), tap: Tap::Tab(state) }
    }

    fn matches(&self, selector: &Selector) -> bool {
        let kind_matches = match selector {
            Selector::Text { .. } => true,
            Selector::Role { role, .. } => self.role == Some(role.as_str()),
            Selector::Css { css, .. } => self.tag == css.as_str(),
        };
        kind_matches && selector.matches_text(&self.text)
    }
}

struct Page {
    loaded: bool,
    closed: bool,
    generation: u64,
    view: NavigationState,
    logger_mode: ViewMode,
    system_mode: ViewMode,
    seeded: bool,
    editing: bool,
    wizard_open: bool,
    stopwatch: bool,
    activity_form: bool,
    builder_open: bool,
    faults: Faults,
    viewport: Option<Viewport>,
    url: Option<String>,
    clicks: Vec<String>,
    scrolled: Vec<String>,
    seed_clicks: usize,
    reset_clicks: usize,
    answers: Vec<DialogResolution>,
    open_dialog: Option<oneshot::Sender<bool>>,
}

impl Page {
    fn new() -> Self {
        Self {
            loaded: false,
            closed: false,
            generation: 0,
            view: NavigationState::Horizon,
            logger_mode: ViewMode::DailyCheckIn,
            system_mode: ViewMode::Metrics,
            seeded: false,
            editing: false,
            wizard_open: false,
            stopwatch: false,
            activity_form: false,
            builder_open: false,
            faults: Faults::default(),
            viewport: None,
            url: None,
            clicks: Vec::new(),
            scrolled: Vec::new(),
            seed_clicks: 0,
            reset_clicks: 0,
            answers: Vec::new(),
            open_dialog: None,
        }
    }

    fn connected(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::NotConnected)
        } else {
            Ok(())
        }
    }

    fn clear_transient(&mut self) {
        self.editing = false;
        self.wizard_open = false;
        self.stopwatch = false;
        self.activity_form = false;
        self.builder_open = false;
    }

    /// A full document load: the app boots into Horizon with default modes.
    fn reload(&mut self) {
        self.loaded = true;
        self.generation += 1;
        self.view = NavigationState::Horizon;
        self.logger_mode = ViewMode::DailyCheckIn;
        self.system_mode = ViewMode::Metrics;
        self.clear_transient();
    }

    fn switch_to(&mut self, state: NavigationState) {
        if self.view != state {
            self.view = state;
            self.logger_mode = ViewMode::DailyCheckIn;
            self.system_mode = ViewMode::Metrics;
            self.clear_transient();
        }
    }

    fn apply(&mut self, tap: Tap) {
        match tap {
            Tap::Mode(mode) => match mode.owner() {
                NavigationState::Logger => self.logger_mode = mode,
                _ => self.system_mode = mode,
            },
            Tap::Edit => self.editing = true,
            Tap::EditDone => self.editing = false,
            Tap::LaunchSetup => self.wizard_open = true,
            Tap::Stopwatch => self.stopwatch = true,
            Tap::NewActivity => self.activity_form = true,
            Tap::AddMetric => self.builder_open = true,
            Tap::Tab(state) => self.switch_to(state),
            Tap::Seed(_) | Tap::Nothing => {}
        }
    }

    fn render(&self) -> Vec<Element> {
        let mut out = Vec::new();
        if !self.loaded || self.closed {
            return out;
        }
        if !self.faults.hide_tabs {
            out.extend(NavigationState::ALL.into_iter().map(Element::tab));
        }
        if self.faults.blank_views.contains(&self.view) {
            return out;
        }

        match self.view {
            NavigationState::Horizon => {
                if self.seeded {
                    out.push(Element::text("Daily Briefing"));
                    out.push(Element::text("Water (oz)"));
                    out.push(Element::text("Journal"));
                    if self.editing {
                        out.push(Element::button("Done", Tap::EditDone));
                    } else {
                        out.push(Element::button("Edit", Tap::Edit));
                    }
                } else {
                    out.push(Element::text("I am your Horizon Agent"));
                    out.push(Element::button("Launch Setup", Tap::LaunchSetup));
                    if self.wizard_open {
                        out.push(Element::heading("Define Your First Metric"));
                    }
                }
            }
            NavigationState::Logger => {
                out.push(Element::heading("Logger"));
                out.push(Element::segment("Daily Check-In", Tap::Mode(ViewMode::DailyCheckIn)));
                out.push(Element::segment("Time Tracker", Tap::Mode(ViewMode::TimeTracker)));
                match self.logger_mode {
                    ViewMode::TimeTracker => {
                        out.push(Element::text("Activity"));
                        out.push(Element::segment("Stopwatch", Tap::Stopwatch));
                        out.push(Element::text("Manage Activities"));
                        out.push(Element::button("New", Tap::NewActivity));
                        if self.stopwatch {
                            out.push(Element::text("00:00:00"));
                        }
                        if self.activity_form {
                            out.push(Element::text("Activity Name"));
                        }
                    }
                    _ if self.seeded => out.push(Element::text("Water (oz)")),
                    _ => out.push(Element::text("No Metrics")),
                }
            }
            NavigationState::Intel => {
                out.push(Element::heading("Intelligence"));
                if self.seeded {
                    out.push(Element::text("System Health"));
                    out.push(Element::text("Momentum"));
                } else {
                    out.push(Element::text("Not enough data yet"));
                }
            }
            NavigationState::System => {
                out.push(Element::heading("System"));
                out.push(Element::segment("Metrics", Tap::Mode(ViewMode::Metrics)));
                out.push(Element::segment("Settings", Tap::Mode(ViewMode::Settings)));
                match self.system_mode {
                    ViewMode::Settings => {
                        out.push(Element::text("Storage"));
                        out.push(Element::text("Configuration"));
                        if !self.faults.missing_seed_controls {
                            out.push(Element::button("Seed Data", Tap::Seed(SeedKind::Seed)));
                            out.push(Element::button("Reset DB", Tap::Seed(SeedKind::Reset)));
                        }
                        out.push(Element::button("Universal Export", Tap::Nothing));
                    }
                    _ => {
                        if self.seeded {
                            out.push(Element::text("Water (oz)"));
                        } else {
                            out.push(Element::text("No Metrics"));
                        }
                        out.push(Element::button("Add New Metric", Tap::AddMetric));
                        if self.builder_open {
                            out.push(Element::heading("Metric Builder"));
                        }
                    }
                }
            }
        }
        out
    }

    fn find(&self, selector: &Selector) -> Vec<Element> {
        let matched: Vec<Element> = self.render().into_iter().filter(|e| e.matches(selector)).collect();
        match selector {
            Selector::Css { nth: Some(index), .. } => matched.into_iter().skip(*index).take(1).collect(),
            _ => matched,
        }
    }
}

// ---------------------------------------------------------------------------
// MockBrowser
// ---------------------------------------------------------------------------

/// In-process stand-in for a browser showing the Orbit app.
pub struct MockBrowser {
    page: Arc<Mutex<Page>>,
    dialogs: broadcast::Sender<DialogEvent>,
}

impl MockBrowser {
    /// A browser that has not loaded anything yet; the app holds no data.
    pub fn new() -> Arc<Self> {
        let (dialogs, _) = broadcast::channel(16);
        Arc::new(Self {
            page: Arc::new(Mutex::new(Page::new())),
            dialogs,
        })
    }

    /// Same as [`MockBrowser::new`] but the app already holds data.
    pub fn seeded() -> Arc<Self> {
        let mock = Self::new();
        mock.page.lock().unwrap().seeded = true;
        mock
    }

    pub fn faults(&self, configure: impl FnOnce(&mut Faults)) {
        configure(&mut self.page.lock().unwrap().faults);
    }

    /// Simulates a full reload not caused by the harness.
    pub fn reload_page(&self) {
        self.page.lock().unwrap().reload();
    }

    /// Opens a native dialog without any click waiting on it.
    pub fn raise_dialog(&self, kind: DialogKind, message: &str) {
        let (tx, _rx) = oneshot::channel();
        self.page.lock().unwrap().open_dialog = Some(tx);
        let _ = self.dialogs.send(DialogEvent { kind, message: message.to_string() });
    }

    pub fn has_open_dialog(&self) -> bool {
        self.page.lock().unwrap().open_dialog.is_some()
    }

    pub fn view(&self) -> NavigationState {
        self.page.lock().unwrap().view
    }

    pub fn logger_mode(&self) -> ViewMode {
        self.page.lock().unwrap().logger_mode
    }

    pub fn system_mode(&self) -> ViewMode {
        self.page.lock().unwrap().system_mode
    }

    pub fn is_seeded(&self) -> bool {
        self.page.lock().unwrap().seeded
    }

    pub fn generation(&self) -> u64 {
        self.page.lock().unwrap().generation
    }

    pub fn seed_clicks(&self) -> usize {
        self.page.lock().unwrap().seed_clicks
    }

    pub fn reset_clicks(&self) -> usize {
        self.page.lock().unwrap().reset_clicks
    }

    /// Texts of every element clicked, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.page.lock().unwrap().clicks.clone()
    }

    pub fn scrolled(&self) -> Vec<String> {
        self.page.lock().unwrap().scrolled.clone()
    }

    /// How each dialog was closed, in order.
    pub fn answers(&self) -> Vec<DialogResolution> {
        self.page.lock().unwrap().answers.clone()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.page.lock().unwrap().viewport
    }

    pub fn url(&self) -> Option<String> {
        self.page.lock().unwrap().url.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.page.lock().unwrap().closed
    }

    /// Raises a confirm and blocks until it is answered.
    async fn confirm(&self, message: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        self.page.lock().unwrap().open_dialog = Some(tx);
        let _ = self.dialogs.send(DialogEvent {
            kind: DialogKind::Confirm,
            message: message.to_string(),
        });
        rx.await.unwrap_or(false)
    }

    fn apply_seed(&self, kind: SeedKind) {
        let seeded = kind == SeedKind::Seed;
        let mut page = self.page.lock().unwrap();
        if !page.faults.reload_after_seed {
            page.seeded = seeded;
            return;
        }
        let delay = page.faults.reload_delay;
        let shared = self.page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut page = shared.lock().unwrap();
            page.seeded = seeded;
            page.reload();
        });
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let mut page = self.page.lock().unwrap();
        page.connected()?;
        page.url = Some(url.to_string());
        page.reload();
        Ok(())
    }

    async fn count(&self, selector: &Selector) -> Result<usize, DriverError> {
        let page = self.page.lock().unwrap();
        page.connected()?;
        Ok(page.find(selector).len())
    }

    async fn click(&self, selector: &Selector) -> Result<(), DriverError> {
        let (tap, faults) = {
            let mut page = self.page.lock().unwrap();
            page.connected()?;
            let element = page
                .find(selector)
                .into_iter()
                .next()
                .ok_or_else(|| DriverError::ElementNotFound(selector.to_string()))?;
            page.clicks.push(element.text.clone());
            match element.tap {
                Tap::Seed(SeedKind::Seed) => page.seed_clicks += 1,
                Tap::Seed(SeedKind::Reset) => page.reset_clicks += 1,
                _ => {}
            }
            (element.tap, page.faults.clone())
        };

        match tap {
            Tap::Tab(state) if faults.confirm_on_tab == Some(state) => {
                if self.confirm("Discard unsaved changes?").await {
                    self.page.lock().unwrap().switch_to(state);
                }
            }
            Tap::Seed(kind) => {
                let message = match kind {
                    SeedKind::Seed => "Seed the database with demo data?",
                    SeedKind::Reset => "This will delete all data. Continue?",
                };
                if !faults.confirm_seed || self.confirm(message).await {
                    self.apply_seed(kind);
                }
            }
            other => self.page.lock().unwrap().apply(other),
        }
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &Selector) -> Result<(), DriverError> {
        let mut page = self.page.lock().unwrap();
        page.connected()?;
        page.scrolled.push(selector.to_string());
        Ok(())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<(), DriverError> {
        let busy = {
            let page = self.page.lock().unwrap();
            page.connected()?;
            !page.loaded || (state == LoadState::NetworkIdle && page.faults.network_busy)
        };
        if busy {
            tokio::time::sleep(timeout).await;
            return Err(DriverError::Timeout);
        }
        Ok(())
    }

    fn load_generation(&self) -> u64 {
        self.generation()
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let page = self.page.lock().unwrap();
        page.connected()?;
        if page.faults.screenshot_fails {
            return Err(DriverError::CommandFailed("capture failed".to_string()));
        }
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn content(&self) -> Result<String, DriverError> {
        let page = self.page.lock().unwrap();
        page.connected()?;
        let body: Vec<String> = page
            .render()
            .iter()
            .map(|e| format!("<{0}>{1}</{0}>", e.tag.trim_start_matches('.'), e.text))
            .collect();
        Ok(format!("<html><body>{}</body></html>", body.join("")))
    }

    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), DriverError> {
        let mut page = self.page.lock().unwrap();
        page.connected()?;
        page.viewport = Some(*viewport);
        Ok(())
    }

    fn dialog_events(&self) -> broadcast::Receiver<DialogEvent> {
        self.dialogs.subscribe()
    }

    async fn resolve_dialog(&self, resolution: DialogResolution) -> Result<(), DriverError> {
        let tx = {
            let mut page = self.page.lock().unwrap();
            page.connected()?;
            let tx = page.open_dialog.take().ok_or(DriverError::NoDialog)?;
            page.answers.push(resolution);
            tx
        };
        let _ = tx.send(resolution.accepts());
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut page = self.page.lock().unwrap();
        page.closed = true;
        page.open_dialog = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Timeouts small enough to keep failure paths fast.
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        navigation_ms: 400,
        landmark_ms: 250,
        dialog_ms: 250,
        dialog_grace_ms: 150,
        reload_ms: 600,
        settle_ms: 10,
        wait_ms: 250,
        assertion_ms: 150,
        optional_ms: 100,
        poll_ms: 10,
    }
}

pub fn test_config(evidence_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        base_url: BASE_URL.to_string(),
        evidence_dir: evidence_dir.to_path_buf(),
        timeouts: fast_timeouts(),
        ..HarnessConfig::default()
    }
}

/// A mock that has already loaded the app.
pub async fn loaded(mock: Arc<MockBrowser>) -> Arc<MockBrowser> {
    mock.goto(BASE_URL).await.unwrap();
    mock
}

pub fn navigator(mock: &Arc<MockBrowser>) -> Navigator {
    Navigator::new(mock.clone(), Arc::new(AppContract::default()), fast_timeouts())
}

/// A harness over `mock` with the app already opened.
pub async fn opened_harness(mock: &Arc<MockBrowser>, evidence_dir: &Path) -> Harness {
    let harness = Harness::new(mock.clone(), test_config(evidence_dir));
    harness.open().await.unwrap();
    harness
}
