//! Harness session.
//!
//! A [`Harness`] owns everything one run touches: the browser driver, the
//! navigator, the dialog interceptor and the seed protocol. Every page
//! interaction it performs runs under the interceptor's watchdog, so an
//! unanswered dialog fails the step instead of hanging it.
//!
//! [`run_journey`] is the scoped entry point used by the CLI: launch the
//! browser, run the journey, and close the browser on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use orbit_verify_core::config::HarnessConfig;
//! use orbit_verify_core::journey::Journey;
//! use orbit_verify_core::session::run_journey;
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = run_journey(HarnessConfig::load(), Journey::Orbit).await;
//!     println!("{}", result.outcome());
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::app::AppContract;
use crate::cdp_driver::{CdpDriver, LaunchOptions};
use crate::config::HarnessConfig;
use crate::dialog::DialogInterceptor;
use crate::driver::{BrowserDriver, DriverError, LoadState};
use crate::error::HarnessError;
use crate::evidence::EvidenceStore;
use crate::journey::Journey;
use crate::nav::{NavigationState, Navigator, ViewMode};
use crate::runner::{RunResult, StepRunner};
use crate::seed::{SeedKind, SeedOperation, SeedProtocol};
use crate::selector::Selector;
use crate::step::VerificationStep;
use crate::wait::{wait_until, WaitCondition};

/// One browser session plus the state the harness keeps about it.
pub struct Harness {
    driver: Arc<dyn BrowserDriver>,
    config: HarnessConfig,
    navigator: Mutex<Navigator>,
    interceptor: DialogInterceptor,
    seed: SeedProtocol,
}

impl Harness {
    /// Build a harness around a connected driver.
    ///
    /// Starts the dialog listener, so this must run inside a tokio runtime.
    pub fn new(driver: Arc<dyn BrowserDriver>, config: HarnessConfig) -> Self {
        let app = Arc::new(config.app.clone());
        let timeouts = config.timeouts.clone();
        let navigator = Navigator::new(driver.clone(), app.clone(), timeouts.clone());
        let interceptor = DialogInterceptor::start(driver.clone(), timeouts.dialog(), timeouts.poll());
        let seed = SeedProtocol::new(driver.clone(), app, timeouts);
        Self {
            driver,
            config,
            navigator: Mutex::new(navigator),
            interceptor,
            seed,
        }
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn app(&self) -> &AppContract {
        &self.config.app
    }

    pub fn interceptor(&self) -> &DialogInterceptor {
        &self.interceptor
    }

    pub async fn active_state(&self) -> Option<NavigationState> {
        self.navigator.lock().await.state()
    }

    pub async fn active_mode(&self) -> Option<ViewMode> {
        self.navigator.lock().await.mode()
    }

    /// Apply the viewport, load the base URL and derive the initial view.
    pub async fn open(&self) -> Result<(), HarnessError> {
        let url = self.config.base_url.clone();
        self.driver.set_viewport(&self.config.viewport.viewport()).await?;
        info!(%url, viewport = %self.config.viewport, "opening app");

        self.interceptor.guard(self.load(&url)).await?;

        let state = self.navigator.lock().await.reacquire().await?;
        info!(state = ?state, "app loaded");
        Ok(())
    }

    async fn load(&self, url: &str) -> Result<(), HarnessError> {
        let timeouts = &self.config.timeouts;
        self.driver.goto(url).await?;
        match self.driver.wait_for_load_state(LoadState::Load, timeouts.navigation()).await {
            Ok(()) => Ok(()),
            Err(DriverError::Timeout) => Err(HarnessError::WaitTimeout {
                condition: format!("{} to load", url),
                elapsed_ms: timeouts.navigation_ms,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn go_to(&self, state: NavigationState) -> Result<NavigationState, HarnessError> {
        let mut navigator = self.navigator.lock().await;
        self.interceptor.guard(navigator.go_to(state)).await
    }

    pub async fn set_mode(&self, mode: ViewMode) -> Result<ViewMode, HarnessError> {
        let mut navigator = self.navigator.lock().await;
        self.interceptor.guard(navigator.set_mode(mode)).await
    }

    /// Run a seed or reset handshake.
    ///
    /// The single-flight slot is claimed before anything else, so a second
    /// concurrent call fails with
    /// [`SeedOperationInProgress`](HarnessError::SeedOperationInProgress)
    /// instead of queueing behind the first.
    pub async fn run_seed_operation(&self, kind: SeedKind) -> Result<SeedOperation, HarnessError> {
        let flight = self.seed.begin(kind)?;
        let mut navigator = self.navigator.lock().await;
        self.seed.run(&flight, &mut navigator, &self.interceptor).await
    }

    async fn require_visible(&self, selector: &Selector, purpose: &str) -> Result<(), HarnessError> {
        let timeouts = &self.config.timeouts;
        let ready = wait_until(
            self.driver(),
            &WaitCondition::visible(selector.clone()),
            timeouts.wait(),
            timeouts.poll(),
        )
        .await?;
        if !ready.is_satisfied() {
            return Err(HarnessError::WaitTimeout {
                condition: format!("{} to be {}", selector, purpose),
                elapsed_ms: ready.elapsed_ms(),
            });
        }
        Ok(())
    }

    /// Click an element that must appear within the step wait bound.
    pub async fn click(&self, selector: &Selector) -> Result<(), HarnessError> {
        self.require_visible(selector, "clickable").await?;
        self.interceptor
            .guard(async { self.driver.click(selector).await.map_err(HarnessError::from) })
            .await
    }

    /// Scroll an element into view once it appears within the step wait bound.
    pub async fn scroll_to(&self, selector: &Selector) -> Result<(), HarnessError> {
        self.require_visible(selector, "scrollable into view").await?;
        self.interceptor
            .guard(async { self.driver.scroll_into_view(selector).await.map_err(HarnessError::from) })
            .await
    }

    /// Click an element if it shows up; absence is not a failure.
    ///
    /// Returns whether a click happened.
    pub async fn click_optional(&self, selector: &Selector) -> Result<bool, HarnessError> {
        let timeouts = &self.config.timeouts;
        let ready = wait_until(
            self.driver(),
            &WaitCondition::visible(selector.clone()),
            timeouts.optional(),
            timeouts.poll(),
        )
        .await?;
        if !ready.is_satisfied() {
            info!(%selector, "optional element absent; skipping");
            return Ok(false);
        }
        let clicked = self
            .interceptor
            .guard(async {
                match self.driver.click(selector).await {
                    Ok(()) => Ok(true),
                    Err(DriverError::ElementNotFound(_)) => Ok(false),
                    Err(e) => Err(HarnessError::from(e)),
                }
            })
            .await?;
        if !clicked {
            info!(%selector, "optional element vanished before click; skipping");
        }
        Ok(clicked)
    }

    /// Dismiss any dialog left open so the page can be captured.
    pub async fn dismiss_pending_dialog(&self) -> bool {
        self.interceptor.dismiss_pending(self.driver()).await
    }

    /// Stop the dialog listener and close the browser.
    pub async fn close(&self) -> Result<(), HarnessError> {
        self.interceptor.shutdown();
        self.driver.close().await?;
        Ok(())
    }
}

/// Run `steps` with an already-connected driver, then close it.
pub async fn run_steps(
    driver: Arc<dyn BrowserDriver>,
    config: HarnessConfig,
    journey: &str,
    steps: &[VerificationStep],
) -> RunResult {
    let evidence = EvidenceStore::new(config.evidence_dir.clone(), journey);
    let harness = Harness::new(driver, config);
    let result = StepRunner::new(&harness, evidence).run(steps).await;
    if let Err(e) = harness.close().await {
        warn!(error = %e, "browser did not close cleanly");
    }
    result
}

/// Launch a browser, run `journey` and tear the browser down.
///
/// A browser that cannot be launched yields a crashed result without any
/// evidence.
pub async fn run_journey(config: HarnessConfig, journey: Journey) -> RunResult {
    let options = LaunchOptions::from_config(&config);
    let driver = match CdpDriver::launch(&options).await {
        Ok(driver) => driver,
        Err(e) => {
            let err = HarnessError::from(e);
            warn!(error = %err, "browser launch failed");
            return RunResult::crashed_before_start(journey.name(), &err);
        }
    };
    let steps = journey.steps(&config.app);
    run_steps(Arc::new(driver), config, journey.name(), &steps).await
}
