//! Navigation state machine.
//!
//! The application under test has four top-level views reached through a tab
//! bar, and two of them have a secondary segmented control:
//!
//! ```text
//!  Horizon ─┐
//!  Logger  ─┼─ tab click ──> any other view      Logger: DailyCheckIn ⇄ TimeTracker
//!  Intel   ─┤                                     System: Metrics ⇄ Settings
//!  System  ─┘
//! ```
//!
//! [`Navigator`] only believes in a state once that state's landmark has
//! rendered. A click alone proves nothing, so a transition whose landmark
//! never appears fails with
//! [`NavigationVerificationFailed`](HarnessError::NavigationVerificationFailed)
//! and leaves the believed state at the last verified one.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::AppContract;
use crate::config::Timeouts;
use crate::driver::{BrowserDriver, DriverError};
use crate::error::HarnessError;
use crate::selector::Selector;
use crate::wait::{landmark_visible, wait_until, WaitCondition};

/// A top-level view, in tab-bar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationState {
    Horizon,
    Logger,
    Intel,
    System,
}

impl NavigationState {
    pub const ALL: [NavigationState; 4] = [
        NavigationState::Horizon,
        NavigationState::Logger,
        NavigationState::Intel,
        NavigationState::System,
    ];

    /// Position of this view's tab (0–3).
    pub fn tab_index(self) -> usize {
        match self {
            NavigationState::Horizon => 0,
            NavigationState::Logger => 1,
            NavigationState::Intel => 2,
            NavigationState::System => 3,
        }
    }

    pub fn from_tab_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            NavigationState::Horizon => "Horizon",
            NavigationState::Logger => "Logger",
            NavigationState::Intel => "Intel",
            NavigationState::System => "System",
        }
    }

    /// Modes owned by this view, default first.
    pub fn modes(self) -> &'static [ViewMode] {
        match self {
            NavigationState::Logger => &[ViewMode::DailyCheckIn, ViewMode::TimeTracker],
            NavigationState::System => &[ViewMode::Metrics, ViewMode::Settings],
            NavigationState::Horizon | NavigationState::Intel => &[],
        }
    }

    /// The mode a view opens in, if it has modes at all.
    pub fn default_mode(self) -> Option<ViewMode> {
        self.modes().first().copied()
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A sub-state of Logger or System.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    TimeTracker,
    DailyCheckIn,
    Metrics,
    Settings,
}

impl ViewMode {
    /// The view in which this mode exists.
    pub fn owner(self) -> NavigationState {
        match self {
            ViewMode::TimeTracker | ViewMode::DailyCheckIn => NavigationState::Logger,
            ViewMode::Metrics | ViewMode::Settings => NavigationState::System,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::TimeTracker => "Time Tracker",
            ViewMode::DailyCheckIn => "Daily Check-In",
            ViewMode::Metrics => "Metrics",
            ViewMode::Settings => "Settings",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner(), self.label())
    }
}

/// Either kind of navigation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Destination {
    State(NavigationState),
    Mode(ViewMode),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::State(state) => state.fmt(f),
            Destination::Mode(mode) => mode.fmt(f),
        }
    }
}

/// Tab handles acquired for one document.
///
/// Handles are stamped with the driver's load generation; any reload makes
/// them stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabHandles {
    pub count: usize,
    pub generation: u64,
}

/// Drives and tracks the app's tab/mode state.
pub struct Navigator {
    driver: Arc<dyn BrowserDriver>,
    app: Arc<AppContract>,
    timeouts: Timeouts,
    state: Option<NavigationState>,
    mode: Option<ViewMode>,
    handles: Option<TabHandles>,
}

impl Navigator {
    pub fn new(driver: Arc<dyn BrowserDriver>, app: Arc<AppContract>, timeouts: Timeouts) -> Self {
        Self {
            driver,
            app,
            timeouts,
            state: None,
            mode: None,
            handles: None,
        }
    }

    /// The last view whose landmark was verified.
    pub fn state(&self) -> Option<NavigationState> {
        self.state
    }

    /// The last verified mode of the current view.
    pub fn mode(&self) -> Option<ViewMode> {
        self.mode
    }

    pub fn handles(&self) -> Option<TabHandles> {
        self.handles
    }

    /// The most specific destination verified so far.
    pub fn last_verified(&self) -> Option<Destination> {
        self.mode
            .map(Destination::Mode)
            .or(self.state.map(Destination::State))
    }

    fn handles_fresh(&self) -> bool {
        matches!(self.handles, Some(h) if h.generation == self.driver.load_generation())
    }

    /// Forget everything believed about the page.
    pub fn invalidate(&mut self) {
        self.state = None;
        self.mode = None;
        self.handles = None;
    }

    async fn acquire_handles(&self, target: Destination) -> Result<TabHandles, HarnessError> {
        let generation = self.driver.load_generation();
        let condition = WaitCondition::Count {
            selector: self.app.tab_item.all(),
            count: self.app.tab_count,
        };
        let outcome = wait_until(
            self.driver.as_ref(),
            &condition,
            self.timeouts.navigation(),
            self.timeouts.poll(),
        )
        .await?;
        if !outcome.is_satisfied() {
            warn!(%target, expected = self.app.tab_count, "tab bar did not expose all tabs");
            return Err(HarnessError::NavigationUnreachable(target));
        }
        debug!(generation, count = self.app.tab_count, "tab handles acquired");
        Ok(TabHandles { count: self.app.tab_count, generation })
    }

    /// Waits for `control` to become clickable, then clicks it.
    async fn activate(&self, control: &Selector, target: Destination) -> Result<(), HarnessError> {
        let ready = wait_until(
            self.driver.as_ref(),
            &WaitCondition::visible(control.clone()),
            self.timeouts.navigation(),
            self.timeouts.poll(),
        )
        .await?;
        if !ready.is_satisfied() {
            return Err(HarnessError::NavigationUnreachable(target));
        }
        match self.driver.click(control).await {
            Ok(()) => Ok(()),
            Err(DriverError::ElementNotFound(_)) => Err(HarnessError::NavigationUnreachable(target)),
            Err(e) => Err(e.into()),
        }
    }

    /// Waits for the landmark proving `target` rendered.
    async fn verify(&self, target: Destination) -> Result<u64, HarnessError> {
        let landmark = match target {
            Destination::State(state) => self.app.landmark(state),
            Destination::Mode(mode) => &self.app.mode(mode).landmark,
        };
        let outcome = wait_until(
            self.driver.as_ref(),
            &WaitCondition::landmark(landmark),
            self.timeouts.landmark(),
            self.timeouts.poll(),
        )
        .await?;
        if outcome.is_satisfied() {
            Ok(outcome.elapsed_ms())
        } else {
            let last_known = self.last_verified();
            warn!(%target, %landmark, ?last_known, "landmark did not render");
            Err(HarnessError::NavigationVerificationFailed { target, last_known })
        }
    }

    /// Switch to a top-level view and verify it rendered.
    ///
    /// Entering a different view resets the mode to that view's default;
    /// re-selecting the active view keeps the current mode.
    pub async fn go_to(&mut self, target: NavigationState) -> Result<NavigationState, HarnessError> {
        let dest = Destination::State(target);
        if !self.handles_fresh() {
            // A reload since the last acquisition voids whatever was believed.
            self.invalidate();
            self.handles = Some(self.acquire_handles(dest).await?);
        }

        self.activate(&self.app.tab(target), dest).await?;
        let elapsed_ms = self.verify(dest).await?;

        if self.state != Some(target) {
            self.mode = target.default_mode();
        }
        self.state = Some(target);
        info!(state = %target, elapsed_ms, "navigation verified");
        Ok(target)
    }

    /// Switch the active view's segmented control and verify it rendered.
    ///
    /// Fails with [`HarnessError::InvalidModeForState`] without touching the
    /// page when `mode` does not belong to the verified view.
    pub async fn set_mode(&mut self, mode: ViewMode) -> Result<ViewMode, HarnessError> {
        if self.state != Some(mode.owner()) {
            return Err(HarnessError::InvalidModeForState { mode, state: self.state });
        }
        let dest = Destination::Mode(mode);
        let control = self.app.mode(mode).control.clone();

        self.activate(&control, dest).await?;
        let elapsed_ms = self.verify(dest).await?;

        self.mode = Some(mode);
        info!(mode = %mode, elapsed_ms, "mode verified");
        Ok(mode)
    }

    /// Go to `state` (and `mode`, if given) unless already there.
    pub async fn ensure(&mut self, state: NavigationState, mode: Option<ViewMode>) -> Result<(), HarnessError> {
        if self.state != Some(state) || !self.handles_fresh() {
            self.go_to(state).await?;
        }
        if let Some(mode) = mode {
            if self.mode != Some(mode) {
                self.set_mode(mode).await?;
            }
        }
        Ok(())
    }

    /// Re-acquire tab handles after a reload and re-derive the active view.
    ///
    /// Every landmark is probed once; if exactly one view's landmark is
    /// visible that view becomes the believed state, otherwise the state is
    /// unknown until the next verified transition.
    pub async fn reacquire(&mut self) -> Result<Option<NavigationState>, HarnessError> {
        self.invalidate();
        self.handles = Some(
            self.acquire_handles(Destination::State(NavigationState::Horizon))
                .await?,
        );

        let mut visible = Vec::new();
        for state in NavigationState::ALL {
            if landmark_visible(self.driver.as_ref(), self.app.landmark(state)).await? {
                visible.push(state);
            }
        }
        if let [state] = visible[..] {
            self.state = Some(state);
            self.mode = state.default_mode();
        }
        info!(state = ?self.state, "navigation handles re-acquired");
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_indices_are_fixed() {
        for (i, state) in NavigationState::ALL.iter().enumerate() {
            assert_eq!(state.tab_index(), i);
            assert_eq!(NavigationState::from_tab_index(i), Some(*state));
        }
        assert_eq!(NavigationState::from_tab_index(4), None);
    }

    #[test]
    fn modes_belong_to_their_owner() {
        for state in NavigationState::ALL {
            for mode in state.modes() {
                assert_eq!(mode.owner(), state);
            }
        }
        assert!(NavigationState::Horizon.modes().is_empty());
        assert!(NavigationState::Intel.default_mode().is_none());
    }

    #[test]
    fn default_modes() {
        assert_eq!(NavigationState::Logger.default_mode(), Some(ViewMode::DailyCheckIn));
        assert_eq!(NavigationState::System.default_mode(), Some(ViewMode::Metrics));
    }

    #[test]
    fn destination_display() {
        assert_eq!(Destination::State(NavigationState::Intel).to_string(), "Intel");
        assert_eq!(Destination::Mode(ViewMode::TimeTracker).to_string(), "Logger/Time Tracker");
    }

    #[test]
    fn destination_serde() {
        let json = serde_json::to_string(&Destination::Mode(ViewMode::Settings)).unwrap();
        assert_eq!(json, r#"{"kind":"mode","value":"Settings"}"#);
    }
}
