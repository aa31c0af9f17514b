//! Seed/reset handshake.
//!
//! Seeding (additive) and resetting (destructive) share one protocol:
//!
//! 1. arm the dialog interceptor (one-shot, accept) *before* the trigger,
//! 2. click the control,
//! 3. wait, coarsely, for the reload the app performs after persisting,
//! 4. re-acquire navigation handles, since the reload replaced the document.
//!
//! The handshake is single-flight: [`SeedProtocol::begin`] hands out a
//! [`FlightGuard`] and refuses a second one while the first is alive.
//!
//! A reload that never arrives is a soft failure: it is logged, recorded on
//! the [`SeedOperation`], and the handshake carries on so that downstream
//! verification steps fail on their own if data truly never landed.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppContract;
use crate::config::Timeouts;
use crate::dialog::{ArmScope, DialogInterceptor};
use crate::driver::{BrowserDriver, DialogResolution, DriverError, LoadState};
use crate::error::HarnessError;
use crate::nav::{NavigationState, Navigator, ViewMode};
use crate::wait::{wait_until, WaitCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    /// Add sample data.
    Seed,
    /// Delete all data.
    Reset,
}

impl SeedKind {
    fn tag(self) -> u8 {
        match self {
            SeedKind::Seed => 1,
            SeedKind::Reset => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(SeedKind::Seed),
            2 => Some(SeedKind::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for SeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedKind::Seed => write!(f, "seed"),
            SeedKind::Reset => write!(f, "reset"),
        }
    }
}

/// Lifecycle of a seed/reset handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPhase {
    /// Triggered; nothing observed yet.
    Pending,
    /// A confirmation dialog was answered.
    Confirmed,
    /// The reload finished and handles were re-acquired.
    Completed,
    /// The reload never settled; handles were re-acquired anyway.
    SettleTimedOut,
}

/// Record of one seed/reset handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedOperation {
    pub id: Uuid,
    pub kind: SeedKind,
    /// Whether the trigger raised a confirmation dialog.
    pub requires_confirmation: bool,
    /// Whether a reload was observed.
    pub triggers_reload: bool,
    pub phase: SeedPhase,
    pub elapsed_ms: u64,
}

impl SeedOperation {
    fn new(kind: SeedKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            requires_confirmation: false,
            triggers_reload: false,
            phase: SeedPhase::Pending,
            elapsed_ms: 0,
        }
    }
}

/// Proof that the caller holds the single-flight slot.
///
/// Releases the slot on drop, on every exit path.
pub struct FlightGuard {
    slot: Arc<AtomicU8>,
    kind: SeedKind,
}

impl FlightGuard {
    pub fn kind(&self) -> SeedKind {
        self.kind
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.slot.store(0, Ordering::Release);
    }
}

/// Runs seed and reset handshakes against the app.
pub struct SeedProtocol {
    driver: Arc<dyn BrowserDriver>,
    app: Arc<AppContract>,
    timeouts: Timeouts,
    slot: Arc<AtomicU8>,
}

impl SeedProtocol {
    pub fn new(driver: Arc<dyn BrowserDriver>, app: Arc<AppContract>, timeouts: Timeouts) -> Self {
        Self {
            driver,
            app,
            timeouts,
            slot: Arc::new(AtomicU8::new(0)),
        }
    }

    /// The operation currently in flight, if any.
    pub fn in_flight(&self) -> Option<SeedKind> {
        SeedKind::from_tag(self.slot.load(Ordering::Acquire))
    }

    /// Claim the single-flight slot, or fail with
    /// [`HarnessError::SeedOperationInProgress`].
    pub fn begin(&self, kind: SeedKind) -> Result<FlightGuard, HarnessError> {
        match self
            .slot
            .compare_exchange(0, kind.tag(), Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(FlightGuard { slot: self.slot.clone(), kind }),
            Err(current) => Err(HarnessError::SeedOperationInProgress {
                requested: kind,
                in_flight: SeedKind::from_tag(current).unwrap_or(kind),
            }),
        }
    }

    /// Run the handshake for the slot held by `flight`.
    ///
    /// Navigates to System → Settings first if the navigator is elsewhere.
    pub async fn run(
        &self,
        flight: &FlightGuard,
        navigator: &mut Navigator,
        dialogs: &DialogInterceptor,
    ) -> Result<SeedOperation, HarnessError> {
        let kind = flight.kind();
        let start = Instant::now();
        let mut op = SeedOperation::new(kind);

        match kind {
            SeedKind::Reset => warn!(op = %op.id, "resetting application data; existing data will be deleted"),
            SeedKind::Seed => info!(op = %op.id, "seeding application data"),
        }

        navigator
            .ensure(NavigationState::System, Some(ViewMode::Settings))
            .await?;

        let control = match kind {
            SeedKind::Seed => self.app.seed_control.clone(),
            SeedKind::Reset => self.app.reset_control.clone(),
        };

        let present = wait_until(
            self.driver.as_ref(),
            &WaitCondition::visible(control.clone()),
            self.timeouts.navigation(),
            self.timeouts.poll(),
        )
        .await?;
        if !present.is_satisfied() {
            return Err(HarnessError::SeedControlMissing {
                kind,
                reason: format!("{} never became visible", control),
            });
        }
        self.driver.scroll_into_view(&control).await?;

        let generation = self.driver.load_generation();

        // Arm before the click; a dialog can open before click() returns.
        dialogs.arm(DialogResolution::Accept, ArmScope::OneShot).await;
        let clicked = dialogs
            .guard(async {
                self.driver.click(&control).await.map_err(|e| match e {
                    DriverError::ElementNotFound(reason) => HarnessError::SeedControlMissing { kind, reason },
                    other => other.into(),
                })
            })
            .await;
        if let Err(e) = clicked {
            dialogs.disarm_one_shot().await;
            return Err(e);
        }

        op.requires_confirmation = dialogs.wait_consumed(self.timeouts.dialog_grace()).await;
        if op.requires_confirmation {
            op.phase = SeedPhase::Confirmed;
            debug!(op = %op.id, "confirmation accepted");
        } else {
            dialogs.disarm_one_shot().await;
            debug!(op = %op.id, "no confirmation dialog appeared");
        }

        let settled = self.await_reload(generation).await?;
        op.triggers_reload = self.driver.load_generation() > generation;
        if !settled {
            warn!(
                op = %op.id,
                timeout_ms = self.timeouts.reload_ms,
                "app did not settle after {}; continuing",
                kind
            );
            op.phase = SeedPhase::SettleTimedOut;
        }

        tokio::time::sleep(self.timeouts.settle()).await;
        navigator.reacquire().await?;

        if op.phase != SeedPhase::SettleTimedOut {
            op.phase = SeedPhase::Completed;
        }
        op.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(op = %op.id, kind = %kind, phase = ?op.phase, elapsed_ms = op.elapsed_ms, "{} finished", kind);
        Ok(op)
    }

    /// Waits for a reload past `generation` and for the network to go idle.
    ///
    /// Returns false if either did not happen within the reload timeout.
    async fn await_reload(&self, generation: u64) -> Result<bool, HarnessError> {
        let start = Instant::now();
        let deadline = self.timeouts.reload();
        loop {
            if self.driver.load_generation() > generation {
                break;
            }
            if start.elapsed() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.timeouts.poll()).await;
        }

        let remaining = deadline.saturating_sub(start.elapsed());
        let idle = wait_until(
            self.driver.as_ref(),
            &WaitCondition::LoadState { state: LoadState::NetworkIdle },
            remaining,
            self.timeouts.poll(),
        )
        .await?;
        Ok(idle.is_satisfied())
    }
}
