//! Native dialog interception.
//!
//! A `window.confirm()` raised by the page blocks the click that caused it
//! until somebody answers. [`DialogInterceptor`] answers for the harness: a
//! listener task receives every dialog on the driver's event channel and
//! resolves it with whatever resolution is currently armed.
//!
//! Two arming scopes exist:
//!
//! - [`ArmScope::OneShot`] resolves exactly the next dialog, then disarms.
//! - [`ArmScope::Persistent`] stays armed until [`DialogInterceptor::disarm`].
//!
//! A one-shot arming sits on top of a persistent one: it answers the next
//! dialog, and once it is consumed or withdrawn the persistent resolution
//! applies again.
//!
//! A dialog arriving while nothing is armed stays open and becomes
//! *pending*. [`DialogInterceptor::guard`] runs an action under a watchdog
//! that turns a pending dialog older than the dialog timeout into
//! [`HarnessError::DialogTimeout`], so a forgotten arm fails the run instead
//! of hanging it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::{BrowserDriver, DialogEvent, DialogResolution};
use crate::error::HarnessError;

/// How long an arming lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmScope {
    OneShot,
    Persistent,
}

#[derive(Debug, Clone)]
struct PendingDialog {
    event: DialogEvent,
    since: Instant,
}

/// A dialog the interceptor answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogRecord {
    pub event: DialogEvent,
    pub resolution: DialogResolution,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Shared {
    one_shot: Option<DialogResolution>,
    persistent: Option<DialogResolution>,
    pending: Option<PendingDialog>,
    resolved: Vec<DialogRecord>,
}

/// Auto-resolves native dialogs according to the current arming.
pub struct DialogInterceptor {
    shared: Arc<Mutex<Shared>>,
    timeout: Duration,
    poll: Duration,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
}

impl DialogInterceptor {
    /// Subscribe to `driver`'s dialogs and start the listener task.
    ///
    /// `timeout` bounds how long an unanswered dialog may stay open;
    /// `poll` is the watchdog's check interval.
    pub fn start(driver: Arc<dyn BrowserDriver>, timeout: Duration, poll: Duration) -> Self {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let cancel = CancellationToken::new();
        let events = driver.dialog_events();
        let listener = tokio::spawn(listen(driver, events, shared.clone(), cancel.clone()));
        Self {
            shared,
            timeout,
            poll,
            cancel,
            listener,
        }
    }

    /// Arm a resolution for upcoming dialogs, replacing any previous arming
    /// of the same scope.
    pub async fn arm(&self, resolution: DialogResolution, scope: ArmScope) {
        let mut shared = self.shared.lock().await;
        match scope {
            ArmScope::OneShot => shared.one_shot = Some(resolution),
            ArmScope::Persistent => shared.persistent = Some(resolution),
        }
        debug!(%resolution, ?scope, "dialog interceptor armed");
    }

    /// Withdraw an unconsumed one-shot arming, leaving any persistent
    /// arming in place.
    pub async fn disarm_one_shot(&self) {
        let mut shared = self.shared.lock().await;
        if shared.one_shot.take().is_some() {
            debug!(persistent = shared.persistent.is_some(), "one-shot arming withdrawn");
        }
    }

    /// Remove every arming. Dialogs arriving afterwards become pending.
    pub async fn disarm(&self) {
        let mut shared = self.shared.lock().await;
        let had_one_shot = shared.one_shot.take().is_some();
        let had_persistent = shared.persistent.take().is_some();
        if had_one_shot || had_persistent {
            debug!("dialog interceptor disarmed");
        }
    }

    /// Whether an incoming dialog would be answered.
    pub async fn is_armed(&self) -> bool {
        let shared = self.shared.lock().await;
        shared.one_shot.is_some() || shared.persistent.is_some()
    }

    /// The resolution a persistent arming applies, if any.
    pub async fn persistent(&self) -> Option<DialogResolution> {
        self.shared.lock().await.persistent
    }

    /// Dialogs answered so far, oldest first.
    pub async fn resolved(&self) -> Vec<DialogRecord> {
        self.shared.lock().await.resolved.clone()
    }

    /// Number of dialogs answered so far.
    pub async fn resolved_count(&self) -> usize {
        self.shared.lock().await.resolved.len()
    }

    /// Waits up to `grace` for the current one-shot arming to be consumed.
    ///
    /// Returns true if it fired. No dialog appearing is not an error.
    pub async fn wait_consumed(&self, grace: Duration) -> bool {
        let start = Instant::now();
        loop {
            {
                let shared = self.shared.lock().await;
                if shared.one_shot.is_none() {
                    return true;
                }
            }
            if start.elapsed() >= grace {
                return false;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    async fn pending_overdue(&self) -> Option<HarnessError> {
        let shared = self.shared.lock().await;
        let pending = shared.pending.as_ref()?;
        let waited = pending.since.elapsed();
        (waited >= self.timeout).then(|| HarnessError::DialogTimeout {
            message: pending.event.message.clone(),
            waited_ms: waited.as_millis() as u64,
        })
    }

    async fn watchdog(&self) -> HarnessError {
        loop {
            if let Some(err) = self.pending_overdue().await {
                return err;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Runs `action`, failing with [`HarnessError::DialogTimeout`] if a
    /// dialog stays unanswered past the timeout.
    ///
    /// The check continues after the action returns: an action may complete
    /// while the dialog it spawned is still open, and that dialog must still
    /// be accounted for.
    pub async fn guard<T, F>(&self, action: F) -> Result<T, HarnessError>
    where
        F: std::future::Future<Output = Result<T, HarnessError>>,
    {
        tokio::pin!(action);
        let value = tokio::select! {
            result = &mut action => result?,
            err = self.watchdog() => {
                warn!(error = %err, "action blocked on an unanswered dialog");
                return Err(err);
            }
        };

        loop {
            let has_pending = self.shared.lock().await.pending.is_some();
            if !has_pending {
                return Ok(value);
            }
            if let Some(err) = self.pending_overdue().await {
                warn!(error = %err, "dialog left open after action");
                return Err(err);
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Dismisses a dialog left pending, so the page can be inspected.
    ///
    /// Returns true if there was one to dismiss.
    pub async fn dismiss_pending(&self, driver: &dyn BrowserDriver) -> bool {
        let pending = self.shared.lock().await.pending.take();
        let Some(pending) = pending else {
            return false;
        };
        match driver.resolve_dialog(DialogResolution::Dismiss).await {
            Ok(()) => {
                debug!(message = %pending.event.message, "pending dialog dismissed");
                true
            }
            Err(e) => {
                warn!(error = %e, "could not dismiss pending dialog");
                false
            }
        }
    }

    /// Stops the listener task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DialogInterceptor {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.listener.abort();
    }
}

async fn listen(
    driver: Arc<dyn BrowserDriver>,
    mut events: broadcast::Receiver<DialogEvent>,
    shared: Arc<Mutex<Shared>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "dialog listener lagged behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let resolution = {
            let mut guard = shared.lock().await;
            // A one-shot answers first; the persistent arming is the fallback.
            let resolution = guard.one_shot.take().or(guard.persistent);
            if resolution.is_none() {
                warn!(message = %event.message, kind = ?event.kind, "dialog opened with nothing armed");
                guard.pending = Some(PendingDialog { event: event.clone(), since: Instant::now() });
            }
            resolution
        };

        let Some(resolution) = resolution else {
            continue;
        };

        match driver.resolve_dialog(resolution).await {
            Ok(()) => {
                info!(message = %event.message, %resolution, "dialog resolved");
                let mut guard = shared.lock().await;
                guard.resolved.push(DialogRecord {
                    event,
                    resolution,
                    at: Utc::now(),
                });
            }
            Err(e) => {
                warn!(error = %e, message = %event.message, "failed to resolve dialog");
                let mut guard = shared.lock().await;
                guard.pending = Some(PendingDialog { event, since: Instant::now() });
            }
        }
    }
    debug!("dialog listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_scope_serde() {
        assert_eq!(serde_json::to_string(&ArmScope::OneShot).unwrap(), r#""one_shot""#);
        assert_eq!(serde_json::to_string(&ArmScope::Persistent).unwrap(), r#""persistent""#);
    }
}
