//! Browser automation driver trait.
//!
//! This module defines the [`BrowserDriver`] trait, the opaque capability set
//! the harness consumes from a browser-automation engine: navigation, element
//! queries, clicks, load-state waits, screenshots and native dialog events.
//! The navigation state machine, the dialog interceptor and the seed protocol
//! are written purely against this trait, so they can be exercised against an
//! in-process simulation as easily as against a real browser.
//!
//! The production backend is [`CdpDriver`](crate::cdp_driver::CdpDriver).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::Viewport;
use crate::selector::Selector;

/// Errors that can occur during driver operations.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// The browser could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The browser session is gone.
    #[error("Not connected to browser")]
    NotConnected,

    /// No visible element matched the selector.
    #[error("No element matches {0}")]
    ElementNotFound(String),

    /// There is no open dialog to resolve.
    #[error("No dialog is open")]
    NoDialog,

    /// An operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// An in-page script failed or returned something unexpected.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The kind of native dialog raised by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    Alert,
    Confirm,
    Prompt,
    BeforeUnload,
}

/// A native dialog that has just opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogEvent {
    pub kind: DialogKind,
    pub message: String,
}

/// How an open dialog should be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogResolution {
    Accept,
    Dismiss,
}

impl DialogResolution {
    /// Whether this resolution answers "OK" to the dialog.
    pub fn accepts(self) -> bool {
        matches!(self, DialogResolution::Accept)
    }
}

impl fmt::Display for DialogResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogResolution::Accept => write!(f, "accept"),
            DialogResolution::Dismiss => write!(f, "dismiss"),
        }
    }
}

/// Document load milestones a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    DomContentLoaded,
    Load,
    /// The document is loaded and no new network requests have started
    /// for a short quiet period.
    NetworkIdle,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::DomContentLoaded => write!(f, "domcontentloaded"),
            LoadState::Load => write!(f, "load"),
            LoadState::NetworkIdle => write!(f, "networkidle"),
        }
    }
}

/// Trait for backend-agnostic browser automation.
///
/// Every call issues at most one engine action and returns once the engine
/// has acknowledged it. Nothing in this trait waits unboundedly: callers
/// pass explicit timeouts wherever the engine might otherwise block.
///
/// A click that makes the page raise a native dialog may not return until
/// the dialog has been resolved. Dialog notifications are therefore pushed
/// through [`dialog_events`](BrowserDriver::dialog_events) on the engine's own
/// event delivery, independently of the blocked call.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate the page to `url`.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// Number of visible elements matching `selector`.
    ///
    /// Positional narrowing (`nth`) is honoured, so the result is 0 or 1 for
    /// positional selectors.
    async fn count(&self, selector: &Selector) -> Result<usize, DriverError>;

    /// Whether at least one visible element matches.
    async fn is_visible(&self, selector: &Selector) -> Result<bool, DriverError> {
        Ok(self.count(selector).await? > 0)
    }

    /// Click the first visible element matching `selector`.
    ///
    /// Fails with [`DriverError::ElementNotFound`] when nothing matches.
    async fn click(&self, selector: &Selector) -> Result<(), DriverError>;

    /// Scroll the first match into view. The default does nothing.
    async fn scroll_into_view(&self, _selector: &Selector) -> Result<(), DriverError> {
        Ok(())
    }

    /// Wait until the document reaches `state`, or fail with
    /// [`DriverError::Timeout`].
    async fn wait_for_load_state(
        &self,
        state: LoadState,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Number of document loads observed since the session started.
    ///
    /// Increases by one on every full page (re)load.
    fn load_generation(&self) -> u64;

    /// Capture the current viewport as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Serialised DOM of the current document.
    async fn content(&self) -> Result<String, DriverError>;

    /// Apply viewport size and device emulation.
    async fn set_viewport(&self, viewport: &Viewport) -> Result<(), DriverError>;

    /// Subscribe to native dialog notifications.
    fn dialog_events(&self) -> broadcast::Receiver<DialogEvent>;

    /// Close the currently open dialog.
    async fn resolve_dialog(&self, resolution: DialogResolution) -> Result<(), DriverError>;

    /// Tear down the browser session.
    async fn close(&self) -> Result<(), DriverError>;
}
