//! Bounded, polling waits.
//!
//! Every wait in the harness goes through [`wait_until`]: the condition is
//! re-checked on a fixed interval until it holds or the deadline passes.
//! There is no unbounded wait anywhere.
//!
//! A [`Wait`] also carries a [`Presence`] policy. Required waits that time
//! out are hard failures; optional waits that time out are logged and
//! ignored, because absence of optional UI is not a failure.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Landmark;
use crate::driver::{BrowserDriver, DriverError, LoadState};
use crate::selector::Selector;

/// Something that eventually becomes true in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitCondition {
    /// The selector has at least one visible match.
    Visible { selector: Selector },
    /// The selector has no visible match.
    Hidden { selector: Selector },
    /// At least one of the selectors is visible.
    AnyVisible { selectors: Vec<Selector> },
    /// The selector has exactly `count` visible matches.
    Count { selector: Selector, count: usize },
    /// The document reached a load milestone.
    LoadState { state: LoadState },
    /// A fixed pause. Always satisfied once elapsed.
    Delay { ms: u64 },
}

impl WaitCondition {
    pub fn visible(selector: Selector) -> Self {
        WaitCondition::Visible { selector }
    }

    pub fn hidden(selector: Selector) -> Self {
        WaitCondition::Hidden { selector }
    }

    pub fn landmark(landmark: &Landmark) -> Self {
        WaitCondition::AnyVisible { selectors: landmark.any_of.clone() }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Visible { selector } => write!(f, "{} to be visible", selector),
            WaitCondition::Hidden { selector } => write!(f, "{} to be hidden", selector),
            WaitCondition::AnyVisible { selectors } => {
                let parts: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
                write!(f, "any of [{}] to be visible", parts.join(", "))
            }
            WaitCondition::Count { selector, count } => write!(f, "{} x{}", selector, count),
            WaitCondition::LoadState { state } => write!(f, "load state {}", state),
            WaitCondition::Delay { ms } => write!(f, "{}ms pause", ms),
        }
    }
}

/// Whether a wait that times out is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Timing out is a hard failure.
    #[default]
    Required,
    /// Timing out is logged and ignored.
    Optional,
}

/// A condition plus its timeout and presence policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    pub condition: WaitCondition,
    #[serde(default)]
    pub presence: Presence,
    /// Overrides the configured default bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Wait {
    pub fn required(condition: WaitCondition) -> Self {
        Self { condition, presence: Presence::Required, timeout_ms: None }
    }

    pub fn optional(condition: WaitCondition) -> Self {
        Self { condition, presence: Presence::Optional, timeout_ms: None }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// How a bounded wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied { elapsed_ms: u64 },
    TimedOut { elapsed_ms: u64 },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied { .. })
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            WaitOutcome::Satisfied { elapsed_ms } | WaitOutcome::TimedOut { elapsed_ms } => *elapsed_ms,
        }
    }
}

/// Returns true if any selector of `landmark` is visible right now.
pub async fn landmark_visible(driver: &dyn BrowserDriver, landmark: &Landmark) -> Result<bool, DriverError> {
    for selector in &landmark.any_of {
        if driver.is_visible(selector).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Checks `condition` once.
pub async fn check(driver: &dyn BrowserDriver, condition: &WaitCondition) -> Result<bool, DriverError> {
    match condition {
        WaitCondition::Visible { selector } => driver.is_visible(selector).await,
        WaitCondition::Hidden { selector } => Ok(!driver.is_visible(selector).await?),
        WaitCondition::AnyVisible { selectors } => {
            for selector in selectors {
                if driver.is_visible(selector).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        WaitCondition::Count { selector, count } => Ok(driver.count(selector).await? == *count),
        WaitCondition::LoadState { .. } | WaitCondition::Delay { .. } => Ok(true),
    }
}

/// Polls `condition` every `poll` until it holds or `timeout` elapses.
///
/// Transient driver errors (for example while a document is being replaced
/// by a reload) count as "not yet". Losing the browser altogether is
/// returned as an error immediately.
pub async fn wait_until(
    driver: &dyn BrowserDriver,
    condition: &WaitCondition,
    timeout: Duration,
    poll: Duration,
) -> Result<WaitOutcome, DriverError> {
    let start = Instant::now();

    match condition {
        WaitCondition::Delay { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            return Ok(WaitOutcome::Satisfied { elapsed_ms: start.elapsed().as_millis() as u64 });
        }
        WaitCondition::LoadState { state } => {
            let elapsed_ms = || start.elapsed().as_millis() as u64;
            return match driver.wait_for_load_state(*state, timeout).await {
                Ok(()) => Ok(WaitOutcome::Satisfied { elapsed_ms: elapsed_ms() }),
                Err(DriverError::Timeout) => Ok(WaitOutcome::TimedOut { elapsed_ms: elapsed_ms() }),
                Err(e) => Err(e),
            };
        }
        _ => {}
    }

    loop {
        match check(driver, condition).await {
            Ok(true) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                debug!(elapsed_ms, %condition, "wait satisfied");
                return Ok(WaitOutcome::Satisfied { elapsed_ms });
            }
            Ok(false) => {}
            Err(DriverError::NotConnected) => return Err(DriverError::NotConnected),
            Err(e) => debug!(error = %e, "transient error while waiting"),
        }
        if start.elapsed() >= timeout {
            return Ok(WaitOutcome::TimedOut { elapsed_ms: start.elapsed().as_millis() as u64 });
        }
        tokio::time::sleep(poll).await;
    }
}
