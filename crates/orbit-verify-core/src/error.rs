//! Harness error taxonomy.
//!
//! Every failure the harness can observe is a [`HarnessError`]. Only
//! [`HarnessError::AssertionFailed`] is soft: it is recorded and the run
//! continues. Everything else is hard and aborts the remaining steps after a
//! best-effort evidence capture.

use thiserror::Error;

use crate::driver::DriverError;
use crate::nav::{Destination, NavigationState, ViewMode};
use crate::seed::SeedKind;

/// Whether a failure stops the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recorded; later steps still run.
    Soft,
    /// Aborts remaining steps and triggers evidence capture.
    Hard,
}

#[derive(Error, Debug)]
pub enum HarnessError {
    /// The control leading to a destination never became interactable.
    #[error("Navigation target {0} is unreachable")]
    NavigationUnreachable(Destination),

    /// A view mode was requested while a different view is active.
    #[error("View mode {mode} is not available while {}", describe_state(.state))]
    InvalidModeForState {
        mode: ViewMode,
        state: Option<NavigationState>,
    },

    /// A transition was issued but its landmark never rendered.
    #[error(
        "Could not verify navigation to {target} (last verified: {})",
        .last_known.map(|d| d.to_string()).unwrap_or_else(|| "unknown".to_string())
    )]
    NavigationVerificationFailed {
        target: Destination,
        last_known: Option<Destination>,
    },

    /// A native dialog stayed open without being resolved.
    #[error("Dialog \"{message}\" was not resolved within {waited_ms}ms")]
    DialogTimeout { message: String, waited_ms: u64 },

    /// The seed or reset control could not be found or clicked.
    #[error("{kind} control is missing: {reason}")]
    SeedControlMissing { kind: SeedKind, reason: String },

    /// A seed or reset handshake is already running.
    #[error("Cannot start {requested}: a {in_flight} operation is already in progress")]
    SeedOperationInProgress { requested: SeedKind, in_flight: SeedKind },

    /// An expectation was not met. Soft.
    #[error("Assertion failed in step '{step}': {message}")]
    AssertionFailed { step: String, message: String },

    /// A required wait condition never resolved.
    #[error("Timed out after {elapsed_ms}ms waiting for {condition}")]
    WaitTimeout { condition: String, elapsed_ms: u64 },

    /// The browser engine reported an error.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Anything else.
    #[error("Harness crashed: {0}")]
    HarnessCrash(String),
}

fn describe_state(state: &Option<NavigationState>) -> String {
    match state {
        Some(state) => format!("{} is active", state),
        None => "no view is verified".to_string(),
    }
}

impl HarnessError {
    pub fn severity(&self) -> Severity {
        match self {
            HarnessError::AssertionFailed { .. } => Severity::Soft,
            _ => Severity::Hard,
        }
    }

    pub fn is_hard(&self) -> bool {
        self.severity() == Severity::Hard
    }

    /// Stable short name used in run reports.
    pub fn code(&self) -> &'static str {
        match self {
            HarnessError::NavigationUnreachable(_) => "NavigationUnreachable",
            HarnessError::InvalidModeForState { .. } => "InvalidModeForState",
            HarnessError::NavigationVerificationFailed { .. } => "NavigationVerificationFailed",
            HarnessError::DialogTimeout { .. } => "DialogTimeout",
            HarnessError::SeedControlMissing { .. } => "SeedControlMissing",
            HarnessError::SeedOperationInProgress { .. } => "SeedOperationInProgress",
            HarnessError::AssertionFailed { .. } => "AssertionFailed",
            HarnessError::WaitTimeout { .. } => "WaitTimeout",
            HarnessError::Driver(_) | HarnessError::HarnessCrash(_) => "HarnessCrash",
        }
    }
}
