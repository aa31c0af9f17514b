//! Verification step runner.
//!
//! [`StepRunner::run`] executes a journey's steps strictly in order:
//! action, then wait condition, then assertions, then screenshot.
//!
//! - An assertion miss is soft: it is recorded in [`RunResult::failed`] and
//!   the run moves on to the next step.
//! - Anything else (a required wait that never resolves, a navigation that
//!   cannot be verified, an unanswered dialog, a lost browser) is hard: the
//!   runner captures one failure screenshot and stops.
//!
//! The run report is written at the end either way.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::dialog::DialogRecord;
use crate::error::{HarnessError, Severity};
use crate::evidence::EvidenceStore;
use crate::seed::SeedOperation;
use crate::session::Harness;
use crate::step::{Assertion, StepAction, VerificationStep};
use crate::wait::{wait_until, Presence, Wait, WaitCondition};

/// A step that completed with every assertion met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub action: String,
    pub assertions: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

/// A soft failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub step: String,
    pub assertion: Assertion,
    pub message: String,
}

/// The hard failure that ended a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    pub step: String,
    /// Stable error name, e.g. `NavigationVerificationFailed`.
    pub code: String,
    pub message: String,
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Passed,
    AssertionsFailed,
    Crashed,
}

impl RunOutcome {
    /// Process exit code for this verdict.
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Passed => 0,
            RunOutcome::AssertionsFailed => 1,
            RunOutcome::Crashed => 2,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Passed => write!(f, "PASSED"),
            RunOutcome::AssertionsFailed => write!(f, "ASSERTIONS FAILED"),
            RunOutcome::Crashed => write!(f, "CRASHED"),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub journey: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub passed: Vec<StepRecord>,
    pub failed: Vec<AssertionFailure>,
    /// Screenshots written during the run, in order.
    pub artifacts: Vec<PathBuf>,
    pub error_capture: Option<PathBuf>,
    pub crash: Option<CrashRecord>,
    pub seed_operations: Vec<SeedOperation>,
    pub dialogs: Vec<DialogRecord>,
}

impl RunResult {
    pub fn new(journey: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            journey: journey.into(),
            started_at: Utc::now(),
            finished_at: None,
            passed: Vec::new(),
            failed: Vec::new(),
            artifacts: Vec::new(),
            error_capture: None,
            crash: None,
            seed_operations: Vec::new(),
            dialogs: Vec::new(),
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.crash.is_some() {
            RunOutcome::Crashed
        } else if !self.failed.is_empty() {
            RunOutcome::AssertionsFailed
        } else {
            RunOutcome::Passed
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == RunOutcome::Passed
    }

    /// A result for a run that never got a browser.
    pub fn crashed_before_start(journey: impl Into<String>, err: &HarnessError) -> Self {
        let mut result = Self::new(journey);
        result.crash = Some(CrashRecord {
            step: "launch".to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        });
        result.finished_at = Some(Utc::now());
        result
    }
}

/// Runs verification steps against a [`Harness`].
pub struct StepRunner<'a> {
    harness: &'a Harness,
    evidence: EvidenceStore,
}

impl<'a> StepRunner<'a> {
    pub fn new(harness: &'a Harness, evidence: EvidenceStore) -> Self {
        Self { harness, evidence }
    }

    /// Execute `steps` in order and return the finalized result.
    pub async fn run(&self, steps: &[VerificationStep]) -> RunResult {
        let mut result = RunResult::new(self.evidence.journey());
        info!(journey = %result.journey, run_id = %result.run_id, steps = steps.len(), "run started");

        for (index, step) in steps.iter().enumerate() {
            let span = info_span!("step", n = index + 1, name = %step.name, action = step.action.name());
            let outcome = self.run_step(step, &mut result).instrument(span).await;

            if let Err(err) = outcome {
                error!(step = %step.name, code = err.code(), "{}", err);
                result.crash = Some(CrashRecord {
                    step: step.name.clone(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                let skipped = steps.len() - index - 1;
                if skipped > 0 {
                    warn!(skipped, "remaining steps skipped");
                }
                self.harness.dismiss_pending_dialog().await;
                result.error_capture = self
                    .evidence
                    .capture_failure(self.harness.driver(), "error")
                    .await;
                if let Some(path) = &result.error_capture {
                    result.artifacts.push(path.clone());
                }
                break;
            }
        }

        result.dialogs = self.harness.interceptor().resolved().await;
        result.finished_at = Some(Utc::now());

        match self.evidence.write_report(&result).await {
            Ok(path) => info!(path = %path.display(), "run report written"),
            Err(e) => warn!(error = %e, "run report could not be written"),
        }
        info!(
            outcome = %result.outcome(),
            passed = result.passed.len(),
            failed = result.failed.len(),
            "run finished"
        );
        result
    }

    async fn run_step(&self, step: &VerificationStep, result: &mut RunResult) -> Result<(), HarnessError> {
        let start = Instant::now();
        info!("step started");

        self.perform(&step.action, result).await?;

        if let Some(wait) = &step.wait {
            self.await_condition(wait).await?;
        }

        let mut misses = 0;
        for assertion in &step.assertions {
            let err = match self.evaluate(&step.name, assertion).await {
                Ok(()) => continue,
                Err(err) => err,
            };
            if err.severity() == Severity::Hard {
                return Err(err);
            }
            warn!(%assertion, code = err.code(), "{}", err);
            let message = match err {
                HarnessError::AssertionFailed { message, .. } => message,
                other => other.to_string(),
            };
            result.failed.push(AssertionFailure {
                step: step.name.clone(),
                assertion: assertion.clone(),
                message,
            });
            misses += 1;
        }

        let mut screenshot = None;
        if let Some(target) = &step.screenshot {
            match self.evidence.save_screenshot(self.harness.driver(), target).await {
                Ok(path) => {
                    info!(path = %path.display(), "screenshot captured");
                    result.artifacts.push(path.clone());
                    screenshot = Some(path);
                }
                Err(e) => warn!(error = %e, target = %target, "screenshot failed"),
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if misses == 0 {
            info!(elapsed_ms, "step passed");
            result.passed.push(StepRecord {
                name: step.name.clone(),
                action: step.action.name().to_string(),
                assertions: step.assertions.len(),
                elapsed_ms,
                screenshot,
            });
        } else {
            warn!(elapsed_ms, misses, "step finished with failed assertions");
        }
        Ok(())
    }

    async fn perform(&self, action: &StepAction, result: &mut RunResult) -> Result<(), HarnessError> {
        match action {
            StepAction::Open => self.harness.open().await,
            StepAction::GoTo { state } => self.harness.go_to(*state).await.map(drop),
            StepAction::SetMode { mode } => self.harness.set_mode(*mode).await.map(drop),
            StepAction::Seed { kind } => {
                let op = self.harness.run_seed_operation(*kind).await?;
                result.seed_operations.push(op);
                Ok(())
            }
            StepAction::Click { selector } => self.harness.click(selector).await,
            StepAction::ClickOptional { selector } => self.harness.click_optional(selector).await.map(drop),
            StepAction::ScrollTo { selector } => self.harness.scroll_to(selector).await,
            StepAction::Pause { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            StepAction::None => Ok(()),
        }
    }

    async fn await_condition(&self, wait: &Wait) -> Result<(), HarnessError> {
        let timeouts = &self.harness.config().timeouts;
        let timeout = wait
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| timeouts.wait());
        let outcome = wait_until(self.harness.driver(), &wait.condition, timeout, timeouts.poll()).await?;
        if outcome.is_satisfied() {
            return Ok(());
        }
        match wait.presence {
            Presence::Required => Err(HarnessError::WaitTimeout {
                condition: wait.condition.to_string(),
                elapsed_ms: outcome.elapsed_ms(),
            }),
            Presence::Optional => {
                info!(condition = %wait.condition, "optional condition not met; continuing");
                Ok(())
            }
        }
    }

    /// A miss comes back as the soft [`HarnessError::AssertionFailed`].
    async fn evaluate(&self, step: &str, assertion: &Assertion) -> Result<(), HarnessError> {
        let missed = |message: String| HarnessError::AssertionFailed {
            step: step.to_string(),
            message,
        };

        let condition = match assertion {
            Assertion::Visible { selector } => WaitCondition::visible(selector.clone()),
            Assertion::Hidden { selector } => WaitCondition::hidden(selector.clone()),
            Assertion::AnyVisible { selectors } => WaitCondition::AnyVisible { selectors: selectors.clone() },
            Assertion::Count { selector, expected } => WaitCondition::Count {
                selector: selector.clone(),
                count: *expected,
            },
            Assertion::ActiveState { state } => {
                return match self.harness.active_state().await {
                    Some(active) if active == *state => Ok(()),
                    Some(active) => Err(missed(format!(
                        "expected {} to be the active view, found {}",
                        state, active
                    ))),
                    None => Err(missed(format!(
                        "expected {} to be the active view, but no view is verified",
                        state
                    ))),
                };
            }
        };

        let timeouts = &self.harness.config().timeouts;
        let driver = self.harness.driver();
        let outcome = wait_until(driver, &condition, timeouts.assertion(), timeouts.poll()).await?;
        if outcome.is_satisfied() {
            return Ok(());
        }

        let message = match assertion {
            Assertion::Count { selector, expected } => {
                let actual = driver.count(selector).await?;
                format!("expected {} match(es) for {}, found {}", expected, selector, actual)
            }
            other => format!("expected {} (gave up after {}ms)", other, outcome.elapsed_ms()),
        };
        Err(missed(message))
    }
}
