//! Verification steps.
//!
//! A journey is an ordered list of [`VerificationStep`]s. Each step performs
//! one [`StepAction`], optionally waits for a [`Wait`] condition, evaluates
//! its [`Assertion`]s and optionally captures a screenshot.
//!
//! Steps serialize to JSON with a `type` tag on actions and assertions, so a
//! journey can be dumped into the run report as-is.
//!
//! # Example
//!
//! ```
//! use orbit_verify_core::nav::NavigationState;
//! use orbit_verify_core::selector::Selector;
//! use orbit_verify_core::step::{Assertion, StepAction, VerificationStep};
//!
//! let step = VerificationStep::new("intel", StepAction::GoTo { state: NavigationState::Intel })
//!     .assert(Assertion::visible(Selector::exact_text("Momentum")))
//!     .screenshot("intel");
//! assert_eq!(step.action.name(), "go_to");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nav::{NavigationState, ViewMode};
use crate::seed::SeedKind;
use crate::selector::Selector;
use crate::wait::Wait;

/// What a step does to the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Load the base URL and wait for the document.
    Open,
    /// Switch to a top-level view.
    GoTo { state: NavigationState },
    /// Switch the active view's segmented control.
    SetMode { mode: ViewMode },
    /// Run the seed or reset handshake.
    Seed { kind: SeedKind },
    /// Click an element that must exist.
    Click { selector: Selector },
    /// Click an element if it is there; absence is only logged.
    ClickOptional { selector: Selector },
    /// Scroll an element into view.
    ScrollTo { selector: Selector },
    /// Fixed pause, for animations.
    Pause { ms: u64 },
    /// Observe only.
    None,
}

impl StepAction {
    /// Short static name for span metadata and reports.
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Open => "open",
            StepAction::GoTo { .. } => "go_to",
            StepAction::SetMode { .. } => "set_mode",
            StepAction::Seed { .. } => "seed",
            StepAction::Click { .. } => "click",
            StepAction::ClickOptional { .. } => "click_optional",
            StepAction::ScrollTo { .. } => "scroll_to",
            StepAction::Pause { .. } => "pause",
            StepAction::None => "none",
        }
    }
}

/// An expectation evaluated after a step's action and wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    Visible { selector: Selector },
    Hidden { selector: Selector },
    /// At least one of the selectors is visible.
    AnyVisible { selectors: Vec<Selector> },
    /// Exactly `expected` visible matches.
    Count { selector: Selector, expected: usize },
    /// The navigator's verified state is `state`.
    ActiveState { state: NavigationState },
}

impl Assertion {
    pub fn visible(selector: Selector) -> Self {
        Assertion::Visible { selector }
    }

    pub fn hidden(selector: Selector) -> Self {
        Assertion::Hidden { selector }
    }

    pub fn any_visible(selectors: Vec<Selector>) -> Self {
        Assertion::AnyVisible { selectors }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::Visible { selector } => write!(f, "{} is visible", selector),
            Assertion::Hidden { selector } => write!(f, "{} is hidden", selector),
            Assertion::AnyVisible { selectors } => {
                let parts: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
                write!(f, "one of [{}] is visible", parts.join(", "))
            }
            Assertion::Count { selector, expected } => write!(f, "{} appears {} time(s)", selector, expected),
            Assertion::ActiveState { state } => write!(f, "{} is the active view", state),
        }
    }
}

/// One step of a journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStep {
    pub name: String,
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<Wait>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    /// Screenshot target name, saved as `<journey>_<target>.png`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl VerificationStep {
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            action,
            wait: None,
            assertions: Vec::new(),
            screenshot: None,
        }
    }

    /// A step that only observes.
    pub fn observe(name: impl Into<String>) -> Self {
        Self::new(name, StepAction::None)
    }

    pub fn wait(mut self, wait: Wait) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn screenshot(mut self, target: impl Into<String>) -> Self {
        self.screenshot = Some(target.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::WaitCondition;

    #[test]
    fn action_serde_uses_type_tag() {
        let action = StepAction::SetMode { mode: ViewMode::TimeTracker };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"type":"set_mode","mode":"TimeTracker"}"#);

        let back: StepAction = serde_json::from_str(r#"{"type":"seed","kind":"reset"}"#).unwrap();
        assert_eq!(back, StepAction::Seed { kind: SeedKind::Reset });

        let none: StepAction = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(none, StepAction::None);
    }

    #[test]
    fn builder_collects_everything() {
        let step = VerificationStep::observe("check")
            .wait(Wait::optional(WaitCondition::visible(Selector::text("Edit"))))
            .assert(Assertion::visible(Selector::text("Activity")))
            .assert(Assertion::ActiveState { state: NavigationState::Logger })
            .screenshot("check");
        assert_eq!(step.action, StepAction::None);
        assert_eq!(step.assertions.len(), 2);
        assert_eq!(step.screenshot.as_deref(), Some("check"));
        assert!(step.wait.is_some());
    }

    #[test]
    fn assertion_display() {
        let a = Assertion::Count { selector: Selector::css(".tab-item"), expected: 4 };
        assert_eq!(a.to_string(), ".tab-item appears 4 time(s)");
        let a = Assertion::ActiveState { state: NavigationState::System };
        assert_eq!(a.to_string(), "System is the active view");
    }

    #[test]
    fn empty_fields_are_omitted() {
        let step = VerificationStep::new("open", StepAction::Open);
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"name":"open","action":{"type":"open"}}"#);
    }
}
