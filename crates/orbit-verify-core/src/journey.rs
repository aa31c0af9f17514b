//! Catalogue of verification journeys.
//!
//! Each [`Journey`] expands into a fixed list of [`VerificationStep`]s built
//! against the configured [`AppContract`], so selector overrides in the
//! config file flow into every journey.

use std::fmt;
use std::str::FromStr;

use crate::app::{AppContract, Landmark};
use crate::nav::{NavigationState, ViewMode};
use crate::seed::SeedKind;
use crate::selector::Selector;
use crate::step::{Assertion, StepAction, VerificationStep};
use crate::wait::{Wait, WaitCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Journey {
    HorizonWizard,
    SeedTour,
    Orbit,
    SystemSettings,
    ActivityManager,
    MetricBuilder,
    Fixes,
    ResetCheck,
}

impl Journey {
    pub const ALL: [Journey; 8] = [
        Journey::HorizonWizard,
        Journey::SeedTour,
        Journey::Orbit,
        Journey::SystemSettings,
        Journey::ActivityManager,
        Journey::MetricBuilder,
        Journey::Fixes,
        Journey::ResetCheck,
    ];

    /// Subcommand name, also the evidence file prefix.
    pub fn name(self) -> &'static str {
        match self {
            Journey::HorizonWizard => "horizon-wizard",
            Journey::SeedTour => "seed-tour",
            Journey::Orbit => "orbit",
            Journey::SystemSettings => "system-settings",
            Journey::ActivityManager => "activity-manager",
            Journey::MetricBuilder => "metric-builder",
            Journey::Fixes => "fixes",
            Journey::ResetCheck => "reset-check",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Journey::HorizonWizard => "Empty Horizon shows the agent and opens the setup wizard",
            Journey::SeedTour => "Reset, seed, then tour Horizon (incl. edit mode) and Logger",
            Journey::Orbit => "Seed, then check Horizon widgets and Intel momentum",
            Journey::SystemSettings => "System metrics view and settings view",
            Journey::ActivityManager => "Logger time tracker, stopwatch and activity manager",
            Journey::MetricBuilder => "Open the metric builder from System",
            Journey::Fixes => "Seed, then capture Horizon, Logger and System data buttons",
            Journey::ResetCheck => "Reset, then check Horizon and Logger empty states",
        }
    }

    pub fn steps(self, app: &AppContract) -> Vec<VerificationStep> {
        match self {
            Journey::HorizonWizard => horizon_wizard(),
            Journey::SeedTour => seed_tour(app),
            Journey::Orbit => orbit(app),
            Journey::SystemSettings => system_settings(app),
            Journey::ActivityManager => activity_manager(),
            Journey::MetricBuilder => metric_builder(),
            Journey::Fixes => fixes(),
            Journey::ResetCheck => reset_check(app),
        }
    }
}

impl fmt::Display for Journey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Journey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Journey::ALL
            .into_iter()
            .find(|j| j.name() == s)
            .ok_or_else(|| format!("unknown journey '{}'", s))
    }
}

fn open() -> VerificationStep {
    VerificationStep::new("open", StepAction::Open)
}

fn go_to(name: &str, state: NavigationState) -> VerificationStep {
    VerificationStep::new(name, StepAction::GoTo { state })
}

fn shows(landmark: &Landmark) -> Assertion {
    Assertion::any_visible(landmark.any_of.clone())
}

fn settle(ms: u64) -> Wait {
    Wait::required(WaitCondition::Delay { ms })
}

fn horizon_wizard() -> Vec<VerificationStep> {
    let launch = Selector::button("Launch Setup");
    vec![
        open(),
        VerificationStep::observe("empty-state")
            .wait(Wait::optional(WaitCondition::visible(Selector::text("I am your Horizon Agent"))))
            .assert(Assertion::visible(Selector::text("I am your Horizon Agent")))
            .assert(Assertion::visible(launch.clone()))
            .screenshot("initial"),
        VerificationStep::new("wizard", StepAction::Click { selector: launch })
            .wait(settle(1000))
            .assert(Assertion::visible(Selector::text("Define Your First Metric")))
            .screenshot("wizard"),
    ]
}

fn seed_tour(app: &AppContract) -> Vec<VerificationStep> {
    vec![
        open(),
        VerificationStep::new("reset", StepAction::Seed { kind: SeedKind::Reset }),
        VerificationStep::new("seed", StepAction::Seed { kind: SeedKind::Seed }),
        go_to("horizon", NavigationState::Horizon)
            .assert(Assertion::visible(Selector::text("Journal")))
            .screenshot("horizon"),
        VerificationStep::new("edit-mode", StepAction::ClickOptional { selector: Selector::exact_text("Edit") })
            .wait(Wait::optional(WaitCondition::visible(Selector::exact_text("Done"))))
            .screenshot("horizon_edit"),
        VerificationStep::new("edit-done", StepAction::ClickOptional { selector: Selector::exact_text("Done") })
            .wait(settle(500)),
        go_to("logger", NavigationState::Logger)
            .assert(shows(&app.data.logger_seeded))
            .screenshot("logger"),
    ]
}

fn orbit(app: &AppContract) -> Vec<VerificationStep> {
    vec![
        open().wait(Wait::required(WaitCondition::landmark(app.landmark(NavigationState::Horizon)))),
        VerificationStep::new("seed", StepAction::Seed { kind: SeedKind::Seed }),
        go_to("horizon", NavigationState::Horizon)
            .assert(Assertion::visible(Selector::exact_text("Water (oz)")))
            .screenshot("horizon"),
        go_to("intel", NavigationState::Intel)
            .assert(Assertion::visible(Selector::exact_text("System Health")))
            .assert(shows(&app.data.intel_seeded))
            .screenshot("intel"),
    ]
}

fn system_settings(app: &AppContract) -> Vec<VerificationStep> {
    vec![
        open(),
        go_to("metrics", NavigationState::System)
            .wait(Wait::required(WaitCondition::landmark(&app.mode(ViewMode::Metrics).landmark)))
            .assert(Assertion::ActiveState { state: NavigationState::System })
            .screenshot("metrics_view"),
        VerificationStep::new("settings", StepAction::SetMode { mode: ViewMode::Settings })
            .wait(Wait::required(WaitCondition::visible(Selector::text("Storage"))))
            .assert(Assertion::visible(Selector::text("Storage"))),
        VerificationStep::new("settings-settled", StepAction::Pause { ms: 500 }).screenshot("settings_view"),
    ]
}

fn activity_manager() -> Vec<VerificationStep> {
    vec![
        open(),
        go_to("logger", NavigationState::Logger),
        VerificationStep::new("time-tracker", StepAction::SetMode { mode: ViewMode::TimeTracker })
            .assert(Assertion::visible(Selector::text("Activity")))
            .screenshot("manual_mode"),
        VerificationStep::new("stopwatch", StepAction::Click { selector: Selector::text("Stopwatch") })
            .wait(Wait::required(WaitCondition::visible(Selector::text("00:00:00"))))
            .screenshot("stopwatch_mode"),
        VerificationStep::observe("manager")
            .wait(Wait::required(WaitCondition::visible(Selector::text("Manage Activities"))))
            .screenshot("list"),
        VerificationStep::new("new-activity", StepAction::Click { selector: Selector::button("New") })
            .wait(settle(500))
            .screenshot("form"),
    ]
}

fn metric_builder() -> Vec<VerificationStep> {
    vec![
        open(),
        go_to("system", NavigationState::System),
        VerificationStep::new("builder", StepAction::Click { selector: Selector::text("Add New Metric") })
            .wait(settle(2000))
            .screenshot("modal_open"),
    ]
}

fn fixes() -> Vec<VerificationStep> {
    let export = Selector::text("Universal Export");
    vec![
        open(),
        VerificationStep::new("seed", StepAction::Seed { kind: SeedKind::Seed }),
        go_to("horizon", NavigationState::Horizon).screenshot("horizon"),
        go_to("logger", NavigationState::Logger).screenshot("logger_contrast"),
        go_to("system", NavigationState::System),
        VerificationStep::new("settings", StepAction::SetMode { mode: ViewMode::Settings }),
        VerificationStep::new("data-buttons", StepAction::ScrollTo { selector: export.clone() })
            .wait(settle(500))
            .assert(Assertion::visible(export))
            .screenshot("system_buttons"),
    ]
}

fn reset_check(app: &AppContract) -> Vec<VerificationStep> {
    vec![
        open(),
        VerificationStep::new("reset", StepAction::Seed { kind: SeedKind::Reset }),
        go_to("horizon", NavigationState::Horizon)
            .assert(shows(&app.data.horizon_empty))
            .screenshot("horizon_empty"),
        go_to("logger", NavigationState::Logger)
            .assert(shows(&app.data.logger_empty))
            .assert(Assertion::ActiveState { state: NavigationState::Logger })
            .screenshot("logger_empty"),
    ]
}
