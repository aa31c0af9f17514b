//! Contract with the application under test.
//!
//! The harness never hard-codes the app's markup; it reads selectors and
//! landmarks from an [`AppContract`]. The defaults describe the Orbit app
//! (bottom tab bar of four `.tab-item` entries, segmented controls in Logger
//! and System, seed/reset buttons under System → Settings). Any field can be
//! overridden from the config file.

use serde::{Deserialize, Serialize};

use crate::nav::{NavigationState, ViewMode};
use crate::selector::Selector;

/// A set of selectors of which at least one must be visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Landmark {
    pub any_of: Vec<Selector>,
}

impl Landmark {
    pub fn new(any_of: Vec<Selector>) -> Self {
        Self { any_of }
    }

    pub fn single(selector: Selector) -> Self {
        Self { any_of: vec![selector] }
    }
}

impl std::fmt::Display for Landmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.any_of.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(" | "))
    }
}

/// Landmarks that prove a top-level view rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLandmarks {
    pub horizon: Landmark,
    pub logger: Landmark,
    pub intel: Landmark,
    pub system: Landmark,
}

impl StateLandmarks {
    pub fn get(&self, state: NavigationState) -> &Landmark {
        match state {
            NavigationState::Horizon => &self.horizon,
            NavigationState::Logger => &self.logger,
            NavigationState::Intel => &self.intel,
            NavigationState::System => &self.system,
        }
    }
}

/// How to select a view mode and how to recognise it once rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeControl {
    /// The segmented-control option.
    pub control: Selector,
    pub landmark: Landmark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeControls {
    pub time_tracker: ModeControl,
    pub daily_check_in: ModeControl,
    pub metrics: ModeControl,
    pub settings: ModeControl,
}

impl ModeControls {
    pub fn get(&self, mode: ViewMode) -> &ModeControl {
        match mode {
            ViewMode::TimeTracker => &self.time_tracker,
            ViewMode::DailyCheckIn => &self.daily_check_in,
            ViewMode::Metrics => &self.metrics,
            ViewMode::Settings => &self.settings,
        }
    }
}

/// Content that only appears when the app does (or does not) hold data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLandmarks {
    pub horizon_seeded: Landmark,
    pub horizon_empty: Landmark,
    pub logger_seeded: Landmark,
    pub logger_empty: Landmark,
    pub intel_seeded: Landmark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppContract {
    /// Selector matching every tab in the tab bar.
    pub tab_item: Selector,
    /// Number of tabs the bar must expose.
    pub tab_count: usize,
    pub landmarks: StateLandmarks,
    pub modes: ModeControls,
    pub seed_control: Selector,
    pub reset_control: Selector,
    pub data: DataLandmarks,
}

impl Default for AppContract {
    fn default() -> Self {
        Self {
            tab_item: Selector::css(".tab-item"),
            tab_count: 4,
            landmarks: StateLandmarks {
                horizon: Landmark::new(vec![
                    Selector::text("Daily Briefing"),
                    Selector::text("I am your Horizon Agent"),
                ]),
                logger: Landmark::single(Selector::css_has_text("h1", "Logger")),
                intel: Landmark::single(Selector::text("Intelligence")),
                system: Landmark::single(Selector::css_has_text("h1", "System")),
            },
            modes: ModeControls {
                time_tracker: ModeControl {
                    control: Selector::exact_text("Time Tracker"),
                    landmark: Landmark::single(Selector::text("Activity")),
                },
                daily_check_in: ModeControl {
                    control: Selector::exact_text("Daily Check-In"),
                    landmark: Landmark::new(vec![
                        Selector::text("No Metrics"),
                        Selector::text("Input engine"),
                        Selector::exact_text("Water (oz)"),
                    ]),
                },
                metrics: ModeControl {
                    control: Selector::exact_text("Metrics"),
                    landmark: Landmark::new(vec![
                        Selector::text("No Metrics"),
                        Selector::text("Add New Metric"),
                    ]),
                },
                settings: ModeControl {
                    control: Selector::exact_text("Settings"),
                    landmark: Landmark::new(vec![
                        Selector::text("Storage"),
                        Selector::text("Configuration"),
                    ]),
                },
            },
            seed_control: Selector::button("Seed Data"),
            reset_control: Selector::button("Reset DB"),
            data: DataLandmarks {
                horizon_seeded: Landmark::new(vec![
                    Selector::exact_text("Water (oz)"),
                    Selector::text("Journal"),
                ]),
                horizon_empty: Landmark::single(Selector::text("I am your Horizon Agent")),
                logger_seeded: Landmark::single(Selector::exact_text("Water (oz)")),
                logger_empty: Landmark::single(Selector::text("No Metrics")),
                intel_seeded: Landmark::single(Selector::exact_text("Momentum")),
            },
        }
    }
}

impl AppContract {
    /// Selector for the tab that leads to `state`.
    pub fn tab(&self, state: NavigationState) -> Selector {
        self.tab_item.clone().nth(state.tab_index())
    }

    pub fn landmark(&self, state: NavigationState) -> &Landmark {
        self.landmarks.get(state)
    }

    pub fn mode(&self, mode: ViewMode) -> &ModeControl {
        self.modes.get(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_follow_fixed_order() {
        let app = AppContract::default();
        assert_eq!(app.tab(NavigationState::Horizon), Selector::css(".tab-item").nth(0));
        assert_eq!(app.tab(NavigationState::System), Selector::css(".tab-item").nth(3));
    }

    #[test]
    fn landmark_is_transparent_in_json() {
        let landmark = Landmark::single(Selector::text("Storage"));
        let json = serde_json::to_string(&landmark).unwrap();
        assert_eq!(json, r#"[{"kind":"text","text":"Storage","exact":false}]"#);
    }

    #[test]
    fn landmark_display_joins_alternatives() {
        let app = AppContract::default();
        assert_eq!(
            app.landmark(NavigationState::Horizon).to_string(),
            "text=Daily Briefing | text=I am your Horizon Agent"
        );
    }

    #[test]
    fn contract_overrides_merge_with_defaults() {
        let app: AppContract =
            serde_json::from_str(r#"{"seed_control":{"kind":"text","text":"Seed","exact":true}}"#).unwrap();
        assert_eq!(app.seed_control, Selector::exact_text("Seed"));
        assert_eq!(app.reset_control, Selector::button("Reset DB"));
        assert_eq!(app.tab_count, 4);
    }
}
