//! Harness configuration.
//!
//! Settings are read from `~/.orbit-verify/config.json` (or the file named by
//! `ORBIT_VERIFY_CONFIG`). Every field has a default, so a missing or partial
//! file is fine; command-line flags are applied on top with
//! [`HarnessConfig::with_overrides`].
//!
//! # Example
//!
//! ```no_run
//! use orbit_verify_core::config::{HarnessConfig, ViewportPreset};
//!
//! let config = HarnessConfig::load()
//!     .with_overrides(Some("http://localhost:5176".to_string()), Some(ViewportPreset::Iphone12));
//! println!("{} @ {}", config.base_url, config.viewport);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::AppContract;

const CONFIG_FILENAME: &str = "config.json";

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "ORBIT_VERIFY_CONFIG";

/// Returns the harness home directory (`~/.orbit-verify`).
pub fn harness_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".orbit-verify")
}

/// Complete configuration for one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Where the application under test is served.
    pub base_url: String,
    /// Directory receiving screenshots and run reports.
    pub evidence_dir: PathBuf,
    /// Viewport / device emulation preset.
    pub viewport: ViewportPreset,
    /// Launch the browser without a window.
    pub headless: bool,
    pub timeouts: Timeouts,
    /// Selectors and landmarks of the application under test.
    pub app: AppContract,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            evidence_dir: PathBuf::from("verification"),
            viewport: ViewportPreset::Mobile,
            headless: true,
            timeouts: Timeouts::default(),
            app: AppContract::default(),
        }
    }
}

impl HarnessConfig {
    /// Path of the config file that [`load`](Self::load) reads.
    pub fn path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => harness_dir().join(CONFIG_FILENAME),
        }
    }

    /// Load config from disk.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        let path = Self::path();
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, base_url: Option<String>, viewport: Option<ViewportPreset>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        if let Some(preset) = viewport {
            self.viewport = preset;
        }
        self
    }
}

/// Bounds for every wait the harness performs, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// A tab or mode control must become interactable within this.
    pub navigation_ms: u64,
    /// A landmark must render after a transition within this.
    pub landmark_ms: u64,
    /// An unresolved native dialog fails the run after this.
    pub dialog_ms: u64,
    /// How long to wait for an optional confirmation after a trigger.
    pub dialog_grace_ms: u64,
    /// Coarse wait for reload after seeding or resetting.
    pub reload_ms: u64,
    /// Extra settle delay after a reload, for hydration.
    pub settle_ms: u64,
    /// Default bound for step wait conditions.
    pub wait_ms: u64,
    /// How long an assertion may take to become true.
    pub assertion_ms: u64,
    /// How long to look for optional UI before skipping it.
    pub optional_ms: u64,
    /// Polling interval for every wait loop.
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 5000,
            landmark_ms: 5000,
            dialog_ms: 5000,
            dialog_grace_ms: 1000,
            reload_ms: 20_000,
            settle_ms: 1500,
            wait_ms: 5000,
            assertion_ms: 2000,
            optional_ms: 1000,
            poll_ms: 100,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn landmark(&self) -> Duration {
        Duration::from_millis(self.landmark_ms)
    }

    pub fn dialog(&self) -> Duration {
        Duration::from_millis(self.dialog_ms)
    }

    pub fn dialog_grace(&self) -> Duration {
        Duration::from_millis(self.dialog_grace_ms)
    }

    pub fn reload(&self) -> Duration {
        Duration::from_millis(self.reload_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn assertion(&self) -> Duration {
        Duration::from_millis(self.assertion_ms)
    }

    pub fn optional(&self) -> Duration {
        Duration::from_millis(self.optional_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

/// Named viewport presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportPreset {
    /// 375×812 at 2x, the default phone-sized layout.
    Mobile,
    /// iPhone 12 Pro device emulation (390×844 at 3x, touch).
    Iphone12,
    /// 390×844 at 2x.
    Iphone14,
    /// 1280×720 desktop window.
    Desktop,
}

impl ViewportPreset {
    pub const ALL: [ViewportPreset; 4] = [
        ViewportPreset::Mobile,
        ViewportPreset::Iphone12,
        ViewportPreset::Iphone14,
        ViewportPreset::Desktop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ViewportPreset::Mobile => "mobile",
            ViewportPreset::Iphone12 => "iphone12",
            ViewportPreset::Iphone14 => "iphone14",
            ViewportPreset::Desktop => "desktop",
        }
    }

    /// Concrete viewport parameters for this preset.
    pub fn viewport(self) -> Viewport {
        match self {
            ViewportPreset::Mobile => Viewport { width: 375, height: 812, scale: 2.0, mobile: false, touch: false },
            ViewportPreset::Iphone12 => Viewport { width: 390, height: 844, scale: 3.0, mobile: true, touch: true },
            ViewportPreset::Iphone14 => Viewport { width: 390, height: 844, scale: 2.0, mobile: false, touch: false },
            ViewportPreset::Desktop => Viewport { width: 1280, height: 720, scale: 1.0, mobile: false, touch: false },
        }
    }
}

impl fmt::Display for ViewportPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewportPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        ViewportPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = ViewportPreset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown viewport preset '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Viewport size and device emulation flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Device scale factor.
    pub scale: f64,
    pub mobile: bool,
    pub touch: bool,
}
