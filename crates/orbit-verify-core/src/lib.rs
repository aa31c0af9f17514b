//! # orbit-verify-core
//!
//! Core library for scripted verification runs against the Orbit single-page
//! app.
//!
//! A run drives a real browser through a *journey*: navigate between the
//! app's tabs, seed or reset its data, check what rendered, and capture
//! screenshots as evidence for a human reviewer.
//!
//! ## Modules
//!
//! - [`driver`] - The [`BrowserDriver`](driver::BrowserDriver) trait the rest of the crate is written against
//! - [`cdp_driver`] - Chromium backend over the DevTools protocol
//! - [`selector`] - Engine-neutral element selectors
//! - [`wait`] - Bounded polling waits
//! - [`app`] - Selectors and landmarks of the application under test
//! - [`nav`] - Tab/mode navigation state machine verified by landmarks
//! - [`dialog`] - Native dialog interception
//! - [`seed`] - Single-flight seed/reset handshake
//! - [`step`] - Verification steps, actions and assertions
//! - [`runner`] - Step runner and run results
//! - [`evidence`] - Screenshots, failure captures and run reports
//! - [`session`] - The [`Harness`](session::Harness) and the scoped [`run_journey`](session::run_journey) entry point
//! - [`journey`] - Built-in journeys
//! - [`config`] - Configuration file and viewport presets
//! - [`error`] - Error taxonomy
//!
//! ## External Dependencies
//!
//! A Chromium or Chrome binary must be discoverable by `chromiumoxide`, and
//! the app must be served at the configured base URL.
//!
//! ## Example
//!
//! ```no_run
//! use orbit_verify_core::config::HarnessConfig;
//! use orbit_verify_core::journey::Journey;
//! use orbit_verify_core::session::run_journey;
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = run_journey(HarnessConfig::load(), Journey::SystemSettings).await;
//!     for path in &result.artifacts {
//!         println!("{}", path.display());
//!     }
//!     std::process::exit(result.outcome().exit_code() as i32);
//! }
//! ```

pub mod app;
pub mod cdp_driver;
pub mod config;
pub mod dialog;
pub mod driver;
pub mod error;
pub mod evidence;
pub mod journey;
pub mod nav;
pub mod runner;
pub mod seed;
pub mod selector;
pub mod session;
pub mod step;
pub mod wait;
