//! Command-line entry points for Orbit verification journeys.
//!
//! Each journey is a subcommand. The only options are the app's base URL and
//! the viewport preset; everything else comes from the config file.
//!
//! # Usage
//!
//! ```bash
//! # Seed the app and check Horizon and Intel
//! orbit-verify orbit
//!
//! # Against another dev server, with iPhone 12 emulation
//! orbit-verify --base-url http://localhost:5176 --viewport iphone12 seed-tour
//!
//! # Show every journey
//! orbit-verify list
//! ```
//!
//! # Exit codes
//!
//! - `0` every step passed
//! - `1` at least one assertion failed
//! - `2` the run crashed (hard failure) or the browser could not start

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use orbit_verify_core::config::{HarnessConfig, ViewportPreset};
use orbit_verify_core::evidence::EvidenceStore;
use orbit_verify_core::journey::Journey;
use orbit_verify_core::runner::RunResult;
use orbit_verify_core::session::run_journey;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scripted verification journeys for the Orbit app.
#[derive(Parser)]
#[command(name = "orbit-verify")]
#[command(about = "Drive the Orbit app through a verification journey and capture evidence")]
#[command(version)]
struct Cli {
    /// Base URL of the app under test
    #[arg(short = 'u', long, global = true, env = "ORBIT_BASE_URL")]
    base_url: Option<String>,

    /// Viewport preset: mobile, iphone12, iphone14 or desktop
    #[arg(short = 'p', long, global = true, env = "ORBIT_VIEWPORT")]
    viewport: Option<ViewportPreset>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Empty Horizon shows the agent and opens the setup wizard
    HorizonWizard,
    /// Reset, seed, then tour Horizon (incl. edit mode) and Logger
    SeedTour,
    /// Seed, then check Horizon widgets and Intel momentum
    Orbit,
    /// System metrics view and settings view
    SystemSettings,
    /// Logger time tracker, stopwatch and activity manager
    ActivityManager,
    /// Open the metric builder from System
    MetricBuilder,
    /// Seed, then capture Horizon, Logger and System data buttons
    Fixes,
    /// Reset, then check Horizon and Logger empty states
    ResetCheck,
    /// List available journeys
    List,
}

impl Command {
    fn journey(&self) -> Option<Journey> {
        match self {
            Command::HorizonWizard => Some(Journey::HorizonWizard),
            Command::SeedTour => Some(Journey::SeedTour),
            Command::Orbit => Some(Journey::Orbit),
            Command::SystemSettings => Some(Journey::SystemSettings),
            Command::ActivityManager => Some(Journey::ActivityManager),
            Command::MetricBuilder => Some(Journey::MetricBuilder),
            Command::Fixes => Some(Journey::Fixes),
            Command::ResetCheck => Some(Journey::ResetCheck),
            Command::List => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,orbit_verify_core=info,orbit_verify=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let Some(journey) = cli.command.journey() else {
        print_catalogue();
        return ExitCode::SUCCESS;
    };

    let config = HarnessConfig::load().with_overrides(cli.base_url, cli.viewport);
    let evidence = EvidenceStore::new(config.evidence_dir.clone(), journey.name());
    info!(journey = %journey, base_url = %config.base_url, viewport = %config.viewport, "starting");

    let result = run_journey(config, journey).await;
    print_summary(&result, &evidence);
    ExitCode::from(result.outcome().exit_code())
}

fn print_catalogue() {
    for journey in Journey::ALL {
        println!("{:<18} {}", journey.name(), journey.description());
    }
}

fn print_summary(result: &RunResult, evidence: &EvidenceStore) {
    println!();
    println!("Journey:   {} (run {})", result.journey, result.run_id);
    println!("Outcome:   {}", result.outcome());
    println!(
        "Steps:     {} passed, {} assertion failure(s)",
        result.passed.len(),
        result.failed.len()
    );

    for op in &result.seed_operations {
        println!(
            "Seeding:   {} ({:?}, confirmed: {}, reloaded: {})",
            op.kind, op.phase, op.requires_confirmation, op.triggers_reload
        );
    }

    if !result.failed.is_empty() {
        println!("Failures:");
        for failure in &result.failed {
            println!("  - [{}] {}", failure.step, failure.message);
        }
    }

    if let Some(crash) = &result.crash {
        println!("Crash:     [{}] {}: {}", crash.step, crash.code, crash.message);
    }

    if !result.artifacts.is_empty() {
        println!("Artifacts:");
        for path in &result.artifacts {
            println!("  {}", path.display());
        }
    }

    let report = evidence.report_path();
    if report.exists() {
        println!("Report:    {}", report.display());
    }
}
