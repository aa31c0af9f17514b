//! Screenshots, failure captures and run reports.
//!
//! Files land in the evidence directory named after the journey:
//!
//! | file                     | written when                         |
//! |--------------------------|--------------------------------------|
//! | `<journey>_<target>.png` | a step asks for a screenshot         |
//! | `<journey>_error.png`    | a hard failure aborts the run        |
//! | `<journey>_error.html`   | same, DOM dump next to the screenshot|
//! | `<journey>_report.json`  | always, at the end of the run        |
//!
//! Failure capture is best-effort: it never raises, so the original error
//! is what the caller reports.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::driver::{BrowserDriver, DriverError};
use crate::error::HarnessError;
use crate::runner::RunResult;

/// Upper bound on a single capture, so a wedged page cannot hang teardown.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes evidence for one journey.
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    dir: PathBuf,
    journey: String,
}

impl EvidenceStore {
    pub fn new(dir: impl Into<PathBuf>, journey: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            journey: journey.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn journey(&self) -> &str {
        &self.journey
    }

    /// Path for a named screenshot target.
    pub fn screenshot_path(&self, target: &str) -> PathBuf {
        self.file(target, "png")
    }

    pub fn report_path(&self) -> PathBuf {
        self.file("report", "json")
    }

    fn file(&self, target: &str, ext: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", sanitize(&self.journey), sanitize(target), ext))
    }

    async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Capture the viewport into `<journey>_<target>.png`.
    pub async fn save_screenshot(
        &self,
        driver: &dyn BrowserDriver,
        target: &str,
    ) -> Result<PathBuf, HarnessError> {
        let bytes = tokio::time::timeout(CAPTURE_TIMEOUT, driver.screenshot())
            .await
            .map_err(|_| DriverError::Timeout)??;
        self.ensure_dir().await.map_err(DriverError::from)?;
        let path = self.screenshot_path(target);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(DriverError::from)?;
        debug!(path = %path.display(), "screenshot saved");
        Ok(path)
    }

    /// Best-effort failure capture: a screenshot plus a DOM dump.
    ///
    /// Returns the screenshot path if one was written. Never fails.
    pub async fn capture_failure(&self, driver: &dyn BrowserDriver, label: &str) -> Option<PathBuf> {
        let shot = match self.save_screenshot(driver, label).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "failure screenshot could not be captured");
                None
            }
        };

        match tokio::time::timeout(CAPTURE_TIMEOUT, driver.content()).await {
            Ok(Ok(html)) => {
                let path = self.file(label, "html");
                let written = match self.ensure_dir().await {
                    Ok(()) => tokio::fs::write(&path, html).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    warn!(path = %path.display(), error = %e, "failure DOM dump could not be written");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "failure DOM dump could not be read"),
            Err(_) => warn!("failure DOM dump timed out"),
        }

        shot
    }

    /// Write the run report as pretty JSON.
    pub async fn write_report(&self, result: &RunResult) -> std::io::Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.report_path();
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Keeps file names portable: anything but `[A-Za-z0-9-]` becomes `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
