//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::Browser;
use crate::error::{E2eError, E2eResult};
use crate::visual::Resolution;

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// WebDriver endpoint (local driver or remote grid hub)
    pub webdriver_url: String,

    /// Page hosting the viewer
    pub page_url: String,

    /// Browser to request from the WebDriver endpoint
    pub browser: Browser,

    /// CSS selector of the render surface
    pub surface_selector: String,

    /// Directory holding reference, screenshot and diff images
    pub references_dir: PathBuf,

    /// Candidate resolutions, most preferred first
    pub resolutions: Vec<Resolution>,

    pub readiness: ReadinessConfig,
    pub timing: TimingConfig,
    pub diff: DiffConfig,
    pub retry: RetryConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            page_url: "http://localhost:8000/gloss_webpage".to_string(),
            browser: Browser::Chrome,
            surface_selector: "canvas".to_string(),
            references_dir: PathBuf::from("tests/web/references"),
            resolutions: vec![Resolution::wide(1400), Resolution::wide(1024), Resolution::wide(512)],
            readiness: ReadinessConfig::default(),
            timing: TimingConfig::default(),
            diff: DiffConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Viewer readiness polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval_ms: 1000,
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Fixed settle delays and element waits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after the viewer reports ready, before any resize
    pub load_settle_ms: u64,

    /// Wait after forcing a canvas resolution, before capture
    pub resize_settle_ms: u64,

    /// Upper bound for the render surface to be present and visible
    pub element_timeout_ms: u64,

    /// Extra room around the canvas when resizing the outer window
    pub window_margin: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            load_settle_ms: 15_000,
            resize_settle_ms: 10_000,
            element_timeout_ms: 10_000,
            window_margin: 400,
        }
    }
}

impl TimingConfig {
    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_ms)
    }

    pub fn resize_settle(&self) -> Duration {
        Duration::from_millis(self.resize_settle_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

/// Pixel comparison limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Per-pixel color threshold (0.0 - 1.0)
    pub threshold: f64,

    /// Largest number of differing pixels that still passes
    pub max_diff_pixels: u64,

    /// Count antialiased pixels as differences
    pub include_aa: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            max_diff_pixels: 5000,
            include_aa: false,
        }
    }
}

/// Restart policy for the remote grid's queue-exceeded rejection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub cooldown_ms: u64,

    /// Text identifying the transient failure
    pub marker: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            cooldown_ms: 120_000,
            marker: "BROWSERSTACK_QUEUE_SIZE_EXCEEDED".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl HarnessConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.resolutions.is_empty() {
            return Err(E2eError::InvalidConfig("at least one resolution is required".into()));
        }
        if !(0.0..=1.0).contains(&self.diff.threshold) {
            return Err(E2eError::InvalidConfig(format!(
                "diff threshold {} is outside 0.0..=1.0",
                self.diff.threshold
            )));
        }
        if self.readiness.max_attempts == 0 || self.retry.max_attempts == 0 {
            return Err(E2eError::InvalidConfig("attempt counts must be greater than zero".into()));
        }
        Ok(())
    }
}
