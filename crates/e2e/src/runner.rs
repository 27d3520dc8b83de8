//! Session orchestration: resolution fallback, retry on grid saturation and
//! reference capture

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{is_mobile_user_agent, scripts, SessionFactory, ViewerSession};
use crate::config::HarnessConfig;
use crate::diff::DiffOptions;
use crate::error::{E2eError, E2eResult};
use crate::viewer;
use crate::visual::{closest_resolution, ComparisonResult, ReferenceMatch, ReferenceStore, Resolution};

/// Window size used while capturing references
const REFERENCE_WINDOW: (u32, u32) = (1800, 1000);

/// Outcome of [`run_with_retry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A comparison ran and passed
    Completed(ComparisonResult),

    /// Every attempt was rejected by the grid. Not an `Err`, but the
    /// `gloss-e2e` binary still exits non-zero (code 2) on it.
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Summary written with `--report`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub passed: bool,
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn from_run(result: &E2eResult<RunOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                passed: matches!(outcome, RunOutcome::Completed(_)),
                outcome: Some(outcome.clone()),
                error: None,
            },
            Err(e) => Self {
                passed: false,
                outcome: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Write the report as pretty JSON
    pub fn write(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Results written to: {}", path.display());
        Ok(())
    }
}

/// Try each candidate in order until one captures at the reference's
/// dimensions, then compare exactly once.
///
/// The returned result may be a failing comparison; no later candidate is
/// tried after a comparison has run.
pub async fn select_and_compare(
    session: &dyn ViewerSession,
    config: &HarnessConfig,
    store: &ReferenceStore,
    resize_window: bool,
) -> E2eResult<ComparisonResult> {
    let selector = config.surface_selector.as_str();
    let options = DiffOptions {
        threshold: config.diff.threshold,
        include_aa: config.diff.include_aa,
    };
    let mut tried = Vec::with_capacity(config.resolutions.len());

    for &res in &config.resolutions {
        info!("Attempting to use resolution: {}", res);
        tried.push(res);

        if resize_window {
            viewer::try_resize_window(session, res, config.timing.window_margin).await;
        }

        viewer::force_resolution(session, selector, res).await?;
        sleep(config.timing.resize_settle()).await;

        let png = session
            .screenshot_element(selector, config.timing.element_timeout())
            .await?;
        store.save_screenshot(res, &png)?;

        match store.match_reference(res, &png)? {
            ReferenceMatch::Matched { captured, reference } => {
                return store.compare(res, &captured, &reference, options, config.diff.max_diff_pixels);
            }
            ReferenceMatch::DimensionMismatch { captured, reference } => {
                info!(
                    "Screenshot dimensions {}x{} do not match the reference dimensions {}x{} for resolution: {}",
                    captured.0, captured.1, reference.0, reference.1, res
                );
            }
            ReferenceMatch::Missing(path) => {
                info!("Skipping resolution {}: no reference at {}", res, path.display());
            }
        }
    }

    Err(E2eError::ResolutionExhausted { tried })
}

/// Full comparison inside an already open session.
pub async fn compare_in_session(
    session: &dyn ViewerSession,
    config: &HarnessConfig,
    store: &ReferenceStore,
) -> E2eResult<ComparisonResult> {
    let user_agent = viewer::user_agent(session).await;

    viewer::open_viewer(session, config).await?;
    viewer::wait_until_ready(session, &config.surface_selector, &config.readiness).await?;
    sleep(config.timing.load_settle()).await;

    match session.execute(scripts::screen_width()).await {
        Ok(value) => {
            if let Some(width) = value.as_u64() {
                info!("Device screen width: {}px", width);
                let width = u32::try_from(width).unwrap_or(u32::MAX);
                if let Some(closest) = closest_resolution(&config.resolutions, width) {
                    debug!("Closest candidate to screen width: {}", closest);
                }
            }
        }
        Err(e) => debug!("Could not read screen width: {}", e),
    }

    if let Some(first) = config.resolutions.first() {
        info!("Starting resolution for comparison: {}", first);
    }

    let resize_window = !is_mobile_user_agent(&user_agent);
    select_and_compare(session, config, store, resize_window).await
}

/// End a session; a failure here is logged and never replaces the run result.
pub async fn teardown(session: Box<dyn ViewerSession>) {
    if let Err(e) = session.quit().await {
        warn!("Failed to quit driver session: {}", e);
    }
}

/// One complete run: open a session, compare, always tear down.
///
/// A comparison over the pixel limit is returned as
/// [`E2eError::ThresholdExceeded`].
pub async fn run_once(factory: &dyn SessionFactory, config: &HarnessConfig) -> E2eResult<ComparisonResult> {
    let store = ReferenceStore::open(&config.references_dir)?;
    let session = factory.connect(config.browser).await?;

    let result = compare_in_session(session.as_ref(), config, &store).await;
    teardown(session).await;

    let result = result?.into_result()?;
    info!(
        "[TEST PASSED]: Pixel difference ({}) is within the acceptable threshold ({}) at {}",
        result.diff_pixels, result.max_diff_pixels, result.resolution
    );
    Ok(result)
}

/// Run [`run_once`], restarting from scratch after a cooldown whenever the
/// failure carries the grid's queue-exceeded marker.
pub async fn run_with_retry(factory: &dyn SessionFactory, config: &HarnessConfig) -> E2eResult<RunOutcome> {
    let retry = &config.retry;
    let mut last_error = String::new();

    for attempt in 1..=retry.max_attempts {
        match run_once(factory, config).await {
            Ok(result) => return Ok(RunOutcome::Completed(result)),
            Err(e) if e.is_transient(&retry.marker) => {
                warn!(
                    "Queue size exceeded. Retrying ({}/{})...",
                    attempt, retry.max_attempts
                );
                last_error = e.to_string();
                if attempt < retry.max_attempts {
                    sleep(retry.cooldown()).await;
                }
            }
            Err(e) => {
                error!("An error occurred during the screenshot comparison process: {}", e);
                return Err(e);
            }
        }
    }

    error!("Test failed after maximum retries due to queue size exceeded.");
    Ok(RunOutcome::RetriesExhausted {
        attempts: retry.max_attempts,
        last_error,
    })
}

/// Capture fresh reference images, one session per resolution, smallest first.
///
/// A failing resolution is logged and the rest still run. Returns the written
/// reference paths.
pub async fn capture_references(factory: &dyn SessionFactory, config: &HarnessConfig) -> E2eResult<Vec<PathBuf>> {
    let store = ReferenceStore::open(&config.references_dir)?;

    let mut resolutions = config.resolutions.clone();
    resolutions.sort_by_key(|r| r.width);

    let mut written = Vec::new();
    for res in resolutions {
        info!("Processing resolution: {}", res);

        let session = match factory.connect(config.browser).await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not start session for {}: {}", res, e);
                continue;
            }
        };

        let result = capture_reference_at(session.as_ref(), config, &store, res).await;
        teardown(session).await;

        match result {
            Ok(path) => written.push(path),
            Err(e) => error!("Reference capture failed for {}: {}", res, e),
        }
    }

    Ok(written)
}

async fn capture_reference_at(
    session: &dyn ViewerSession,
    config: &HarnessConfig,
    store: &ReferenceStore,
    res: Resolution,
) -> E2eResult<PathBuf> {
    let selector = config.surface_selector.as_str();

    session.set_window_size(REFERENCE_WINDOW.0, REFERENCE_WINDOW.1).await?;
    session.navigate(&config.page_url).await?;
    viewer::wait_until_ready(session, selector, &config.readiness).await?;

    let initial = viewer::surface_size(session, selector).await?;
    info!("Initial canvas size: {}x{}", initial.client_width, initial.client_height);

    viewer::force_resolution(session, selector, res).await?;
    sleep(config.timing.resize_settle()).await;

    let size = viewer::surface_size(session, selector).await?;
    info!("Actual canvas size (style): {}x{}", size.client_width, size.client_height);
    info!("Actual canvas drawing size: {}x{}", size.width, size.height);

    if size.client_width != res.width as u64 || size.client_height != res.height as u64 {
        return Err(E2eError::CanvasSizeMismatch {
            expected: res,
            actual_width: size.client_width,
            actual_height: size.client_height,
        });
    }

    let png = session
        .screenshot_element(selector, config.timing.element_timeout())
        .await?;
    store.save_reference(res, &png)
}
