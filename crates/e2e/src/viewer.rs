//! Interaction with the viewer's render surface

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{scripts, Browser, ViewerSession};
use crate::config::{HarnessConfig, ReadinessConfig};
use crate::error::{E2eError, E2eResult};
use crate::visual::Resolution;

/// Layout and drawing-buffer sizes reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSize {
    pub client_width: u64,
    pub client_height: u64,
    pub width: u64,
    pub height: u64,
}

/// Poll until the render surface exists with nonzero layout and backing-store
/// size. Script errors during a poll count as not ready.
pub async fn wait_until_ready(
    session: &dyn ViewerSession,
    selector: &str,
    readiness: &ReadinessConfig,
) -> E2eResult<()> {
    let script = scripts::surface_ready(selector);

    for attempt in 1..=readiness.max_attempts {
        let ready = match session.execute(&script).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                debug!("Readiness poll failed: {}", e);
                false
            }
        };

        if ready {
            info!("Viewer loaded successfully.");
            return Ok(());
        }

        info!("Viewer not loaded yet. Retrying... ({})", attempt);
        sleep(readiness.interval()).await;
    }

    Err(E2eError::ViewerNotReady {
        attempts: readiness.max_attempts,
    })
}

/// Set the surface's displayed and internal size to `res`.
pub async fn force_resolution(session: &dyn ViewerSession, selector: &str, res: Resolution) -> E2eResult<()> {
    let found = session
        .execute(&scripts::force_surface_size(selector, res.width, res.height))
        .await?;

    if found.as_bool() == Some(false) {
        return Err(E2eError::SurfaceNotFound(selector.to_string()));
    }
    Ok(())
}

/// Current layout and drawing-buffer size of the surface.
pub async fn surface_size(session: &dyn ViewerSession, selector: &str) -> E2eResult<SurfaceSize> {
    let value = session.execute(&scripts::surface_size(selector)).await?;
    if value.is_null() {
        return Err(E2eError::SurfaceNotFound(selector.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Resize the outer window around `res`. Unsupported on some devices, so
/// failures are only logged.
pub async fn try_resize_window(session: &dyn ViewerSession, res: Resolution, margin: u32) {
    if let Err(e) = session
        .set_window_size(res.width + margin, res.height + margin)
        .await
    {
        warn!("Window resizing is not supported on this device: {}", e);
    }
}

/// Navigate to the viewer and log what the browser supports.
pub async fn open_viewer(session: &dyn ViewerSession, config: &HarnessConfig) -> E2eResult<()> {
    session.navigate(&config.page_url).await?;

    if config.browser.needs_script_window_resize() {
        session.execute(&scripts::resize_window_to(1920, 1080)).await?;
    }

    match session.execute(scripts::webgl_enabled()).await {
        Ok(value) => info!("WebGL enabled: {}", value.as_bool().unwrap_or(false)),
        Err(e) => warn!("Could not probe WebGL support: {}", e),
    }

    Ok(())
}

/// `navigator.userAgent`, or an empty string if the page refuses to say.
pub async fn user_agent(session: &dyn ViewerSession) -> String {
    match session.execute(scripts::user_agent()).await {
        Ok(value) => {
            let ua = value.as_str().unwrap_or_default().to_string();
            info!("Detected user agent: {}", ua);
            if let Some(detected) = Browser::from_user_agent(&ua) {
                debug!("Detected browser: {}", detected);
            }
            ua
        }
        Err(e) => {
            warn!("Could not read user agent: {}", e);
            String::new()
        }
    }
}
