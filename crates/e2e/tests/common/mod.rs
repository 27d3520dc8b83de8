//! Scripted in-memory browser used by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use serde_json::{json, Value};

use gloss_e2e::config::{ReadinessConfig, RetryConfig, TimingConfig};
use gloss_e2e::visual::encode_png;
use gloss_e2e::{Browser, E2eError, E2eResult, HarnessConfig, Resolution, SessionFactory, ViewerSession};

pub const MARKER: &str = "BROWSERSTACK_QUEUE_SIZE_EXCEEDED";

pub const DESKTOP_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const IPHONE_UA: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile Safari/604.1";

pub const FILL: [u8; 4] = [30, 60, 90, 255];

/// Everything the fake browser does and has been asked to do
pub struct MockState {
    pub user_agent: String,

    /// Not-ready polls before the surface reports ready; `None` never gets ready
    pub ready_after: Option<u32>,
    /// Leading polls that fail with a script error
    pub poll_errors: u32,
    pub readiness_polls: u32,

    /// Canvas resolutions forced by the harness, in order
    pub forced: Vec<Resolution>,
    pub window_sizes: Vec<(u32, u32)>,
    pub fail_window_resize: bool,

    /// Captured image size per forced resolution, when it differs
    pub capture_overrides: HashMap<Resolution, (u32, u32)>,
    /// Reported client size per forced resolution, when it differs
    pub client_overrides: HashMap<Resolution, (u64, u64)>,
    pub fill: [u8; 4],
    pub screenshots: u32,

    pub navigations: Vec<String>,
    pub navigate_failure: Option<String>,

    pub connects: u32,
    pub connect_failures: VecDeque<String>,
    pub quits: u32,
    pub fail_quit: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            user_agent: DESKTOP_UA.to_string(),
            ready_after: Some(0),
            poll_errors: 0,
            readiness_polls: 0,
            forced: Vec::new(),
            window_sizes: Vec::new(),
            fail_window_resize: false,
            capture_overrides: HashMap::new(),
            client_overrides: HashMap::new(),
            fill: FILL,
            screenshots: 0,
            navigations: Vec::new(),
            navigate_failure: None,
            connects: 0,
            connect_failures: VecDeque::new(),
            quits: 0,
            fail_quit: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockBrowser {
    pub state: Arc<Mutex<MockState>>,
}

impl MockBrowser {
    pub fn new(configure: impl FnOnce(&mut MockState)) -> Self {
        let browser = Self::default();
        configure(&mut browser.state.lock());
        browser
    }

    pub fn forced(&self) -> Vec<Resolution> {
        self.state.lock().forced.clone()
    }

    pub fn quits(&self) -> u32 {
        self.state.lock().quits
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().connects
    }
}

#[async_trait]
impl SessionFactory for MockBrowser {
    async fn connect(&self, _browser: Browser) -> E2eResult<Box<dyn ViewerSession>> {
        let mut state = self.state.lock();
        state.connects += 1;
        if let Some(reason) = state.connect_failures.pop_front() {
            return Err(E2eError::Script(reason));
        }
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    fn last_forced(state: &MockState) -> E2eResult<Resolution> {
        state
            .forced
            .last()
            .copied()
            .ok_or_else(|| E2eError::Script("canvas was never resized".into()))
    }
}

#[async_trait]
impl ViewerSession for MockSession {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.navigations.push(url.to_string());
        match &state.navigate_failure {
            Some(reason) => Err(E2eError::Script(reason.clone())),
            None => Ok(()),
        }
    }

    async fn execute(&self, script: &str) -> E2eResult<Value> {
        let mut state = self.state.lock();

        if script.contains("navigator.userAgent") {
            return Ok(json!(state.user_agent));
        }
        if script.contains("window.screen.width") {
            return Ok(json!(1920));
        }
        if script.contains("webgl") {
            return Ok(json!(true));
        }
        if script.contains("window.resizeTo") {
            return Ok(Value::Null);
        }
        if script.contains("canvas.clientHeight > 0") {
            state.readiness_polls += 1;
            let poll = state.readiness_polls;
            if poll <= state.poll_errors {
                return Err(E2eError::Script("javascript error: viewer not initialised".into()));
            }
            let ready = state.ready_after.map_or(false, |n| poll > state.poll_errors + n);
            return Ok(json!(ready));
        }
        if script.contains("canvas.style.width") {
            let res = parse_forced(script)?;
            state.forced.push(res);
            return Ok(json!(true));
        }
        if script.contains("clientWidth: canvas.clientWidth") {
            let Some(res) = state.forced.last().copied() else {
                return Ok(json!({ "clientWidth": 800, "clientHeight": 600, "width": 800, "height": 600 }));
            };
            let (cw, ch) = state
                .client_overrides
                .get(&res)
                .copied()
                .unwrap_or((res.width as u64, res.height as u64));
            return Ok(json!({ "clientWidth": cw, "clientHeight": ch, "width": res.width, "height": res.height }));
        }

        Err(E2eError::Script(format!("unexpected script: {}", script.trim())))
    }

    async fn set_window_size(&self, width: u32, height: u32) -> E2eResult<()> {
        let mut state = self.state.lock();
        if state.fail_window_resize {
            return Err(E2eError::Script("unsupported operation: set window rect".into()));
        }
        state.window_sizes.push((width, height));
        Ok(())
    }

    async fn screenshot_element(&self, selector: &str, _timeout: Duration) -> E2eResult<Vec<u8>> {
        assert_eq!(selector, "canvas");
        let mut state = self.state.lock();
        state.screenshots += 1;
        let res = Self::last_forced(&state)?;
        let (w, h) = state
            .capture_overrides
            .get(&res)
            .copied()
            .unwrap_or((res.width, res.height));
        encode_png(&RgbaImage::from_pixel(w, h, Rgba(state.fill)))
    }

    async fn quit(self: Box<Self>) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.quits += 1;
        if state.fail_quit {
            return Err(E2eError::Script("session already closed".into()));
        }
        Ok(())
    }
}

/// Pull `canvas.width = W;` and `canvas.height = H;` back out of the resize script.
fn parse_forced(script: &str) -> E2eResult<Resolution> {
    let value = |key: &str| -> Option<u32> {
        let start = script.find(key)? + key.len();
        let rest = &script[start..];
        let end = rest.find(';')?;
        rest[..end].trim().parse().ok()
    };
    match (value("canvas.width = "), value("canvas.height = ")) {
        (Some(w), Some(h)) => Ok(Resolution::new(w, h)),
        _ => Err(E2eError::Script("could not parse resize script".into())),
    }
}

/// Config with every wait shortened to zero, pointed at `references_dir`.
pub fn fast_config(references_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        references_dir: references_dir.to_path_buf(),
        readiness: ReadinessConfig {
            interval_ms: 0,
            ..Default::default()
        },
        timing: TimingConfig {
            load_settle_ms: 0,
            resize_settle_ms: 0,
            element_timeout_ms: 0,
            ..Default::default()
        },
        retry: RetryConfig {
            cooldown_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Write a solid-color reference for `res` with the given pixel size.
pub fn write_reference(dir: &Path, res: Resolution, size: (u32, u32), fill: [u8; 4]) {
    let img = RgbaImage::from_pixel(size.0, size.1, Rgba(fill));
    img.save(dir.join(format!("reference_{}.png", res))).unwrap();
}
