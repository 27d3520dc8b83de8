//! Browser automation seam
//!
//! The comparison procedure only talks to [`ViewerSession`]; the production
//! implementation lives in [`crate::webdriver`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{E2eError, E2eResult};

/// Browser requested from the WebDriver endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
    Edge,
    Safari,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
            Browser::Safari => "safari",
        }
    }

    /// W3C `browserName` capability value
    pub fn browser_name(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Edge => "MicrosoftEdge",
            Browser::Safari => "safari",
        }
    }

    /// Best guess from a `navigator.userAgent` string.
    ///
    /// Edge also advertises `Chrome` and Chrome advertises `Safari`, so the
    /// more specific tokens are checked first.
    pub fn from_user_agent(user_agent: &str) -> Option<Self> {
        if user_agent.contains("Edg") {
            Some(Browser::Edge)
        } else if user_agent.contains("Firefox") {
            Some(Browser::Firefox)
        } else if user_agent.contains("Chrome") {
            Some(Browser::Chrome)
        } else if user_agent.contains("Safari") {
            Some(Browser::Safari)
        } else {
            None
        }
    }

    /// WebDriver capabilities for a pixel-stable 1920x1080 session.
    pub fn capabilities(&self) -> Map<String, Value> {
        let chromium_args = json!([
            "force-device-scale-factor=1",
            "high-dpi-support=1",
            "window-size=1920,1080",
        ]);

        let caps = match self {
            Browser::Chrome => json!({
                "browserName": self.browser_name(),
                "goog:chromeOptions": { "args": chromium_args },
            }),
            Browser::Edge => json!({
                "browserName": self.browser_name(),
                "ms:edgeOptions": { "args": chromium_args },
            }),
            Browser::Firefox => json!({
                "browserName": self.browser_name(),
                "moz:firefoxOptions": {
                    "args": ["--width=1920", "--height=1080", "--safe-mode"],
                    "prefs": { "browser.tabs.remote.autostart": false },
                },
            }),
            Browser::Safari => json!({ "browserName": self.browser_name() }),
        };

        match caps {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Safari ignores the window-size launch argument, so the window is
    /// resized from script after navigation instead.
    pub fn needs_script_window_resize(&self) -> bool {
        matches!(self, Browser::Safari)
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Browser::Chrome),
            "firefox" => Ok(Browser::Firefox),
            "edge" | "msedge" | "microsoftedge" => Ok(Browser::Edge),
            "safari" => Ok(Browser::Safari),
            other => Err(E2eError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

/// Whether the user agent belongs to a device without a resizable window.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    ua.contains("iphone") || ua.contains("ipad")
}

/// One live browser session pointed at the viewer page
#[async_trait]
pub trait ViewerSession: Send + Sync {
    /// Load `url` in the current window.
    async fn navigate(&self, url: &str) -> E2eResult<()>;

    /// Run `script` as a function body and return its JSON result.
    async fn execute(&self, script: &str) -> E2eResult<Value>;

    /// Resize the outer browser window.
    async fn set_window_size(&self, width: u32, height: u32) -> E2eResult<()>;

    /// Wait for the element matching `selector` to be present and visible,
    /// then capture a PNG of just that element.
    async fn screenshot_element(&self, selector: &str, timeout: Duration) -> E2eResult<Vec<u8>>;

    /// End the session.
    async fn quit(self: Box<Self>) -> E2eResult<()>;
}

/// Opens new sessions for a browser
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self, browser: Browser) -> E2eResult<Box<dyn ViewerSession>>;
}

/// Page scripts run against the render surface
pub mod scripts {
    /// Embed `selector` as a JS string literal.
    fn quoted(selector: &str) -> String {
        serde_json::Value::String(selector.to_string()).to_string()
    }

    pub fn user_agent() -> &'static str {
        "return navigator.userAgent;"
    }

    pub fn screen_width() -> &'static str {
        "return window.screen.width;"
    }

    pub fn webgl_enabled() -> &'static str {
        r#"
            const canvas = document.createElement('canvas');
            const gl = canvas.getContext('webgl') || canvas.getContext('experimental-webgl');
            return !!gl;
        "#
    }

    pub fn resize_window_to(width: u32, height: u32) -> String {
        format!("window.resizeTo({}, {});", width, height)
    }

    pub fn surface_ready(selector: &str) -> String {
        format!(
            r#"
            const canvas = document.querySelector({sel});
            return !!canvas && canvas.clientHeight > 0 && canvas.clientWidth > 0
                && canvas.width > 0 && canvas.height > 0;
            "#,
            sel = quoted(selector)
        )
    }

    /// Sets both the layout size and the drawing-buffer size; they are
    /// independent properties of a canvas.
    pub fn force_surface_size(selector: &str, width: u32, height: u32) -> String {
        format!(
            r#"
            const canvas = document.querySelector({sel});
            if (!canvas) {{
                return false;
            }}
            canvas.style.width = '{w}px';
            canvas.style.height = '{h}px';
            canvas.width = {w};
            canvas.height = {h};
            return true;
            "#,
            sel = quoted(selector),
            w = width,
            h = height
        )
    }

    pub fn surface_size(selector: &str) -> String {
        format!(
            r#"
            const canvas = document.querySelector({sel});
            return canvas ? {{
                clientWidth: canvas.clientWidth,
                clientHeight: canvas.clientHeight,
                width: canvas.width,
                height: canvas.height
            }} : null;
            "#,
            sel = quoted(selector)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_detection() {
        let chrome = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        let edge = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 Chrome/120.0 Safari/537.36 Edg/120.0";
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        let safari = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile Safari/604.1";

        assert_eq!(Browser::from_user_agent(chrome), Some(Browser::Chrome));
        assert_eq!(Browser::from_user_agent(edge), Some(Browser::Edge));
        assert_eq!(Browser::from_user_agent(firefox), Some(Browser::Firefox));
        assert_eq!(Browser::from_user_agent(safari), Some(Browser::Safari));
        assert_eq!(Browser::from_user_agent("curl/8.0"), None);

        assert!(is_mobile_user_agent(safari));
        assert!(!is_mobile_user_agent(chrome));
    }

    #[test]
    fn test_chrome_capabilities() {
        let caps = Browser::Chrome.capabilities();
        assert_eq!(caps["browserName"], "chrome");
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "force-device-scale-factor=1"));
        assert!(args.iter().any(|a| a == "window-size=1920,1080"));
    }

    #[test]
    fn test_firefox_capabilities() {
        let caps = Browser::Firefox.capabilities();
        let opts = &caps["moz:firefoxOptions"];
        assert!(opts["args"].as_array().unwrap().iter().any(|a| a == "--safe-mode"));
        assert_eq!(opts["prefs"]["browser.tabs.remote.autostart"], false);
    }

    #[test]
    fn test_edge_and_safari_capabilities() {
        assert_eq!(Browser::Edge.capabilities()["browserName"], "MicrosoftEdge");
        assert!(Browser::Edge.capabilities().contains_key("ms:edgeOptions"));

        let safari = Browser::Safari.capabilities();
        assert_eq!(safari.len(), 1);
        assert!(Browser::Safari.needs_script_window_resize());
        assert!(!Browser::Chrome.needs_script_window_resize());
    }

    #[test]
    fn test_browser_parse() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("msedge".parse::<Browser>().unwrap(), Browser::Edge);
        assert!("lynx".parse::<Browser>().is_err());
    }

    #[test]
    fn test_scripts_quote_selector() {
        let script = scripts::force_surface_size("#viewer canvas", 1024, 512);
        assert!(script.contains(r##"document.querySelector("#viewer canvas")"##));
        assert!(script.contains("canvas.style.width = '1024px'"));
        assert!(script.contains("canvas.height = 512;"));
    }
}
