//! [`ViewerSession`] over a W3C WebDriver endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::prelude::*;
use tracing::{debug, info};

use crate::browser::{Browser, SessionFactory, ViewerSession};
use crate::error::E2eResult;

/// Poll interval while waiting on elements
const ELEMENT_POLL: Duration = Duration::from_millis(100);

/// Connects to a WebDriver server (chromedriver, geckodriver, a grid hub)
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    server_url: String,
}

impl WebDriverFactory {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn connect(&self, browser: Browser) -> E2eResult<Box<dyn ViewerSession>> {
        info!("Starting {} session at {}", browser, self.server_url);
        let driver = WebDriver::new(self.server_url.as_str(), browser.capabilities()).await?;
        Ok(Box::new(WebDriverSession { driver }))
    }
}

/// A live WebDriver session
pub struct WebDriverSession {
    driver: WebDriver,
}

#[async_trait]
impl ViewerSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        debug!("Navigating to {}", url);
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn execute(&self, script: &str) -> E2eResult<Value> {
        let ret = self.driver.execute(script, Vec::<Value>::new()).await?;
        Ok(ret.json().clone())
    }

    async fn set_window_size(&self, width: u32, height: u32) -> E2eResult<()> {
        self.driver.set_window_rect(0, 0, width, height).await?;
        Ok(())
    }

    async fn screenshot_element(&self, selector: &str, timeout: Duration) -> E2eResult<Vec<u8>> {
        let element = self
            .driver
            .query(By::Css(selector))
            .wait(timeout, ELEMENT_POLL)
            .first()
            .await?;
        element.wait_until().wait(timeout, ELEMENT_POLL).displayed().await?;
        Ok(element.screenshot_as_png().await?)
    }

    async fn quit(self: Box<Self>) -> E2eResult<()> {
        self.driver.quit().await?;
        Ok(())
    }
}
