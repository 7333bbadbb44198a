//! Page driver abstraction over a live browser page.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Page operation errors.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("CDP error: {0}")]
    Cdp(String),
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Page already closed")]
    Closed,
}

/// Operations the executor performs against the current page.
///
/// The production implementation drives a CDP page; tests substitute a
/// scripted fake so the loop can run without a browser.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Click the first element matching a CSS selector.
    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Focus the element matching the selector and type text into it.
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// Visible text of the current page body.
    async fn visible_text(&mut self) -> Result<String, DriverError>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Close the page. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Production driver backed by a chromiumoxide page.
///
/// Primary-mode pages also own the CDP connection to the user's browser
/// (and its event handler task), so dropping the driver tears the whole
/// attachment down without touching the user's browser process.
pub struct CdpPage {
    page: Option<Page>,
    attached_browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
}

impl CdpPage {
    /// Wrap a page that lives on the process-wide engine browser.
    pub fn from_engine_page(page: Page) -> Self {
        Self {
            page: Some(page),
            attached_browser: None,
            handler_task: None,
        }
    }

    /// Wrap a page on a browser we attached to over its DevTools endpoint.
    /// The connection and its handler task live and die with this driver.
    pub fn from_attached(page: Page, browser: Browser, handler_task: JoinHandle<()>) -> Self {
        Self {
            page: Some(page),
            attached_browser: Some(browser),
            handler_task: Some(handler_task),
        }
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), DriverError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(())
    }

    async fn visible_text(&mut self) -> Result<String, DriverError> {
        let text: String = self
            .page()?
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?
            .into_value()
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(text)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.page()?
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Page close failed: {}", e);
            }
        }
        // Disconnect from an attached browser without closing it: aborting
        // the handler drops the websocket, the user's browser keeps running.
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        self.attached_browser.take();
    }
}
