//! Process-wide browser engine lifecycle.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::driver::{CdpPage, PageDriver};
use super::session::{SessionError, SessionProvider};
use super::stealth::{random_user_agent, STEALTH_INIT_SCRIPT};

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to launch browser engine: {0}")]
    Launch(String),
    #[error("Failed to attach to browser at {0}: {1}")]
    Attach(String, String),
    #[error("Failed to open page: {0}")]
    Page(String),
}

/// Configuration for the automation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run the managed Chromium headless.
    pub headless: bool,
    /// DevTools endpoint of the user's persistent browser, if one is
    /// reachable (e.g. "http://localhost:9222"). Primary acquisition
    /// attaches here; unset means primary always falls through.
    pub user_browser_endpoint: Option<String>,
    /// Fixed viewport for fallback sessions.
    pub viewport: (u32, u32),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_browser_endpoint: None,
            viewport: (1920, 1080),
        }
    }
}

impl EngineConfig {
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_user_browser_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.user_browser_endpoint = Some(endpoint.into());
        self
    }
}

/// The one Chromium process this service manages.
///
/// Launched once at boot, closed once at shutdown; per-task sessions come
/// and go on top of it. Individual tasks never stop the engine.
pub struct BrowserEngine {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    config: EngineConfig,
}

impl BrowserEngine {
    /// Launch the managed Chromium and start draining its event stream.
    pub async fn launch(config: EngineConfig) -> Result<Self, EngineError> {
        let (width, height) = config.viewport;
        let mut builder = BrowserConfig::builder().window_size(width, height);
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(EngineError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!(headless = config.headless, "Browser engine launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            config,
        })
    }

    /// Open a fresh stealth-configured page on the engine browser.
    async fn new_stealth_page(&self) -> Result<CdpPage, EngineError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| EngineError::Page(e.to_string()))?;

        page.set_user_agent(random_user_agent())
            .await
            .map_err(|e| EngineError::Page(e.to_string()))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            STEALTH_INIT_SCRIPT.to_string(),
        ))
        .await
        .map_err(|e| EngineError::Page(e.to_string()))?;

        Ok(CdpPage::from_engine_page(page))
    }

    /// Attach to the user's running browser and open a page in it.
    async fn attach_user_browser(&self, endpoint: &str) -> Result<CdpPage, EngineError> {
        let (browser, mut handler) = Browser::connect(endpoint)
            .await
            .map_err(|e| EngineError::Attach(endpoint.to_string(), e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(EngineError::Page(e.to_string()));
            }
        };

        Ok(CdpPage::from_attached(page, browser, handler_task))
    }

    /// Stop the engine process. Called once, at service shutdown.
    pub async fn shutdown(&self) {
        if let Err(e) = self.browser.lock().await.close().await {
            tracing::warn!("Browser engine close failed: {}", e);
        }
        self.handler_task.abort();
        tracing::info!("Browser engine stopped");
    }
}

#[async_trait]
impl SessionProvider for BrowserEngine {
    async fn primary(&self, task_id: &str) -> Result<Box<dyn PageDriver>, SessionError> {
        let endpoint = self
            .config
            .user_browser_endpoint
            .as_deref()
            .ok_or_else(|| {
                SessionError::PrimaryUnavailable("no user browser endpoint configured".to_string())
            })?;

        let driver = self
            .attach_user_browser(endpoint)
            .await
            .map_err(|e| SessionError::PrimaryUnavailable(e.to_string()))?;
        tracing::info!(task_id, endpoint, "Attached to user browser");
        Ok(Box::new(driver))
    }

    async fn fallback(&self, task_id: &str) -> Result<Box<dyn PageDriver>, SessionError> {
        let driver = self
            .new_stealth_page()
            .await
            .map_err(|e| SessionError::FallbackFailed(e.to_string()))?;
        tracing::info!(task_id, "Opened stealth fallback page");
        Ok(Box::new(driver))
    }
}
