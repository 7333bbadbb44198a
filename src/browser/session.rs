//! Per-task automation session acquisition and teardown.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::driver::{DriverError, PageDriver};

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Primary session unavailable: {0}")]
    PrimaryUnavailable(String),
    #[error("Fallback session failed: {0}")]
    FallbackFailed(String),
    #[error("Session acquisition failed (primary: {primary}; fallback: {fallback})")]
    Acquisition { primary: String, fallback: String },
    #[error("Session is closed")]
    Closed,
}

/// How the session was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Attached to the user's persistent browser profile.
    Primary,
    /// Fresh stealth-configured context on the managed engine.
    Fallback,
}

/// A live, exclusively-owned browser surface for one task.
///
/// Exactly one per task; closed on every exit path of the loop and never
/// reused afterwards.
pub struct AutomationSession {
    task_id: String,
    mode: SessionMode,
    driver: Box<dyn PageDriver>,
    closed: bool,
}

impl std::fmt::Debug for AutomationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationSession")
            .field("task_id", &self.task_id)
            .field("mode", &self.mode)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl AutomationSession {
    pub fn new(task_id: impl Into<String>, mode: SessionMode, driver: Box<dyn PageDriver>) -> Self {
        Self {
            task_id: task_id.into(),
            mode,
            driver,
            closed: false,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mutable access to the page driver. Fails once the session is closed.
    pub fn driver(&mut self) -> Result<&mut dyn PageDriver, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        Ok(self.driver.as_mut())
    }

    /// Best-effort snapshot of the current page; None once closed or when
    /// the capture itself fails.
    pub async fn try_screenshot(&mut self) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }
        match self.driver.screenshot().await {
            Ok(png) => Some(png),
            Err(DriverError::Closed) => None,
            Err(e) => {
                tracing::debug!(task_id = %self.task_id, "Snapshot capture failed: {}", e);
                None
            }
        }
    }

    /// Close the underlying page. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.driver.close().await;
        tracing::debug!(task_id = %self.task_id, "Session closed");
    }
}

/// Seam the session manager acquires drivers through.
///
/// The engine implements this against CDP; tests inject counting fakes.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Attach to the user's existing browser profile.
    async fn primary(&self, task_id: &str) -> Result<Box<dyn PageDriver>, SessionError>;

    /// Launch an isolated stealth context.
    async fn fallback(&self, task_id: &str) -> Result<Box<dyn PageDriver>, SessionError>;
}

/// Acquires and releases one session per task.
///
/// Acquisition order: primary (user profile) first; on failure the stealth
/// fallback is attempted exactly once. No pooling, no sharing across tasks.
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Acquire a session for the task, falling back to stealth mode when the
    /// user's profile cannot be attached.
    pub async fn acquire(&self, task_id: &str) -> Result<AutomationSession, SessionError> {
        let primary_failure = match self.provider.primary(task_id).await {
            Ok(driver) => {
                return Ok(AutomationSession::new(task_id, SessionMode::Primary, driver));
            }
            Err(e) => {
                tracing::warn!(task_id, "Primary session unavailable: {}", e);
                e.to_string()
            }
        };

        match self.provider.fallback(task_id).await {
            Ok(driver) => Ok(AutomationSession::new(
                task_id,
                SessionMode::Fallback,
                driver,
            )),
            Err(e) => Err(SessionError::Acquisition {
                primary: primary_failure,
                fallback: e.to_string(),
            }),
        }
    }

    /// Release a session. Safe to call on an already-closed session.
    pub async fn release(&self, session: &mut AutomationSession) {
        session.close().await;
    }
}
