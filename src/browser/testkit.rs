//! Scripted fakes for exercising the loop without a browser.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::driver::{DriverError, PageDriver};
use super::session::{SessionError, SessionProvider};

/// In-memory page that records every operation performed on it.
pub(crate) struct FakePage {
    ops: Arc<Mutex<Vec<String>>>,
    failing_ops: Vec<&'static str>,
    page_text: String,
    op_delay: Option<Duration>,
    close_count: Arc<AtomicUsize>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self {
            ops: Arc::new(Mutex::new(Vec::new())),
            failing_ops: Vec::new(),
            page_text: "Example Domain".to_string(),
            op_delay: None,
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_text(mut self, text: impl Into<String>) -> Self {
        self.page_text = text.into();
        self
    }

    pub(crate) fn failing(mut self, op: &'static str) -> Self {
        self.failing_ops.push(op);
        self
    }

    /// Delay applied to every page operation, to provoke executor timeouts.
    pub(crate) fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = Some(delay);
        self
    }

    /// Shared handle to the recorded operation log.
    pub(crate) fn ops(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.ops)
    }

    /// Shared close counter.
    pub(crate) fn close_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_count)
    }

    async fn run_op(&self, op: &'static str, detail: String) -> Result<(), DriverError> {
        if let Some(delay) = self.op_delay {
            tokio::time::sleep(delay).await;
        }
        self.ops.lock().unwrap().push(detail);
        if self.failing_ops.contains(&op) {
            return Err(DriverError::Cdp(format!("scripted failure: {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.run_op("navigate", format!("navigate:{url}")).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), DriverError> {
        self.run_op("click", format!("click:{selector}")).await
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.run_op("type", format!("type:{selector}:{text}")).await
    }

    async fn visible_text(&mut self) -> Result<String, DriverError> {
        self.run_op("text", "text".to_string()).await?;
        Ok(self.page_text.clone())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.ops.lock().unwrap().push("screenshot".to_string());
        if self.failing_ops.contains(&"screenshot") {
            return Err(DriverError::Cdp("scripted failure: screenshot".to_string()));
        }
        Ok(b"fake png bytes".to_vec())
    }

    async fn close(&mut self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session provider that counts strategy attempts.
pub(crate) struct CountingProvider {
    primary_ok: bool,
    fallback_ok: bool,
    primary_calls: AtomicUsize,
    fallback_calls: AtomicUsize,
}

impl CountingProvider {
    pub(crate) fn new(primary_ok: bool, fallback_ok: bool) -> Self {
        Self {
            primary_ok,
            fallback_ok,
            primary_calls: AtomicUsize::new(0),
            fallback_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn primary_calls(&self) -> usize {
        self.primary_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fallback_calls(&self) -> usize {
        self.fallback_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for CountingProvider {
    async fn primary(&self, _task_id: &str) -> Result<Box<dyn PageDriver>, SessionError> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        if self.primary_ok {
            Ok(Box::new(FakePage::new()))
        } else {
            Err(SessionError::PrimaryUnavailable(
                "profile locked".to_string(),
            ))
        }
    }

    async fn fallback(&self, _task_id: &str) -> Result<Box<dyn PageDriver>, SessionError> {
        self.fallback_calls.fetch_add(1, Ordering::SeqCst);
        if self.fallback_ok {
            Ok(Box::new(FakePage::new()))
        } else {
            Err(SessionError::FallbackFailed("launch failed".to_string()))
        }
    }
}
