//! Executes one planned action and reports the outcome.
//!
//! Every dispatched call produces exactly one [`Observation`], failures
//! included: timeouts, schema violations and API rejections all come back
//! as result text for the planner to read, never as an error that unwinds
//! the task.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::browser::{AutomationSession, Snapshot};
use crate::model::ActionCall;
use crate::observe::ObserverRegistry;
use crate::tools::{ToolKind, ToolRegistry};

use super::workspace::WorkspaceClient;

/// Default timeout for page navigation.
const DEFAULT_NAV_TIMEOUT: Duration = Duration::from_secs(8);

/// Default timeout for click/type page operations.
const DEFAULT_PAGE_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Page text is truncated to this many characters before entering context.
const DEFAULT_MAX_PAGE_TEXT: usize = 4000;

/// Upper bound on a single wait action.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);

/// How often a waiting task refreshes the observer's snapshot.
const DEFAULT_WAIT_FRAME_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of one dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub call_id: String,
    pub tool_name: String,
    pub result_text: String,
}

impl Observation {
    fn for_call(call: &ActionCall, result_text: impl Into<String>) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            result_text: result_text.into(),
        }
    }
}

/// Dispatches validated action calls against the session and remote APIs.
pub struct ActionExecutor {
    registry: &'static ToolRegistry,
    workspace: WorkspaceClient,
    observers: Arc<ObserverRegistry>,
    nav_timeout: Duration,
    page_op_timeout: Duration,
    max_page_text: usize,
    max_wait: Duration,
    wait_frame_interval: Duration,
}

impl ActionExecutor {
    pub fn new(
        registry: &'static ToolRegistry,
        workspace: WorkspaceClient,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            registry,
            workspace,
            observers,
            nav_timeout: DEFAULT_NAV_TIMEOUT,
            page_op_timeout: DEFAULT_PAGE_OP_TIMEOUT,
            max_page_text: DEFAULT_MAX_PAGE_TEXT,
            max_wait: DEFAULT_MAX_WAIT,
            wait_frame_interval: DEFAULT_WAIT_FRAME_INTERVAL,
        }
    }

    /// Override the page operation timeouts.
    pub fn with_timeouts(mut self, nav: Duration, page_op: Duration) -> Self {
        self.nav_timeout = nav;
        self.page_op_timeout = page_op;
        self
    }

    /// Override the page text truncation limit.
    pub fn with_max_page_text(mut self, max: usize) -> Self {
        self.max_page_text = max;
        self
    }

    /// Override the wait bounds.
    pub fn with_wait_limits(mut self, max_wait: Duration, frame_interval: Duration) -> Self {
        self.max_wait = max_wait;
        self.wait_frame_interval = frame_interval;
        self
    }

    /// Execute one action call. Always returns an Observation.
    pub async fn execute(
        &self,
        call: &ActionCall,
        session: &mut AutomationSession,
        access_token: &str,
        subscriber_id: &str,
    ) -> Observation {
        let kind = match self.registry.validate(&call.tool_name, &call.arguments) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(tool = %call.tool_name, "Rejected action: {}", e);
                return Observation::for_call(call, format!("Invalid action: {e}"));
            }
        };

        tracing::debug!(tool = %call.tool_name, call_id = %call.call_id, "Dispatching action");

        match kind {
            ToolKind::SendGmail => self.handle_send_gmail(call, access_token).await,
            ToolKind::CreateGoogleDoc => self.handle_create_doc(call, access_token).await,
            ToolKind::BrowserNavigate => {
                self.handle_navigate(call, session, subscriber_id).await
            }
            ToolKind::BrowserClick => self.handle_click(call, session, subscriber_id).await,
            ToolKind::BrowserType => self.handle_type(call, session, subscriber_id).await,
            ToolKind::ReadPageContent => self.handle_read_page(call, session).await,
            ToolKind::Wait => self.handle_wait(call, session, subscriber_id).await,
            // The loop controller intercepts completion before dispatch.
            ToolKind::TaskComplete => {
                Observation::for_call(call, "Task completion is handled by the agent loop.")
            }
        }
    }

    async fn handle_send_gmail(&self, call: &ActionCall, access_token: &str) -> Observation {
        // Validation guarantees the required string arguments.
        let recipient = call.str_arg("recipient").unwrap_or_default();
        let subject = call.str_arg("subject").unwrap_or_default();
        let body = call.str_arg("body").unwrap_or_default();

        match self
            .workspace
            .send_gmail(access_token, recipient, subject, body)
            .await
        {
            Ok(()) => Observation::for_call(call, format!("Email sent to {recipient}.")),
            Err(e) => Observation::for_call(call, format!("Failed to send email: {e}")),
        }
    }

    async fn handle_create_doc(&self, call: &ActionCall, access_token: &str) -> Observation {
        let title = call.str_arg("title").unwrap_or_default();
        let content = call.str_arg("content").unwrap_or_default();

        match self
            .workspace
            .create_google_doc(access_token, title, content)
            .await
        {
            Ok(document_id) => Observation::for_call(
                call,
                format!("Created document '{title}' (id {document_id})."),
            ),
            Err(e) => Observation::for_call(call, format!("Failed to create document: {e}")),
        }
    }

    async fn handle_navigate(
        &self,
        call: &ActionCall,
        session: &mut AutomationSession,
        subscriber_id: &str,
    ) -> Observation {
        let url = call.str_arg("url").unwrap_or_default().to_string();

        let result = match session.driver() {
            Ok(driver) => match timeout(self.nav_timeout, driver.navigate(&url)).await {
                Ok(Ok(())) => format!("Navigated to {url}."),
                Ok(Err(e)) => format!("Navigation failed: {e}"),
                Err(_) => format!(
                    "Timed out after {}s navigating to {url}.",
                    self.nav_timeout.as_secs()
                ),
            },
            Err(e) => format!("Navigation failed: {e}"),
        };

        self.publish_snapshot(session, subscriber_id).await;
        Observation::for_call(call, result)
    }

    async fn handle_click(
        &self,
        call: &ActionCall,
        session: &mut AutomationSession,
        subscriber_id: &str,
    ) -> Observation {
        let selector = call.str_arg("selector").unwrap_or_default().to_string();

        let result = match session.driver() {
            Ok(driver) => match timeout(self.page_op_timeout, driver.click(&selector)).await {
                Ok(Ok(())) => format!("Clicked {selector}."),
                Ok(Err(e)) => format!("Click failed: {e}"),
                Err(_) => format!(
                    "Timed out after {}s clicking {selector}.",
                    self.page_op_timeout.as_secs()
                ),
            },
            Err(e) => format!("Click failed: {e}"),
        };

        self.publish_snapshot(session, subscriber_id).await;
        Observation::for_call(call, result)
    }

    async fn handle_type(
        &self,
        call: &ActionCall,
        session: &mut AutomationSession,
        subscriber_id: &str,
    ) -> Observation {
        let selector = call.str_arg("selector").unwrap_or_default().to_string();
        let text = call.str_arg("text").unwrap_or_default().to_string();

        let result = match session.driver() {
            Ok(driver) => {
                match timeout(self.page_op_timeout, driver.type_text(&selector, &text)).await {
                    Ok(Ok(())) => format!("Typed into {selector}."),
                    Ok(Err(e)) => format!("Typing failed: {e}"),
                    Err(_) => format!(
                        "Timed out after {}s typing into {selector}.",
                        self.page_op_timeout.as_secs()
                    ),
                }
            }
            Err(e) => format!("Typing failed: {e}"),
        };

        self.publish_snapshot(session, subscriber_id).await;
        Observation::for_call(call, result)
    }

    async fn handle_read_page(
        &self,
        call: &ActionCall,
        session: &mut AutomationSession,
    ) -> Observation {
        let result = match session.driver() {
            Ok(driver) => match timeout(self.page_op_timeout, driver.visible_text()).await {
                Ok(Ok(text)) => {
                    let truncated = truncate_chars(&text, self.max_page_text);
                    format!("Page content:\n{truncated}")
                }
                Ok(Err(e)) => format!("Failed to read page: {e}"),
                Err(_) => format!(
                    "Timed out after {}s reading the page.",
                    self.page_op_timeout.as_secs()
                ),
            },
            Err(e) => format!("Failed to read page: {e}"),
        };

        Observation::for_call(call, result)
    }

    async fn handle_wait(
        &self,
        call: &ActionCall,
        session: &mut AutomationSession,
        subscriber_id: &str,
    ) -> Observation {
        let requested = call.f64_arg("seconds").unwrap_or(1.0).max(0.0);
        let total = Duration::from_secs_f64(requested).min(self.max_wait);

        // Sleep in frame-sized slices, refreshing the observer's view so a
        // long wait does not look like a stall.
        let mut remaining = total;
        while remaining > Duration::ZERO {
            let slice = remaining.min(self.wait_frame_interval);
            tokio::time::sleep(slice).await;
            remaining = remaining.saturating_sub(slice);
            self.publish_snapshot(session, subscriber_id).await;
        }

        Observation::for_call(call, format!("Waited {:.1}s.", total.as_secs_f64()))
    }

    /// Capture and push the current frame; failures degrade to a fallback
    /// frame inside the capture, and publishing itself never errors.
    async fn publish_snapshot(&self, session: &mut AutomationSession, subscriber_id: &str) {
        let snapshot = Snapshot::capture(session).await;
        self.observers
            .publish_image(subscriber_id, snapshot.base64_data)
            .await;
    }
}

/// Truncate to a character budget without splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("\n[truncated]");
    out
}
