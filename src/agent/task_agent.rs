//! The agent execution loop.
//!
//! One [`TaskAgent::run`] call drives one task from free-text request to a
//! single terminal message: think (planner), act (executor), observe
//! (conversation append), repeat until completion or the step budget runs
//! out. Whatever happens inside, the caller gets a [`TaskOutcome`] and the
//! session is released exactly once - errors terminate the task, never the
//! service.

use std::sync::Arc;
use uuid::Uuid;

use crate::actions::ActionExecutor;
use crate::auth::CredentialSource;
use crate::browser::{AutomationSession, SessionManager, SessionMode, Snapshot};
use crate::config::get_system_prompt;
use crate::model::{Conversation, Planner, PlannerDecision};
use crate::observe::ObserverRegistry;
use crate::tools::{ToolKind, ToolRegistry};

/// One task submission.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub user_id: String,
    pub query: String,
}

/// Terminal result of a task. Exactly one of these reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The planner declared the task finished (completion action or a plain
    /// text reply).
    Done(String),
    /// The step budget ran out first.
    TimedOut(String),
    /// A fatal setup or planner failure ended the task early.
    Failed(String),
}

impl TaskOutcome {
    /// The message shown to the user.
    pub fn message(&self) -> &str {
        match self {
            TaskOutcome::Done(m) | TaskOutcome::TimedOut(m) | TaskOutcome::Failed(m) => m,
        }
    }
}

/// Orchestrates one task at a time; safe to share across concurrent tasks.
///
/// Each `run` owns its own conversation and session; the only shared pieces
/// are the planner client, the engine behind the session manager and the
/// observer registry, all of which are concurrency-safe.
pub struct TaskAgent {
    planner: Arc<dyn Planner>,
    credentials: Arc<dyn CredentialSource>,
    sessions: SessionManager,
    executor: ActionExecutor,
    observers: Arc<ObserverRegistry>,
    registry: &'static ToolRegistry,
}

impl TaskAgent {
    pub fn new(
        planner: Arc<dyn Planner>,
        credentials: Arc<dyn CredentialSource>,
        sessions: SessionManager,
        executor: ActionExecutor,
        observers: Arc<ObserverRegistry>,
        registry: &'static ToolRegistry,
    ) -> Self {
        Self {
            planner,
            credentials,
            sessions,
            executor,
            observers,
            registry,
        }
    }

    /// Run one task to its terminal message.
    pub async fn run(&self, request: &TaskRequest, step_budget: u32) -> TaskOutcome {
        let task_id = Uuid::new_v4().to_string();
        let subscriber = request.user_id.as_str();

        tracing::info!(%task_id, user_id = %request.user_id, "Task started");
        self.observers
            .publish_status(subscriber, "Preparing your task...")
            .await;

        // Credentials are a precondition: no token, no session work at all.
        let access_token = match self.credentials.access_token(&request.user_id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(%task_id, "Credential check failed: {}", e);
                return self
                    .finish(
                        subscriber,
                        TaskOutcome::Failed(format!("Could not authorize your account: {e}")),
                    )
                    .await;
            }
        };

        let mut session = match self.sessions.acquire(&task_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(%task_id, "Session acquisition failed: {}", e);
                return self
                    .finish(
                        subscriber,
                        TaskOutcome::Failed(format!("Could not start a browser session: {e}")),
                    )
                    .await;
            }
        };

        let outcome = self
            .drive(&mut session, request, &access_token, step_budget)
            .await;

        // The single release point for every loop exit path.
        session.close().await;

        tracing::info!(%task_id, outcome = ?outcome, "Task finished");
        self.finish(subscriber, outcome).await
    }

    /// The loop proper. Never closes the session; `run` owns teardown.
    async fn drive(
        &self,
        session: &mut AutomationSession,
        request: &TaskRequest,
        access_token: &str,
        step_budget: u32,
    ) -> TaskOutcome {
        let subscriber = request.user_id.as_str();
        let mode_label = match session.mode() {
            SessionMode::Primary => "your browser profile",
            SessionMode::Fallback => "an isolated browser",
        };
        self.observers
            .publish_status(subscriber, format!("Session ready ({mode_label})"))
            .await;

        // First frame, so the observer sees the session from step zero.
        let snapshot = Snapshot::capture(session).await;
        self.observers
            .publish_image(subscriber, snapshot.base64_data)
            .await;

        let tool_definitions = self.registry.definitions();
        let mut conversation = Conversation::seeded(&get_system_prompt(), &request.query);
        let mut step = 0u32;

        while step < step_budget {
            step += 1;
            self.observers
                .publish_status(subscriber, format!("Thinking (step {step}/{step_budget})"))
                .await;

            let decision = match self.planner.plan(&conversation, &tool_definitions).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::error!("Planner failed: {}", e);
                    return TaskOutcome::Failed(format!(
                        "The reasoning service failed, so the task was stopped: {e}"
                    ));
                }
            };

            let calls = match decision {
                PlannerDecision::Message(text) => {
                    let message = if text.trim().is_empty() {
                        "Task complete.".to_string()
                    } else {
                        text
                    };
                    return TaskOutcome::Done(message);
                }
                PlannerDecision::ActionPlan(calls) => calls,
            };

            // An empty plan burns the step but adds no turns.
            if calls.is_empty() {
                continue;
            }

            conversation.push_plan(&calls);

            // Dispatch strictly in planner order: later calls routinely
            // depend on page state mutated by earlier ones.
            for call in &calls {
                if ToolKind::from_name(&call.tool_name) == Some(ToolKind::TaskComplete) {
                    let answer = call
                        .str_arg("final_answer")
                        .unwrap_or("Task complete.")
                        .to_string();
                    return TaskOutcome::Done(answer);
                }

                self.observers
                    .publish_status(subscriber, format!("Executing {}", call.tool_name))
                    .await;

                let observation = self
                    .executor
                    .execute(call, session, access_token, subscriber)
                    .await;
                conversation.push_observation(&observation.call_id, &observation.result_text);
            }
        }

        TaskOutcome::TimedOut(format!(
            "Stopped after {step_budget} steps without completing the task. \
             Partial progress may be visible in the session stream."
        ))
    }

    /// Emit the terminal status line and hand the outcome back.
    async fn finish(&self, subscriber: &str, outcome: TaskOutcome) -> TaskOutcome {
        let status = match &outcome {
            TaskOutcome::Done(_) => "Task complete".to_string(),
            TaskOutcome::TimedOut(_) => "Task stopped: step budget exhausted".to_string(),
            TaskOutcome::Failed(m) => format!("Task failed: {m}"),
        };
        self.observers.publish_status(subscriber, status).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::WorkspaceClient;
    use crate::auth::CredentialError;
    use crate::browser::testkit::FakePage;
    use crate::browser::{PageDriver, SessionError, SessionProvider};
    use crate::model::{ActionCall, PlannerError};
    use crate::observe::ObservationPayload;
    use crate::tools::default_registry;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Planner that replays a script, then repeats its last decision.
    struct ScriptedPlanner {
        script: Mutex<VecDeque<Result<PlannerDecision, String>>>,
        repeat: Option<PlannerDecision>,
        calls: AtomicUsize,
        seen_context_lens: Mutex<Vec<usize>>,
    }

    impl ScriptedPlanner {
        fn sequence(decisions: Vec<Result<PlannerDecision, String>>) -> Self {
            Self {
                script: Mutex::new(decisions.into()),
                repeat: None,
                calls: AtomicUsize::new(0),
                seen_context_lens: Mutex::new(Vec::new()),
            }
        }

        fn repeating(decision: PlannerDecision) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                repeat: Some(decision),
                calls: AtomicUsize::new(0),
                seen_context_lens: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn plan(
            &self,
            conversation: &Conversation,
            _tool_definitions: &[Value],
        ) -> Result<PlannerDecision, PlannerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_context_lens
                .lock()
                .unwrap()
                .push(conversation.len());

            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next.map_err(PlannerError::ApiError);
            }
            match &self.repeat {
                Some(decision) => Ok(decision.clone()),
                None => Err(PlannerError::ApiError("script exhausted".to_string())),
            }
        }
    }

    /// Credential source with a fixed answer.
    struct FakeCredentials {
        ok: bool,
    }

    #[async_trait]
    impl CredentialSource for FakeCredentials {
        async fn access_token(&self, _user_id: &str) -> Result<String, CredentialError> {
            if self.ok {
                Ok("test-token".to_string())
            } else {
                Err(CredentialError::NoStoredCredential)
            }
        }
    }

    /// Provider handing out fake pages that share one close counter.
    struct SharedPageProvider {
        closes: Arc<AtomicUsize>,
        primary_calls: AtomicUsize,
    }

    impl SharedPageProvider {
        fn new() -> Self {
            Self {
                closes: Arc::new(AtomicUsize::new(0)),
                primary_calls: AtomicUsize::new(0),
            }
        }

        fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    /// Page that bumps a shared counter on close.
    struct CountedPage {
        inner: FakePage,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageDriver for CountedPage {
        async fn navigate(&mut self, url: &str) -> Result<(), crate::browser::DriverError> {
            self.inner.navigate(url).await
        }
        async fn click(&mut self, selector: &str) -> Result<(), crate::browser::DriverError> {
            self.inner.click(selector).await
        }
        async fn type_text(
            &mut self,
            selector: &str,
            text: &str,
        ) -> Result<(), crate::browser::DriverError> {
            self.inner.type_text(selector, text).await
        }
        async fn visible_text(&mut self) -> Result<String, crate::browser::DriverError> {
            self.inner.visible_text().await
        }
        async fn screenshot(&mut self) -> Result<Vec<u8>, crate::browser::DriverError> {
            self.inner.screenshot().await
        }
        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SessionProvider for SharedPageProvider {
        async fn primary(
            &self,
            _task_id: &str,
        ) -> Result<Box<dyn PageDriver>, SessionError> {
            self.primary_calls.fetch_add(1, Ordering::SeqCst);
            Err(SessionError::PrimaryUnavailable("profile locked".to_string()))
        }

        async fn fallback(
            &self,
            _task_id: &str,
        ) -> Result<Box<dyn PageDriver>, SessionError> {
            Ok(Box::new(CountedPage {
                inner: FakePage::new(),
                closes: Arc::clone(&self.closes),
            }))
        }
    }

    fn action(tool: &str, pairs: &[(&str, Value)]) -> ActionCall {
        let args: Map<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        ActionCall::new(format!("call_{tool}"), tool, args)
    }

    fn agent_with(
        planner: Arc<ScriptedPlanner>,
        credentials_ok: bool,
        provider: Arc<SharedPageProvider>,
    ) -> (TaskAgent, Arc<ObserverRegistry>) {
        let observers = Arc::new(ObserverRegistry::new());
        let agent = TaskAgent::new(
            planner,
            Arc::new(FakeCredentials { ok: credentials_ok }),
            SessionManager::new(provider),
            ActionExecutor::new(
                default_registry(),
                WorkspaceClient::new(),
                Arc::clone(&observers),
            ),
            Arc::clone(&observers),
            default_registry(),
        );
        (agent, observers)
    }

    fn request() -> TaskRequest {
        TaskRequest {
            user_id: "user-1".to_string(),
            query: "open example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_completion_action_ends_the_task() {
        let planner = Arc::new(ScriptedPlanner::sequence(vec![
            Ok(PlannerDecision::ActionPlan(vec![action(
                "browser_navigate",
                &[("url", json!("https://example.com"))],
            )])),
            Ok(PlannerDecision::ActionPlan(vec![action(
                "task_complete",
                &[("final_answer", json!("done"))],
            )])),
        ]));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, observers) = agent_with(Arc::clone(&planner), true, Arc::clone(&provider));
        let mut rx = observers.connect("user-1").await;

        let outcome = agent.run(&request(), 3).await;

        assert_eq!(outcome, TaskOutcome::Done("done".to_string()));
        assert_eq!(planner.call_count(), 2);
        assert_eq!(provider.close_count(), 1);

        // At least two frames: the initial one and the post-navigate one.
        let mut images = 0;
        while let Ok(payload) = rx.try_recv() {
            if matches!(payload, ObservationPayload::Image { .. }) {
                images += 1;
            }
        }
        assert!(images >= 2, "expected at least 2 image payloads, got {images}");
    }

    #[tokio::test]
    async fn test_budget_exhaustion_times_out() {
        let planner = Arc::new(ScriptedPlanner::repeating(PlannerDecision::ActionPlan(
            vec![action("browser_click", &[("selector", json!("#next"))])],
        )));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, _observers) = agent_with(Arc::clone(&planner), true, Arc::clone(&provider));

        let outcome = agent.run(&request(), 2).await;

        assert!(matches!(outcome, TaskOutcome::TimedOut(_)));
        assert_eq!(planner.call_count(), 2);
        assert_eq!(provider.close_count(), 1);
    }

    #[tokio::test]
    async fn test_credential_failure_skips_session_acquisition() {
        let planner = Arc::new(ScriptedPlanner::repeating(PlannerDecision::Message(
            "unused".to_string(),
        )));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, _observers) = agent_with(Arc::clone(&planner), false, Arc::clone(&provider));

        let outcome = agent.run(&request(), 3).await;

        assert!(matches!(outcome, TaskOutcome::Failed(_)));
        assert!(outcome.message().contains("authorize"));
        assert_eq!(provider.primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(planner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plain_text_reply_is_immediate_done() {
        let planner = Arc::new(ScriptedPlanner::sequence(vec![Ok(
            PlannerDecision::Message("Just chatting!".to_string()),
        )]));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, _observers) = agent_with(Arc::clone(&planner), true, Arc::clone(&provider));

        let outcome = agent.run(&request(), 5).await;

        assert_eq!(outcome, TaskOutcome::Done("Just chatting!".to_string()));
        assert_eq!(provider.close_count(), 1);
    }

    #[tokio::test]
    async fn test_planner_error_fails_task_and_releases_session() {
        let planner = Arc::new(ScriptedPlanner::sequence(vec![Err(
            "service unreachable".to_string(),
        )]));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, _observers) = agent_with(Arc::clone(&planner), true, Arc::clone(&provider));

        let outcome = agent.run(&request(), 5).await;

        assert!(matches!(outcome, TaskOutcome::Failed(_)));
        assert!(outcome.message().contains("reasoning service"));
        assert_eq!(provider.close_count(), 1);
    }

    #[tokio::test]
    async fn test_every_dispatched_call_is_observed_before_next_think() {
        // Step 1 plans two calls (one of which fails); step 2 completes.
        let planner = Arc::new(ScriptedPlanner::sequence(vec![
            Ok(PlannerDecision::ActionPlan(vec![
                action("browser_click", &[("selector", json!("#broken"))]),
                action("read_page_content", &[]),
            ])),
            Ok(PlannerDecision::ActionPlan(vec![action(
                "task_complete",
                &[("final_answer", json!("ok"))],
            )])),
        ]));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, _observers) = agent_with(Arc::clone(&planner), true, Arc::clone(&provider));

        let outcome = agent.run(&request(), 5).await;
        assert_eq!(outcome, TaskOutcome::Done("ok".to_string()));

        // First think sees the seed (system + user); the second think sees
        // the plan turn plus one observation per dispatched call.
        let lens = planner.seen_context_lens.lock().unwrap().clone();
        assert_eq!(lens, vec![2, 5]);
    }

    #[tokio::test]
    async fn test_zero_budget_times_out_without_thinking() {
        let planner = Arc::new(ScriptedPlanner::repeating(PlannerDecision::Message(
            "unused".to_string(),
        )));
        let provider = Arc::new(SharedPageProvider::new());
        let (agent, _observers) = agent_with(Arc::clone(&planner), true, Arc::clone(&provider));

        let outcome = agent.run(&request(), 0).await;

        assert!(matches!(outcome, TaskOutcome::TimedOut(_)));
        assert_eq!(planner.call_count(), 0);
        assert_eq!(provider.close_count(), 1);
    }
}
