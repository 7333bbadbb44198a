//! # BrowUser Agent
//!
//! AI-powered automation agent for web browsing and Google Workspace tasks.
//!
//! A free-text request is turned into a bounded think-act-observe loop: a
//! reasoning service plans structured tool calls, an executor performs them
//! against a live browser session and the user's mail/document APIs, and
//! the outcomes feed back into the plan until the task completes or the
//! step budget runs out. A WebSocket observer receives live status lines
//! and page snapshots while the loop runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use browuser_agent::actions::{ActionExecutor, WorkspaceClient};
//! use browuser_agent::agent::{TaskAgent, TaskRequest};
//! use browuser_agent::auth::{CredentialProvider, CredentialSource};
//! use browuser_agent::browser::{BrowserEngine, SessionManager, SessionProvider};
//! use browuser_agent::config::Config;
//! use browuser_agent::model::PlannerClient;
//! use browuser_agent::observe::ObserverRegistry;
//! use browuser_agent::store::{MemoryStore, UserStore};
//! use browuser_agent::tools::default_registry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let engine = Arc::new(BrowserEngine::launch(config.engine_config()).await?);
//!     let store: Arc<dyn UserStore> = Arc::new(MemoryStore::new());
//!     let observers = Arc::new(ObserverRegistry::new());
//!
//!     let credentials = Arc::new(CredentialProvider::new(
//!         config.google_config(),
//!         Arc::clone(&store),
//!     ));
//!     let agent = TaskAgent::new(
//!         Arc::new(PlannerClient::new(config.planner_config())),
//!         credentials as Arc<dyn CredentialSource>,
//!         SessionManager::new(Arc::clone(&engine) as Arc<dyn SessionProvider>),
//!         ActionExecutor::new(default_registry(), WorkspaceClient::new(), Arc::clone(&observers)),
//!         observers,
//!         default_registry(),
//!     );
//!
//!     let request = TaskRequest {
//!         user_id: "user-1".to_string(),
//!         query: "Open example.com and read the headline".to_string(),
//!     };
//!     let outcome = agent.run(&request, config.step_budget).await;
//!     println!("{}", outcome.message());
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod agent;
pub mod api;
pub mod auth;
pub mod browser;
pub mod config;
pub mod model;
pub mod observe;
pub mod store;
pub mod tools;

pub use actions::{ActionExecutor, Observation, WorkspaceClient};
pub use agent::{TaskAgent, TaskOutcome, TaskRequest};
pub use browser::{AutomationSession, BrowserEngine, SessionManager, SessionMode};
pub use config::Config;
pub use model::{ActionCall, Conversation, Planner, PlannerClient, PlannerConfig, PlannerDecision};
pub use observe::{ObservationPayload, ObserverRegistry};
pub use tools::{default_registry, ToolKind, ToolRegistry};
