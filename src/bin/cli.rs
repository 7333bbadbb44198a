//! BrowUser Agent - direct task runner.
//!
//! Drives the agent loop from the terminal, without the HTTP layer.
//! Run with: cargo run --bin browuser-cli -- "open example.com"

use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use browuser_agent::actions::{ActionExecutor, WorkspaceClient};
use browuser_agent::agent::{TaskAgent, TaskRequest};
use browuser_agent::auth::{CredentialError, CredentialSource};
use browuser_agent::browser::{BrowserEngine, SessionManager, SessionProvider};
use browuser_agent::model::PlannerClient;
use browuser_agent::observe::ObserverRegistry;
use browuser_agent::tools::default_registry;
use browuser_agent::Config;

use async_trait::async_trait;

/// CLI runs use a token handed in via the environment instead of the
/// store-backed refresh flow.
struct EnvCredentials {
    token: Option<String>,
}

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn access_token(&self, _user_id: &str) -> Result<String, CredentialError> {
        self.token
            .clone()
            .ok_or(CredentialError::NoStoredCredential)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env();

    println!("🤖 BrowUser Agent - AI-powered Web Automation");
    println!("================================================");
    println!("Planner: {} @ {}", config.planner_model, config.planner_base_url);
    println!("Step budget: {}", config.step_budget);
    if let Some(ref endpoint) = config.user_browser_endpoint {
        println!("User browser: {}", endpoint);
    }
    println!("================================================\n");

    let engine = Arc::new(BrowserEngine::launch(config.engine_config()).await?);
    let observers = Arc::new(ObserverRegistry::new());

    let agent = TaskAgent::new(
        Arc::new(PlannerClient::new(config.planner_config())),
        Arc::new(EnvCredentials {
            token: env::var("GOOGLE_ACCESS_TOKEN").ok(),
        }),
        SessionManager::new(Arc::clone(&engine) as Arc<dyn SessionProvider>),
        ActionExecutor::new(
            default_registry(),
            WorkspaceClient::new(),
            Arc::clone(&observers),
        ),
        observers,
        default_registry(),
    );

    let user_id = env::var("CLI_USER_ID").unwrap_or_else(|_| "cli".to_string());

    if args.len() > 1 {
        let query = args[1..].join(" ");
        println!("📝 Task: {}\n", query);

        let request = TaskRequest {
            user_id,
            query,
        };
        let outcome = agent.run(&request, config.step_budget).await;
        println!("\n✅ Result: {}", outcome.message());
    } else {
        // Interactive mode
        println!("Interactive mode. Type your task and press Enter.");
        println!("Type 'quit' or 'exit' to exit.\n");

        let stdin = io::stdin();
        loop {
            print!("📝 Task: ");
            io::stdout().flush()?;

            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            let query = line.trim();

            if query.is_empty() {
                continue;
            }

            if query == "quit" || query == "exit" {
                println!("Goodbye! 👋");
                break;
            }

            let request = TaskRequest {
                user_id: user_id.clone(),
                query: query.to_string(),
            };
            let outcome = agent.run(&request, config.step_budget).await;
            println!("\n✅ Result: {}\n", outcome.message());
        }
    }

    engine.shutdown().await;
    Ok(())
}
