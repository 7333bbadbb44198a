//! Configuration module for the agent service.

mod prompts;

pub use prompts::{get_system_prompt, SYSTEM_PROMPT};

use std::env;

use crate::auth::GoogleAuthConfig;
use crate::browser::EngineConfig;
use crate::model::PlannerConfig;

/// Default number of think steps per task.
pub const DEFAULT_STEP_BUDGET: u32 = 15;

/// Service configuration, read once from the environment at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Frontend origin, used for CORS and OAuth redirects.
    pub frontend_url: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_callback_url: String,
    pub planner_base_url: String,
    pub planner_api_key: String,
    pub planner_model: String,
    pub browser_headless: bool,
    /// DevTools endpoint of the user's persistent browser, if reachable.
    pub user_browser_endpoint: Option<String>,
    pub step_budget: u32,
}

impl Config {
    /// Read configuration from the environment (after `dotenvy` has loaded
    /// any `.env` file). Missing values fall back to development defaults.
    pub fn from_env() -> Self {
        let google_client_id = env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
        if google_client_id.is_empty() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; OAuth login will not work");
        }

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            google_client_id,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_callback_url: env::var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:5000/auth/google/callback".to_string()),
            planner_base_url: env::var("PLANNER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            planner_api_key: env::var("OPENAI_API_KEY").unwrap_or_else(|_| "EMPTY".to_string()),
            planner_model: env::var("PLANNER_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            browser_headless: env::var("BROWSER_HEADLESS")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(true),
            user_browser_endpoint: env::var("USER_BROWSER_ENDPOINT").ok(),
            step_budget: env::var("STEP_BUDGET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STEP_BUDGET),
        }
    }

    /// Planner client settings derived from this config.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig::default()
            .with_base_url(&self.planner_base_url)
            .with_api_key(&self.planner_api_key)
            .with_model_name(&self.planner_model)
    }

    /// Browser engine settings derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().with_headless(self.browser_headless);
        if let Some(endpoint) = &self.user_browser_endpoint {
            config = config.with_user_browser_endpoint(endpoint);
        }
        config
    }

    /// OAuth application settings derived from this config.
    pub fn google_config(&self) -> GoogleAuthConfig {
        GoogleAuthConfig::new(
            &self.google_client_id,
            &self.google_client_secret,
            &self.google_callback_url,
        )
    }

    /// Listen address for the HTTP server.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
