//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::actions::{ActionExecutor, WorkspaceClient};
use crate::agent::{TaskAgent, TaskOutcome, TaskRequest};
use crate::auth::{CredentialProvider, CredentialSource};
use crate::browser::{BrowserEngine, SessionManager, SessionProvider};
use crate::config::Config;
use crate::model::PlannerClient;
use crate::observe::ObserverRegistry;
use crate::store::{MemoryStore, UserStore};
use crate::tools::default_registry;

use super::ws;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub agent: TaskAgent,
    pub store: Arc<dyn UserStore>,
    pub credentials: Arc<CredentialProvider>,
    pub observers: Arc<ObserverRegistry>,
}

/// Start the HTTP server. Blocks until shutdown, then stops the engine.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let engine = Arc::new(BrowserEngine::launch(config.engine_config()).await?);

    let store: Arc<dyn UserStore> = Arc::new(MemoryStore::new());
    let credentials = Arc::new(CredentialProvider::new(
        config.google_config(),
        Arc::clone(&store),
    ));
    let observers = Arc::new(ObserverRegistry::new());

    let agent = TaskAgent::new(
        Arc::new(PlannerClient::new(config.planner_config())),
        Arc::clone(&credentials) as Arc<dyn CredentialSource>,
        SessionManager::new(Arc::clone(&engine) as Arc<dyn SessionProvider>),
        ActionExecutor::new(
            default_registry(),
            WorkspaceClient::new(),
            Arc::clone(&observers),
        ),
        Arc::clone(&observers),
        default_registry(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        agent,
        store,
        credentials,
        observers,
    });

    let app = router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

/// Build the route table.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/auth/google", get(login_google))
        .route("/auth/google/callback", get(callback_google))
        .route("/api/chat/query", post(chat_query))
        .route("/api/observe/ws", get(ws::observe_ws))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn root() -> impl IntoResponse {
    Json(json!({ "status": "BrowUser.ai backend is running" }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Redirect the user to the Google consent screen.
async fn login_google(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Redirect::temporary(&state.credentials.authorization_url())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: String,
}

/// Complete the OAuth flow: exchange the code, upsert the user, store the
/// refresh token, bounce back to the frontend.
async fn callback_google(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let frontend = &state.config.frontend_url;

    let result: anyhow::Result<String> = async {
        let tokens = state.credentials.exchange_code(&params.code).await?;
        let profile = state.credentials.fetch_profile(&tokens.access_token).await?;
        let user = state
            .store
            .upsert_user(&profile.id, &profile.email, &profile.name)
            .await?;

        if let Some(refresh_token) = &tokens.refresh_token {
            state
                .store
                .upsert_refresh_token(&user.id, refresh_token)
                .await?;
        }

        Ok(user.id)
    }
    .await;

    match result {
        Ok(user_id) => {
            tracing::info!(%user_id, "User signed in");
            Redirect::temporary(&format!("{frontend}/?status=success&uid={user_id}"))
        }
        Err(e) => {
            tracing::error!("OAuth callback failed: {}", e);
            Redirect::temporary(&format!("{frontend}/?status=error"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    query: String,
    #[serde(rename = "userId")]
    user_id: String,
}

/// The task entry point: runs the whole loop, returns the terminal message.
async fn chat_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatQuery>,
) -> impl IntoResponse {
    if req.user_id.is_empty() || req.query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing userId or query" })),
        );
    }

    let request = TaskRequest {
        user_id: req.user_id,
        query: req.query,
    };
    let outcome = state.agent.run(&request, state.config.step_budget).await;

    let outcome_tag = match &outcome {
        TaskOutcome::Done(_) => "done",
        TaskOutcome::TimedOut(_) => "timed_out",
        TaskOutcome::Failed(_) => "failed",
    };

    (
        StatusCode::OK,
        Json(json!({
            "response": {
                "outcome": outcome_tag,
                "message": outcome.message(),
            }
        })),
    )
}
