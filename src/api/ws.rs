//! Observer WebSocket: pushes status and snapshot payloads to the frontend.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use super::routes::AppState;

/// Query parameters for the observer endpoint.
#[derive(Debug, Deserialize)]
pub struct ObserveParams {
    /// Subscriber key; one live observer per user id.
    pub user_id: String,
}

/// WebSocket endpoint for observing a user's running task.
pub async fn observe_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ObserveParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer(socket, state, params.user_id))
}

/// Forward published payloads to the socket until either side goes away.
///
/// Incoming client frames are keep-alive only and are ignored.
async fn handle_observer(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    tracing::info!(%user_id, "Observer connected");
    let mut rx = state.observers.connect(&user_id).await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(payload) = payload else {
                    // Replaced by a newer connection for the same id.
                    tracing::debug!(%user_id, "Observer handle replaced");
                    break;
                };
                let text = match serde_json::to_string(&payload) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode observation payload: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    state.observers.disconnect(&user_id).await;
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => {
                        state.observers.disconnect(&user_id).await;
                        break;
                    }
                    Some(Ok(_)) => {} // keep-alive traffic
                    Some(Err(e)) => {
                        tracing::debug!(%user_id, "Observer socket error: {}", e);
                        state.observers.disconnect(&user_id).await;
                        break;
                    }
                }
            }
        }
    }

    tracing::info!(%user_id, "Observer disconnected");
}
