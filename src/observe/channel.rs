//! Per-subscriber observation channel.
//!
//! One live handle per subscriber id; a new connect for the same id replaces
//! the old one. Publishing is fire-and-forget: with no subscriber, or a
//! subscriber whose transport died, the payload is dropped and the task
//! carries on. Nothing is buffered for late joiners.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

/// A payload pushed to an observer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObservationPayload {
    /// Short human-readable progress line.
    Status { message: String },
    /// Snapshot of the current visual state, base64-encoded PNG.
    Image { data: String },
}

impl ObservationPayload {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn image(data: impl Into<String>) -> Self {
        Self::Image { data: data.into() }
    }
}

/// Registry mapping subscriber ids to their live transport handle.
///
/// Constructed once per process and passed around by `Arc`; tasks publish
/// into it, the WebSocket layer connects receivers out of it.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    senders: RwLock<HashMap<String, UnboundedSender<ObservationPayload>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, replacing any previous handle for the same id.
    ///
    /// The previous receiver (if any) observes a closed channel.
    pub async fn connect(&self, subscriber_id: &str) -> UnboundedReceiver<ObservationPayload> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.senders.write().await;
        if senders.insert(subscriber_id.to_string(), tx).is_some() {
            tracing::debug!(subscriber_id, "Replaced existing observer handle");
        }
        rx
    }

    /// Drop the handle for a subscriber, if one exists.
    pub async fn disconnect(&self, subscriber_id: &str) {
        self.senders.write().await.remove(subscriber_id);
    }

    /// Push a payload to a subscriber. Never fails, never blocks the caller
    /// beyond the brief registry lock: a missing or dead handle is logged
    /// and the payload dropped.
    pub async fn publish(&self, subscriber_id: &str, payload: ObservationPayload) {
        let senders = self.senders.read().await;
        match senders.get(subscriber_id) {
            Some(tx) => {
                if tx.send(payload).is_err() {
                    tracing::debug!(subscriber_id, "Observer transport closed, dropping payload");
                }
            }
            None => {
                tracing::trace!(subscriber_id, "No observer connected, dropping payload");
            }
        }
    }

    /// Convenience: publish a status line.
    pub async fn publish_status(&self, subscriber_id: &str, message: impl Into<String>) {
        self.publish(subscriber_id, ObservationPayload::status(message))
            .await;
    }

    /// Convenience: publish an image snapshot.
    pub async fn publish_image(&self, subscriber_id: &str, data: impl Into<String>) {
        self.publish(subscriber_id, ObservationPayload::image(data))
            .await;
    }
}
