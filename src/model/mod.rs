//! Planner adapter module for reasoning-service inference.

mod client;
mod conversation;

pub use client::{
    Planner, PlannerClient, PlannerConfig, PlannerDecision, PlannerError, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY_SECS,
};
pub use conversation::{ActionCall, ChatMessage, Conversation, Role};
