//! HTTP and WebSocket surface of the agent service.

mod routes;
mod ws;

pub use routes::{serve, AppState};
