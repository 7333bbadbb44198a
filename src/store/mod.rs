//! User and OAuth token storage.
//!
//! The loop only ever needs two simple shapes: upsert-by-key and select.
//! The trait keeps durable backends a deployment concern; the in-memory
//! implementation backs tests and single-node runs.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable internal id, assigned on first upsert.
    pub id: String,
    pub google_id: String,
    pub email: String,
    pub display_name: String,
}

/// Upsert/select access to users and their refresh tokens.
///
/// The stored refresh token is treated as an opaque string; protecting it at
/// rest is the backend's concern.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert or update a user keyed by google_id; the internal id is stable
    /// across upserts.
    async fn upsert_user(
        &self,
        google_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserRecord, StoreError>;

    /// Look up a user by internal id.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert or replace the stored refresh token for a user.
    async fn upsert_refresh_token(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError>;

    /// Fetch the stored refresh token for a user.
    async fn refresh_token(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}
