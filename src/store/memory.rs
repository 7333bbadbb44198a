//! In-memory store implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, UserRecord, UserStore};

/// HashMap-backed store for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Keyed by internal user id.
    users: RwLock<HashMap<String, UserRecord>>,
    /// Keyed by internal user id.
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(
        &self,
        google_id: &str,
        email: &str,
        display_name: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;

        if let Some(existing) = users.values_mut().find(|u| u.google_id == google_id) {
            existing.email = email.to_string();
            existing.display_name = display_name.to_string();
            return Ok(existing.clone());
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            google_id: google_id.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
        };
        users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn upsert_refresh_token(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        self.tokens
            .write()
            .await
            .insert(user_id.to_string(), refresh_token.to_string());
        Ok(())
    }

    async fn refresh_token(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tokens.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_user_is_stable_across_updates() {
        let store = MemoryStore::new();
        let first = store
            .upsert_user("g-1", "a@b.com", "Alice")
            .await
            .unwrap();
        let second = store
            .upsert_user("g-1", "a@new.com", "Alice B")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "a@new.com");

        let found = store.find_user(&first.id).await.unwrap().unwrap();
        assert_eq!(found.display_name, "Alice B");
    }

    #[tokio::test]
    async fn test_refresh_token_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.refresh_token("u-1").await.unwrap(), None);

        store.upsert_refresh_token("u-1", "rt-old").await.unwrap();
        store.upsert_refresh_token("u-1", "rt-new").await.unwrap();
        assert_eq!(
            store.refresh_token("u-1").await.unwrap().as_deref(),
            Some("rt-new")
        );
    }
}
