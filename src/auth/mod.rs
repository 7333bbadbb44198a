//! Google OAuth credential handling.
//!
//! Tokens never appear in logs in full; use [`truncated`] when one has to be
//! mentioned at all.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::store::{StoreError, UserStore};

/// OAuth scopes requested at login.
pub const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/drive",
];

/// Credential errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No stored credential for user")]
    NoStoredCredential,
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Google OAuth application settings.
#[derive(Debug, Clone)]
pub struct GoogleAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl GoogleAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: callback_url.into(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = url.into();
        self
    }
}

/// Tokens returned by the code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Basic profile from the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Seam the loop fetches access tokens through.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// A currently valid access token for the user, refreshed on demand.
    async fn access_token(&self, user_id: &str) -> Result<String, CredentialError>;
}

/// Refresh-token based credential provider backed by the user store.
pub struct CredentialProvider {
    config: GoogleAuthConfig,
    store: Arc<dyn UserStore>,
    client: Client,
}

impl CredentialProvider {
    pub fn new(config: GoogleAuthConfig, store: Arc<dyn UserStore>) -> Self {
        Self {
            config,
            store,
            client: Client::new(),
        }
    }

    /// Consent URL the login route redirects to.
    pub fn authorization_url(&self) -> String {
        let scopes = OAUTH_SCOPES.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&include_granted_scopes=true&prompt=consent",
            self.config.auth_url,
            urlencode(&self.config.client_id),
            urlencode(&self.config.callback_url),
            urlencode(&scopes),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenBundle, CredentialError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let mut detail = response.text().await.unwrap_or_default();
            detail.truncate(200);
            return Err(CredentialError::ExchangeFailed(detail));
        }

        Ok(response.json::<TokenBundle>().await?)
    }

    /// Fetch the user's profile with a fresh access token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, CredentialError> {
        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CredentialError::ExchangeFailed(format!(
                "userinfo returned {}",
                response.status()
            )));
        }

        Ok(response.json::<UserProfile>().await?)
    }
}

#[async_trait]
impl CredentialSource for CredentialProvider {
    async fn access_token(&self, user_id: &str) -> Result<String, CredentialError> {
        let refresh_token = self
            .store
            .refresh_token(user_id)
            .await?
            .ok_or(CredentialError::NoStoredCredential)?;

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let mut detail = response.text().await.unwrap_or_default();
            detail.truncate(200);
            return Err(CredentialError::RefreshFailed(detail));
        }

        let tokens: RefreshResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::RefreshFailed(e.to_string()))?;

        tracing::debug!(
            user_id,
            token = %truncated(&tokens.access_token),
            "Refreshed access token"
        );

        Ok(tokens.access_token)
    }
}

/// First characters of a token for logging; never the whole thing.
pub fn truncated(token: &str) -> String {
    let head: String = token.chars().take(10).collect();
    format!("{head}…")
}

/// Minimal percent-encoding for query components.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_authorization_url_carries_scopes_and_offline_access() {
        let provider = CredentialProvider::new(
            GoogleAuthConfig::new("cid", "secret", "http://localhost:5000/auth/google/callback"),
            Arc::new(MemoryStore::new()),
        );
        let url = provider.authorization_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?client_id=cid"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("gmail.send"));
        assert!(url.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn test_access_token_without_stored_credential() {
        let provider = CredentialProvider::new(
            GoogleAuthConfig::new("cid", "secret", "http://localhost/cb"),
            Arc::new(MemoryStore::new()),
        );
        let err = provider.access_token("unknown-user").await.unwrap_err();
        assert!(matches!(err, CredentialError::NoStoredCredential));
    }

    #[test]
    fn test_truncated_never_exposes_full_token() {
        let token = "ya29.a0AfH6SMBxxxxxxxxxxxxxxxxxxxx";
        let shown = truncated(token);
        assert!(shown.len() < token.len());
        assert!(!shown.contains("SMBxxxx"));
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("a b/c"), "a%20b%2Fc");
        assert_eq!(urlencode("safe-._~"), "safe-._~");
    }
}
