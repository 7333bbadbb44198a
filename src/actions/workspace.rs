//! Gmail and Google Docs REST calls.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

/// Workspace API errors. Never carries the access token.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Stateless client for the user's mail and document APIs.
///
/// Base URLs are injectable so the endpoints can be pointed elsewhere
/// (tests, proxies); defaults are the public Google endpoints.
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    client: Client,
    gmail_base: String,
    docs_base: String,
}

impl Default for WorkspaceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            gmail_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            docs_base: "https://docs.googleapis.com/v1".to_string(),
        }
    }

    pub fn with_gmail_base(mut self, base: impl Into<String>) -> Self {
        self.gmail_base = base.into();
        self
    }

    pub fn with_docs_base(mut self, base: impl Into<String>) -> Self {
        self.docs_base = base.into();
        self
    }

    /// Send an email from the user's account.
    pub async fn send_gmail(
        &self,
        access_token: &str,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), WorkspaceError> {
        let raw = build_raw_email(recipient, subject, body);
        let url = format!("{}/users/me/messages/send", self.gmail_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;

        expect_success(response).await?;
        Ok(())
    }

    /// Create a document and insert the initial content. Returns the new
    /// document's id.
    pub async fn create_google_doc(
        &self,
        access_token: &str,
        title: &str,
        content: &str,
    ) -> Result<String, WorkspaceError> {
        let create_url = format!("{}/documents", self.docs_base);
        let response = self
            .client
            .post(&create_url)
            .bearer_auth(access_token)
            .json(&json!({ "title": title }))
            .send()
            .await?;

        let created: Value = expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| WorkspaceError::Parse(e.to_string()))?;
        let document_id = created
            .get("documentId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WorkspaceError::Parse("missing documentId".to_string()))?
            .to_string();

        if !content.is_empty() {
            let update_url = format!("{}/documents/{}:batchUpdate", self.docs_base, document_id);
            let response = self
                .client
                .post(&update_url)
                .bearer_auth(access_token)
                .json(&json!({
                    "requests": [{
                        "insertText": {
                            "location": { "index": 1 },
                            "text": content,
                        }
                    }]
                }))
                .send()
                .await?;
            expect_success(response).await?;
        }

        Ok(document_id)
    }
}

/// RFC 2822 message, base64url-encoded the way the Gmail API expects.
fn build_raw_email(recipient: &str, subject: &str, body: &str) -> String {
    let message = format!(
        "To: {recipient}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}"
    );
    URL_SAFE.encode(message.as_bytes())
}

/// Map a non-success status into an API error with a bounded detail string.
async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, WorkspaceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut detail = response.text().await.unwrap_or_default();
    detail.truncate(200);
    Err(WorkspaceError::Api {
        status: status.as_u16(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_raw_email_roundtrip() {
        let raw = build_raw_email("a@b.com", "Hi", "Hello there");
        let decoded = String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap();
        assert!(decoded.starts_with("To: a@b.com\r\nSubject: Hi\r\n"));
        assert!(decoded.ends_with("\r\n\r\nHello there"));
    }

    #[test]
    fn test_default_bases_point_at_google() {
        let client = WorkspaceClient::new();
        assert!(client.gmail_base.contains("gmail.googleapis.com"));
        assert!(client.docs_base.contains("docs.googleapis.com"));
    }
}
