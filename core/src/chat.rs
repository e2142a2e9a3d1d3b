//! Chat API client.
//!
//! Sessions and messages are owned and ordered by the remote service; this
//! client holds no local copy and issues one fresh request per call. The
//! bearer token is read from the shared [`CredentialStore`] at request time,
//! so a logout takes effect on the next call.

use crate::credentials::CredentialStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSIONS_SKIP: u32 = 0;
pub const DEFAULT_SESSIONS_LIMIT: u32 = 20;

/// Server-side grouping of one user/assistant exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub message_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub content: String,
    pub is_user_message: bool,
    pub created_at: DateTime<Utc>,
    pub ai_model: Option<String>,
    pub processing_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
}

/// Both sides of the exchange, plus the (possibly new) owning session.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub user_message: ChatMessage,
    pub ai_message: ChatMessage,
    pub session: ChatSession,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<ChatSession>,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionHistory {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deleted {
    pub message: String,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    /// Non-success status; carries the raw body text, or `HTTP <status>`
    /// when the body is empty.
    #[error("{0}")]
    Rejected(String),
    #[error("chat request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

fn rejection_message(status: u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}

fn sessions_path(skip: u32, limit: u32) -> String {
    format!("/chat/sessions?skip={skip}&limit={limit}")
}

/// Stateless request/response wrapper around the chat endpoints.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
}

impl ChatClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer header when a token is stored. Requests without
    /// one still go out; the server answers with a rejection.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ChatError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Rejected(rejection_message(status, &body)));
        }
        Ok(response.json().await?)
    }

    /// Sends one user message. With no `session_id` the service creates a
    /// session and returns it in the response.
    pub async fn send_message(
        &self,
        message: impl Into<String>,
        session_id: Option<i64>,
    ) -> Result<ChatResponse, ChatError> {
        let body = ChatRequest {
            message: message.into(),
            session_id,
        };
        let response = self
            .authorize(self.http.post(self.endpoint("/chat/message")))
            .json(&body)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Offset/limit page of the caller's sessions, most recent first per the
    /// server's ordering.
    pub async fn sessions(&self, skip: u32, limit: u32) -> Result<SessionList, ChatError> {
        let response = self
            .authorize(self.http.get(self.endpoint(&sessions_path(skip, limit))))
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn recent_sessions(&self) -> Result<SessionList, ChatError> {
        self.sessions(DEFAULT_SESSIONS_SKIP, DEFAULT_SESSIONS_LIMIT)
            .await
    }

    pub async fn session_history(&self, session_id: i64) -> Result<SessionHistory, ChatError> {
        let response = self
            .authorize(
                self.http
                    .get(self.endpoint(&format!("/chat/sessions/{session_id}"))),
            )
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession, ChatError> {
        let response = self
            .authorize(self.http.post(self.endpoint("/chat/sessions")))
            .json(&CreateSessionRequest { title })
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn delete_session(&self, session_id: i64) -> Result<Deleted, ChatError> {
        let response = self
            .authorize(
                self.http
                    .delete(self.endpoint(&format!("/chat/sessions/{session_id}"))),
            )
            .send()
            .await?;
        Self::parse(response).await
    }
}
