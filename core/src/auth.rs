//! Authentication client for the remote service.
//!
//! Each call is a single request/response round trip; there are no retries
//! and no caching. Token-carrying calls read the bearer token from the
//! shared [`CredentialStore`] at call time.

use crate::credentials::CredentialStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record issued by the remote service.
///
/// `id`, `email` and `username` are immutable once issued; the optional
/// profile fields change only through [`AuthApi::update_profile`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

/// Partial profile update; absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// The service answered with a non-success status.
    #[error("{0}")]
    Rejected(String),
    /// A token-requiring call was made with no stored token.
    #[error("No token found")]
    MissingToken,
    /// The transport itself failed (DNS, refused connection, timeout).
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Error body shape of the auth endpoints.
#[derive(Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
}

/// The auth operations the session controller depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AuthError>;
    async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, AuthError>;
    async fn get_profile(&self) -> Result<User, AuthError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError>;
    /// Purely local: clears the stored token and cached user.
    fn logout(&self);
    /// True iff a token is currently stored. No network validation.
    fn is_authenticated(&self) -> bool;
}

/// HTTP implementation of [`AuthApi`].
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
}

impl AuthClient {
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

    fn stored_token(&self) -> Result<String, AuthError> {
        self.credentials.token().ok_or(AuthError::MissingToken)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<T, AuthError> {
        if !response.status().is_success() {
            return Err(AuthError::Rejected(
                Self::detail_message(response, fallback).await,
            ));
        }
        Ok(response.json().await?)
    }

    /// Prefers the server-supplied `detail` message, falling back to the
    /// per-operation message when the body has none.
    async fn detail_message(response: reqwest::Response, fallback: &str) -> String {
        response
            .json::<ErrorDetail>()
            .await
            .ok()
            .and_then(|body| body.detail)
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let response = self
            .http
            .post(self.endpoint("/auth/login"))
            .json(credentials)
            .send()
            .await?;
        Self::parse(response, "Login failed").await
    }

    async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let response = self
            .http
            .post(self.endpoint("/auth/register"))
            .json(data)
            .send()
            .await?;
        Self::parse(response, "Registration failed").await
    }

    async fn get_profile(&self) -> Result<User, AuthError> {
        let token = self.stored_token()?;
        let response = self
            .http
            .get(self.endpoint("/auth/profile"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse(response, "Failed to get profile").await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        let token = self.stored_token()?;
        let response = self
            .http
            .patch(self.endpoint("/auth/profile"))
            .bearer_auth(token)
            .json(update)
            .send()
            .await?;
        Self::parse(response, "Failed to update profile").await
    }

    fn logout(&self) {
        self.credentials.clear();
    }

    fn is_authenticated(&self) -> bool {
        self.credentials.token().is_some()
    }
}

/// Offline [`AuthApi`] with a single known account, for smoke runs and demos.
///
/// Mirrors the remote contract closely enough to drive the session
/// controller end to end: profile calls validate the stored token, logout
/// clears the shared store.
pub struct FakeAuthApi {
    credentials: CredentialStore,
    user: parking_lot::Mutex<User>,
    password: String,
    token: String,
}

impl FakeAuthApi {
    pub fn new(credentials: CredentialStore, user: User, password: impl Into<String>) -> Self {
        Self {
            credentials,
            user: parking_lot::Mutex::new(user),
            password: password.into(),
            token: "fake-session-token".to_string(),
        }
    }

    fn auth_response(&self) -> AuthResponse {
        AuthResponse {
            access_token: self.token.clone(),
            token_type: "bearer".to_string(),
            user: self.user.lock().clone(),
        }
    }

    fn validate_token(&self) -> Result<(), AuthError> {
        let token = self.credentials.token().ok_or(AuthError::MissingToken)?;
        if token != self.token {
            return Err(AuthError::Rejected(
                "Could not validate credentials".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let known = self.user.lock().email.clone();
        if credentials.email != known || credentials.password != self.password {
            return Err(AuthError::Rejected(
                "Incorrect email or password".to_string(),
            ));
        }
        Ok(self.auth_response())
    }

    async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        {
            let mut user = self.user.lock();
            user.email = data.email.clone();
            user.username = data.username.clone();
        }
        Ok(self.auth_response())
    }

    async fn get_profile(&self) -> Result<User, AuthError> {
        self.validate_token()?;
        Ok(self.user.lock().clone())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        self.validate_token()?;
        let mut user = self.user.lock();
        if let Some(full_name) = &update.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(age) = update.age {
            user.age = Some(age);
        }
        if let Some(gender) = &update.gender {
            user.gender = Some(gender.clone());
        }
        if let Some(blood_type) = &update.blood_type {
            user.blood_type = Some(blood_type.clone());
        }
        Ok(user.clone())
    }

    fn logout(&self) {
        self.credentials.clear();
    }

    fn is_authenticated(&self) -> bool {
        self.credentials.token().is_some()
    }
}
