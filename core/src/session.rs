//! In-memory session state and its lifecycle.

use crate::auth::{AuthApi, AuthError, LoginRequest, ProfileUpdate, RegisterRequest, User};
use crate::credentials::CredentialStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Snapshot of the authentication state.
///
/// Invariant: `authenticated` implies `user.is_some()`. While `loading` is
/// true the authenticated/unauthenticated determination is not final and
/// callers must not act on it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub user: Option<User>,
    pub authenticated: bool,
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            authenticated: false,
            loading: true,
        }
    }
}

/// Owns the session and reconciles it with the credential store and the
/// auth API.
///
/// Cloneable handle meant to be created once by the application root and
/// passed down; no process-wide singleton. Mutating operations are
/// serialized through an async guard, so at most one executes at a time.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<RwLock<SessionState>>,
    op_guard: Arc<Mutex<()>>,
    auth: Arc<dyn AuthApi>,
    credentials: CredentialStore,
}

impl SessionController {
    pub fn new(auth: Arc<dyn AuthApi>, credentials: CredentialStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionState::default())),
            op_guard: Arc::new(Mutex::new(())),
            auth,
            credentials,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.inner.read().loading
    }

    /// Startup reconciliation; the application root runs this once before
    /// acting on the session.
    ///
    /// A stored token with a cached user authenticates straight from the
    /// cache, without revalidating against the server. Only when the cache
    /// is missing is the profile fetched; a rejected fetch clears the stored
    /// token entirely. Never fails: every outcome lands in a definite
    /// authenticated or unauthenticated state.
    pub async fn restore(&self) -> SessionState {
        let _guard = self.op_guard.lock().await;
        self.set_loading(true);

        match self.credentials.token() {
            None => {
                info!("no stored token, starting unauthenticated");
                self.clear_user();
            }
            Some(_) => match self.credentials.user() {
                Some(user) => {
                    info!(user = %user.email, "restored session from cached profile");
                    self.apply_user(user);
                }
                None => match self.auth.get_profile().await {
                    Ok(profile) => {
                        info!(user = %profile.email, "restored session from fetched profile");
                        self.credentials.set_user(&profile);
                        self.apply_user(profile);
                    }
                    Err(err) => {
                        warn!(%err, "stored token rejected, clearing credentials");
                        self.auth.logout();
                        self.clear_user();
                    }
                },
            },
        }

        self.set_loading(false);
        self.state()
    }

    /// On success the returned token and user are persisted before the
    /// in-memory state flips to authenticated. On failure the state is left
    /// unauthenticated and the error propagates.
    pub async fn login(&self, credentials: LoginRequest) -> Result<User, AuthError> {
        let _guard = self.op_guard.lock().await;
        self.set_loading(true);
        let outcome = match self.auth.login(&credentials).await {
            Ok(response) => {
                self.persist_session(&response.access_token, &response.user);
                self.apply_user(response.user.clone());
                info!(user = %response.user.email, "logged in");
                Ok(response.user)
            }
            Err(err) => Err(err),
        };
        self.set_loading(false);
        outcome
    }

    pub async fn register(&self, data: RegisterRequest) -> Result<User, AuthError> {
        let _guard = self.op_guard.lock().await;
        self.set_loading(true);
        let outcome = match self.auth.register(&data).await {
            Ok(response) => {
                self.persist_session(&response.access_token, &response.user);
                self.apply_user(response.user.clone());
                info!(user = %response.user.email, "registered");
                Ok(response.user)
            }
            Err(err) => Err(err),
        };
        self.set_loading(false);
        outcome
    }

    /// Always lands unauthenticated with no user; the underlying credential
    /// clear is fail-soft.
    pub async fn logout(&self) {
        let _guard = self.op_guard.lock().await;
        self.set_loading(true);
        self.auth.logout();
        self.clear_user();
        self.set_loading(false);
        info!("logged out");
    }

    /// Persists the full server-returned record as the new cached user. On
    /// failure the current state is unchanged.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, AuthError> {
        let _guard = self.op_guard.lock().await;
        self.set_loading(true);
        let outcome = match self.auth.update_profile(&update).await {
            Ok(user) => {
                self.credentials.set_user(&user);
                self.apply_user(user.clone());
                Ok(user)
            }
            Err(err) => Err(err),
        };
        self.set_loading(false);
        outcome
    }

    /// On-demand revalidation of the cached session against the server.
    ///
    /// A rejected or missing token ends the session locally; a transport
    /// fault leaves the current state untouched, since it says nothing
    /// about token validity.
    pub async fn refresh_profile(&self) -> Result<User, AuthError> {
        let _guard = self.op_guard.lock().await;
        self.set_loading(true);
        let outcome = match self.auth.get_profile().await {
            Ok(profile) => {
                self.credentials.set_user(&profile);
                self.apply_user(profile.clone());
                Ok(profile)
            }
            Err(err @ AuthError::Transport(_)) => Err(err),
            Err(err) => {
                warn!(%err, "session no longer valid, clearing credentials");
                self.auth.logout();
                self.clear_user();
                Err(err)
            }
        };
        self.set_loading(false);
        outcome
    }

    fn persist_session(&self, token: &str, user: &User) {
        self.credentials.set_token(token);
        self.credentials.set_user(user);
    }

    fn apply_user(&self, user: User) {
        let mut state = self.inner.write();
        state.user = Some(user);
        state.authenticated = true;
    }

    fn clear_user(&self) {
        let mut state = self.inner.write();
        state.user = None;
        state.authenticated = false;
    }

    fn set_loading(&self, loading: bool) {
        self.inner.write().loading = loading;
    }
}
