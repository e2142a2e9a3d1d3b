use async_trait::async_trait;
use sana_core::auth::{
    AuthApi, AuthError, AuthResponse, FakeAuthApi, LoginRequest, ProfileUpdate, RegisterRequest,
    User,
};
use sana_core::credentials::CredentialStore;
use sana_core::session::SessionController;
use sana_core::storage::{FileStorage, MemoryStorage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn sample_user() -> User {
    serde_json::from_value(serde_json::json!({
        "id": 1,
        "email": "ana@example.com",
        "username": "ana",
        "is_active": true,
        "is_verified": true,
        "created_at": "2025-06-01T08:30:00Z"
    }))
    .expect("sample user")
}

fn auth_response(user: &User) -> AuthResponse {
    serde_json::from_value(serde_json::json!({
        "access_token": "tok-abc",
        "token_type": "bearer",
        "user": serde_json::to_value(user).unwrap()
    }))
    .expect("auth response")
}

/// Scripted [`AuthApi`] whose outcomes are fixed up front; rejections are
/// stored as the message the server would have supplied. Token-requiring
/// calls honor the real precondition: with no stored token they fail with
/// `MissingToken` before counting as a remote call.
struct ScriptedAuthApi {
    credentials: CredentialStore,
    login_outcome: Result<AuthResponse, String>,
    register_outcome: Result<AuthResponse, String>,
    profile_outcome: Result<User, String>,
    update_outcome: Result<User, String>,
    profile_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl ScriptedAuthApi {
    fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials,
            login_outcome: Err("Login failed".to_string()),
            register_outcome: Err("Registration failed".to_string()),
            profile_outcome: Err("Failed to get profile".to_string()),
            update_outcome: Err("Failed to update profile".to_string()),
            profile_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    fn with_login(mut self, outcome: Result<AuthResponse, String>) -> Self {
        self.login_outcome = outcome;
        self
    }

    fn with_register(mut self, outcome: Result<AuthResponse, String>) -> Self {
        self.register_outcome = outcome;
        self
    }

    fn with_profile(mut self, outcome: Result<User, String>) -> Self {
        self.profile_outcome = outcome;
        self
    }

    fn with_update(mut self, outcome: Result<User, String>) -> Self {
        self.update_outcome = outcome;
        self
    }

    fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

fn materialize<T: Clone>(outcome: &Result<T, String>) -> Result<T, AuthError> {
    outcome
        .clone()
        .map_err(AuthError::Rejected)
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn login(&self, _credentials: &LoginRequest) -> Result<AuthResponse, AuthError> {
        materialize(&self.login_outcome)
    }

    async fn register(&self, _data: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        materialize(&self.register_outcome)
    }

    async fn get_profile(&self) -> Result<User, AuthError> {
        if self.credentials.token().is_none() {
            return Err(AuthError::MissingToken);
        }
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        materialize(&self.profile_outcome)
    }

    async fn update_profile(&self, _update: &ProfileUpdate) -> Result<User, AuthError> {
        if self.credentials.token().is_none() {
            return Err(AuthError::MissingToken);
        }
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        materialize(&self.update_outcome)
    }

    fn logout(&self) {
        self.credentials.clear();
    }

    fn is_authenticated(&self) -> bool {
        self.credentials.token().is_some()
    }
}

struct Harness {
    controller: SessionController,
    credentials: CredentialStore,
    auth: Arc<ScriptedAuthApi>,
}

fn harness(build: impl FnOnce(ScriptedAuthApi) -> ScriptedAuthApi) -> Harness {
    let credentials = CredentialStore::new(Arc::new(MemoryStorage::new()));
    let auth = Arc::new(build(ScriptedAuthApi::new(credentials.clone())));
    let controller = SessionController::new(auth.clone(), credentials.clone());
    Harness {
        controller,
        credentials,
        auth,
    }
}

#[test]
fn restore_without_token_is_unauthenticated() {
    let runtime = test_runtime();
    let h = harness(|auth| auth);
    // A stale cached user without a token must not resurrect a session.
    h.credentials.set_user(&sample_user());

    let state = runtime.block_on(h.controller.restore());

    assert!(!state.authenticated);
    assert!(state.user.is_none());
    assert!(!state.loading);
    assert_eq!(h.auth.profile_calls(), 0);
}

#[test]
fn restore_with_cached_user_skips_profile_fetch() {
    let runtime = test_runtime();
    let user = sample_user();
    let h = harness(|auth| auth);
    h.credentials.set_token("tok-abc");
    h.credentials.set_user(&user);

    let state = runtime.block_on(h.controller.restore());

    assert!(state.authenticated);
    assert_eq!(state.user, Some(user));
    assert_eq!(h.auth.profile_calls(), 0);
}

#[test]
fn restore_fetches_profile_when_cache_is_missing() {
    let runtime = test_runtime();
    let user = sample_user();
    let h = harness(|auth| auth.with_profile(Ok(sample_user())));
    h.credentials.set_token("tok-abc");

    let state = runtime.block_on(h.controller.restore());

    assert!(state.authenticated);
    assert_eq!(state.user, Some(user.clone()));
    assert_eq!(h.auth.profile_calls(), 1);
    // The fetched profile is now cached for the next startup.
    assert_eq!(h.credentials.user(), Some(user));
}

#[test]
fn restore_clears_credentials_when_token_is_rejected() {
    let runtime = test_runtime();
    let h = harness(|auth| auth.with_profile(Err("Could not validate credentials".to_string())));
    h.credentials.set_token("tok-expired");

    let state = runtime.block_on(h.controller.restore());

    assert!(!state.authenticated);
    assert!(state.user.is_none());
    assert!(h.credentials.token().is_none());
    assert!(h.credentials.user().is_none());
}

#[test]
fn login_success_persists_token_and_user() {
    let runtime = test_runtime();
    let user = sample_user();
    let h = harness(|auth| auth.with_login(Ok(auth_response(&sample_user()))));

    let logged_in = runtime
        .block_on(h.controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        }))
        .expect("login");

    assert_eq!(logged_in, user);
    assert!(h.controller.is_authenticated());
    assert!(!h.controller.is_loading());
    assert_eq!(h.credentials.token().as_deref(), Some("tok-abc"));
    assert_eq!(h.credentials.user(), Some(user));
}

#[test]
fn login_rejection_propagates_server_detail() {
    let runtime = test_runtime();
    let h = harness(|auth| auth.with_login(Err("Incorrect email or password".to_string())));

    let err = runtime
        .block_on(h.controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "wrong".to_string(),
        }))
        .expect_err("rejected login");

    assert_eq!(err.to_string(), "Incorrect email or password");
    assert!(!h.controller.is_authenticated());
    assert!(h.controller.current_user().is_none());
    assert!(!h.controller.is_loading());
    assert!(h.credentials.token().is_none());
}

#[test]
fn register_success_persists_token_and_user() {
    let runtime = test_runtime();
    let user = sample_user();
    let h = harness(|auth| auth.with_register(Ok(auth_response(&sample_user()))));

    runtime
        .block_on(h.controller.register(RegisterRequest {
            email: "ana@example.com".to_string(),
            username: "ana".to_string(),
            password: "secret".to_string(),
        }))
        .expect("register");

    assert!(h.controller.is_authenticated());
    assert_eq!(h.credentials.user(), Some(user));
}

#[test]
fn logout_clears_state_and_store() {
    let runtime = test_runtime();
    let h = harness(|auth| auth.with_login(Ok(auth_response(&sample_user()))));

    runtime
        .block_on(h.controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        }))
        .expect("login");
    runtime.block_on(h.controller.logout());

    assert!(!h.controller.is_authenticated());
    assert!(h.controller.current_user().is_none());
    assert!(h.credentials.token().is_none());
    assert!(h.credentials.user().is_none());
}

#[test]
fn update_profile_persists_returned_record() {
    let runtime = test_runtime();
    let mut updated = sample_user();
    updated.age = Some(31);
    let h = harness(|auth| {
        auth.with_login(Ok(auth_response(&sample_user())))
            .with_update(Ok(updated.clone()))
    });

    runtime
        .block_on(h.controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        }))
        .expect("login");
    let user = runtime
        .block_on(h.controller.update_profile(ProfileUpdate {
            age: Some(31),
            ..Default::default()
        }))
        .expect("update");

    assert_eq!(user.age, Some(31));
    assert_eq!(h.controller.current_user().and_then(|u| u.age), Some(31));
    assert_eq!(h.credentials.user().and_then(|u| u.age), Some(31));
}

#[test]
fn update_profile_without_token_fails_before_any_remote_call() {
    let runtime = test_runtime();
    let h = harness(|auth| auth.with_update(Ok(sample_user())));

    let err = runtime
        .block_on(h.controller.update_profile(ProfileUpdate {
            age: Some(31),
            ..Default::default()
        }))
        .expect_err("no token");

    assert_eq!(err.to_string(), "No token found");
    assert_eq!(h.auth.update_calls(), 0);
}

#[test]
fn update_profile_failure_leaves_state_unchanged() {
    let runtime = test_runtime();
    let h = harness(|auth| {
        auth.with_login(Ok(auth_response(&sample_user())))
            .with_update(Err("Failed to update profile".to_string()))
    });

    runtime
        .block_on(h.controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        }))
        .expect("login");
    let before = h.controller.current_user();

    let err = runtime
        .block_on(h.controller.update_profile(ProfileUpdate {
            age: Some(31),
            ..Default::default()
        }))
        .expect_err("rejected update");

    assert_eq!(err.to_string(), "Failed to update profile");
    assert!(h.controller.is_authenticated());
    assert_eq!(h.controller.current_user(), before);
}

#[test]
fn refresh_profile_logs_out_on_rejected_token() {
    let runtime = test_runtime();
    let h = harness(|auth| {
        auth.with_login(Ok(auth_response(&sample_user())))
            .with_profile(Err("Could not validate credentials".to_string()))
    });

    runtime
        .block_on(h.controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        }))
        .expect("login");
    runtime
        .block_on(h.controller.refresh_profile())
        .expect_err("revoked session");

    assert!(!h.controller.is_authenticated());
    assert!(h.credentials.token().is_none());
}

/// [`AuthApi`] wrapper that panics if two mutating calls ever overlap.
struct OverlapDetector<A> {
    inner: A,
    in_flight: Arc<AtomicBool>,
}

impl<A> OverlapDetector<A> {
    fn new(inner: A) -> Self {
        Self {
            inner,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    fn enter(&self) {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "two session operations ran concurrently"
        );
    }

    fn exit(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl<A: AuthApi> AuthApi for OverlapDetector<A> {
    async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, AuthError> {
        self.enter();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let result = self.inner.login(credentials).await;
        self.exit();
        result
    }

    async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        self.enter();
        let result = self.inner.register(data).await;
        self.exit();
        result
    }

    async fn get_profile(&self) -> Result<User, AuthError> {
        self.enter();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let result = self.inner.get_profile().await;
        self.exit();
        result
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, AuthError> {
        self.enter();
        let result = self.inner.update_profile(update).await;
        self.exit();
        result
    }

    fn logout(&self) {
        self.inner.logout();
    }

    fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }
}

#[test]
fn mutating_operations_are_serialized() {
    let runtime = test_runtime();
    let credentials = CredentialStore::new(Arc::new(MemoryStorage::new()));
    let scripted = ScriptedAuthApi::new(credentials.clone())
        .with_login(Ok(auth_response(&sample_user())))
        .with_profile(Ok(sample_user()));
    let auth = Arc::new(OverlapDetector::new(scripted));
    let controller = SessionController::new(auth, credentials.clone());
    credentials.set_token("tok-abc");

    runtime.block_on(async {
        let login = controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        });
        let refresh = controller.refresh_profile();
        let (login, refresh) = tokio::join!(login, refresh);
        login.expect("login");
        refresh.expect("refresh");
    });
}

#[test]
fn session_survives_a_restart_on_durable_storage() {
    let runtime = test_runtime();
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let credentials = CredentialStore::new(Arc::new(FileStorage::new(
        temp_dir.path().to_path_buf(),
    )));
    let auth = Arc::new(FakeAuthApi::new(
        credentials.clone(),
        sample_user(),
        "secret",
    ));
    let controller = SessionController::new(auth.clone(), credentials.clone());

    runtime
        .block_on(controller.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "secret".to_string(),
        }))
        .expect("login");

    // A fresh store and controller over the same directory stand in for a
    // process relaunch.
    let credentials = CredentialStore::new(Arc::new(FileStorage::new(
        temp_dir.path().to_path_buf(),
    )));
    let auth = Arc::new(FakeAuthApi::new(
        credentials.clone(),
        sample_user(),
        "secret",
    ));
    let relaunched = SessionController::new(auth, credentials);
    let state = runtime.block_on(relaunched.restore());
    assert!(state.authenticated);
    assert_eq!(state.user.map(|u| u.email), Some("ana@example.com".to_string()));
}
