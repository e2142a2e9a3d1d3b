//! Fail-soft store for the bearer token and the cached user profile.

use crate::auth::User;
use crate::storage::KeyValueStorage;
use std::sync::Arc;
use tracing::warn;

const TOKEN_KEY: &str = "auth_token";
const USER_KEY: &str = "user_data";

/// Shared handle to the two persisted credential entries.
///
/// Every operation absorbs storage faults: reads surface as absence, writes
/// are dropped with a warning. Callers must not assume a write succeeded —
/// the store is re-derived from the token and a profile fetch at next
/// startup.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                warn!(%err, "failed to read stored token");
                None
            }
        }
    }

    pub fn set_token(&self, token: &str) {
        if let Err(err) = self.storage.set(TOKEN_KEY, token) {
            warn!(%err, "failed to persist token");
        }
    }

    pub fn remove_token(&self) {
        if let Err(err) = self.storage.delete(TOKEN_KEY) {
            warn!(%err, "failed to remove stored token");
        }
    }

    /// Reads the cached user record, discarding it if it no longer parses.
    pub fn user(&self) -> Option<User> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(%err, "failed to read cached user");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(%err, "cached user record is corrupt, clearing it");
                self.remove_user();
                None
            }
        }
    }

    pub fn set_user(&self, user: &User) {
        let serialized = match serde_json::to_string(user) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(%err, "failed to serialize user record");
                return;
            }
        };
        if let Err(err) = self.storage.set(USER_KEY, &serialized) {
            warn!(%err, "failed to persist user record");
        }
    }

    pub fn remove_user(&self) {
        if let Err(err) = self.storage.delete(USER_KEY) {
            warn!(%err, "failed to remove cached user");
        }
    }

    /// Clears both entries.
    pub fn clear(&self) {
        self.remove_token();
        self.remove_user();
    }
}
