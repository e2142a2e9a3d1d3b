pub mod auth;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod session;
pub mod storage;
pub mod telemetry;

pub use auth::{AuthApi, AuthClient, AuthError, LoginRequest, ProfileUpdate, RegisterRequest, User};
pub use chat::{ChatClient, ChatError};
pub use config::ApiSettings;
pub use credentials::CredentialStore;
pub use session::{SessionController, SessionState};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
