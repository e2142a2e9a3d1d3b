use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sana_core::auth::{FakeAuthApi, LoginRequest, ProfileUpdate, User};
use sana_core::credentials::CredentialStore;
use sana_core::session::SessionController;
use sana_core::storage::MemoryStorage;
use sana_core::telemetry;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Sana")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a lightweight smoke test that exercises the session lifecycle.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let credentials = CredentialStore::new(Arc::new(MemoryStorage::new()));
    let account = User {
        id: 1,
        email: "smoke@example.com".to_string(),
        username: "smoke".to_string(),
        is_active: true,
        is_verified: true,
        created_at: Utc::now(),
        full_name: None,
        age: None,
        gender: None,
        blood_type: None,
    };
    let auth = Arc::new(FakeAuthApi::new(credentials.clone(), account, "smoke-pass"));
    let controller = SessionController::new(auth, credentials.clone());

    runtime.block_on(async {
        controller.restore().await;
        anyhow::ensure!(!controller.is_authenticated(), "fresh store must start logged out");

        controller
            .login(LoginRequest {
                email: "smoke@example.com".to_string(),
                password: "smoke-pass".to_string(),
            })
            .await?;
        anyhow::ensure!(controller.is_authenticated(), "login must authenticate");

        let updated = controller
            .update_profile(ProfileUpdate {
                age: Some(42),
                ..Default::default()
            })
            .await?;
        anyhow::ensure!(updated.age == Some(42), "profile update must round-trip");

        controller.logout().await;
        anyhow::ensure!(credentials.token().is_none(), "logout must clear the token");
        Ok(())
    })?;

    info!("smoke test completed");
    Ok(())
}
