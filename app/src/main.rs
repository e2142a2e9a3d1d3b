mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sana_core::auth::AuthClient;
use sana_core::chat::ChatClient;
use sana_core::config::ApiSettings;
use sana_core::credentials::CredentialStore;
use sana_core::session::SessionController;
use sana_core::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use sana_core::telemetry;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sana", version, about = "Command-line client for the Sana health assistant")]
struct Cli {
    /// Keep credentials in memory only instead of the per-user store.
    #[arg(long)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and start a session.
    Register {
        email: String,
        username: String,
        password: String,
    },
    /// Log in with an existing account.
    Login { email: String, password: String },
    /// End the current session.
    Logout,
    /// Show the current session and profile.
    Whoami,
    /// Inspect or change the stored profile.
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Talk to the assistant and manage chat sessions.
    Chat {
        #[command(subcommand)]
        command: ChatCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Change profile fields; unspecified fields are left as they are.
    Update(ProfileUpdateArgs),
    /// Re-fetch the profile from the server, revalidating the session.
    Refresh,
}

#[derive(Args, Debug)]
struct ProfileUpdateArgs {
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long)]
    age: Option<u32>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    blood_type: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ChatCommand {
    /// Send a message; without --session the server opens a new session.
    Send {
        text: String,
        #[arg(long)]
        session: Option<i64>,
    },
    /// List your chat sessions.
    Sessions {
        #[arg(long, default_value_t = sana_core::chat::DEFAULT_SESSIONS_SKIP)]
        skip: u32,
        #[arg(long, default_value_t = sana_core::chat::DEFAULT_SESSIONS_LIMIT)]
        limit: u32,
    },
    /// Show the full message history of one session.
    History { session_id: i64 },
    /// Create an empty session.
    New {
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a session.
    Delete { session_id: i64 },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing(EnvFilter::from_default_env())?;

    let cli = Cli::parse();

    let settings = ApiSettings::load().map_err(|err| anyhow::anyhow!(err.user_message()))?;
    let storage: Arc<dyn KeyValueStorage> = if cli.ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(FileStorage::open_default()?)
    };
    let credentials = CredentialStore::new(storage);
    let http = reqwest::Client::new();
    let auth = Arc::new(AuthClient::new(
        http.clone(),
        settings.base_url.clone(),
        credentials.clone(),
    ));
    let chat = ChatClient::new(http, settings.base_url.clone(), credentials.clone());
    let controller = SessionController::new(auth, credentials);

    let runtime = Runtime::new()?;
    runtime.block_on(run(cli.command, controller, chat))
}

async fn run(command: Command, controller: SessionController, chat: ChatClient) -> Result<()> {
    // Mirror of the app-root startup: resolve the stored session before
    // acting on it.
    controller.restore().await;

    match command {
        Command::Register {
            email,
            username,
            password,
        } => commands::register(&controller, email, username, password).await,
        Command::Login { email, password } => commands::login(&controller, email, password).await,
        Command::Logout => commands::logout(&controller).await,
        Command::Whoami => commands::whoami(&controller),
        Command::Profile { command } => match command {
            ProfileCommand::Update(args) => {
                commands::update_profile(
                    &controller,
                    sana_core::auth::ProfileUpdate {
                        full_name: args.full_name,
                        age: args.age,
                        gender: args.gender,
                        blood_type: args.blood_type,
                    },
                )
                .await
            }
            ProfileCommand::Refresh => commands::refresh_profile(&controller).await,
        },
        Command::Chat { command } => match command {
            ChatCommand::Send { text, session } => commands::send_message(&chat, text, session).await,
            ChatCommand::Sessions { skip, limit } => commands::list_sessions(&chat, skip, limit).await,
            ChatCommand::History { session_id } => commands::session_history(&chat, session_id).await,
            ChatCommand::New { title } => commands::create_session(&chat, title.as_deref()).await,
            ChatCommand::Delete { session_id } => commands::delete_session(&chat, session_id).await,
        },
    }
}
