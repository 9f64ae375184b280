// coursedesk-client/examples/session_cli.rs
// Drive a session against a running CourseDesk API
//
//   cargo run --example session_cli -- login admin@example.com secret
//   cargo run --example session_cli -- status
//   cargo run --example session_cli -- watch

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use coursedesk_client::{Credentials, SessionConfig, SessionManager, SessionState};

#[derive(Parser)]
#[command(name = "session_cli")]
#[command(about = "Sign in to CourseDesk and inspect the session")]
struct Cli {
    /// API base URL
    #[arg(long, env = "COURSEDESK_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session
    Login {
        email: String,
        #[arg(env = "COURSEDESK_PASSWORD")]
        password: String,
    },
    /// Show the persisted session
    Status,
    /// Force a token refresh
    Refresh,
    /// Sign out and clear the persisted session
    Logout,
    /// Keep the session alive and print every change
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursedesk_client=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = SessionConfig::from_env();
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    let session = SessionManager::connect(config).context("failed to set up session")?;

    match cli.command {
        Commands::Login { email, password } => {
            let outcome = session.login(&Credentials::new(email, password)).await;
            let (user, permissions) = outcome.into_result()?;
            println!("Signed in as {} ({})", user.email, user.role);
            for permission in permissions {
                println!("  {}", permission.name);
            }
        }
        Commands::Status => {
            session.initialize().await;
            print_snapshot(&session);
        }
        Commands::Refresh => {
            if session.initialize().await != SessionState::Authenticated {
                bail!("not signed in");
            }
            session.refresh().await?;
            println!("Token refreshed");
        }
        Commands::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        Commands::Watch => {
            if session.initialize().await != SessionState::Authenticated {
                bail!("not signed in");
            }
            let mut changes = session.subscribe();
            print_snapshot(&session);
            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        print_snapshot(&session);
                        if !session.is_authenticated() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

fn print_snapshot(session: &SessionManager) {
    let snapshot = session.snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to render session: {}", e),
    }
}
