// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketplace command-line client
//!
//! Logs in against the marketplace API, keeps the session in a token file,
//! and issues authenticated requests through the session manager.

use anyhow::Context;
use clap::{Parser, Subcommand};
use marketplace_client::{
    config::ClientConfig,
    models::{ApiRequest, PasswordChangeData},
    services::{AuthApi, FileTokenStore, SessionManager},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "marketplace-client", about = "Service marketplace API client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the token pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MARKETPLACE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in identity
    Whoami,
    /// Show whether a session is held, without contacting the server
    Status,
    /// GET a protected API path and print the body
    Get { path: String },
    /// Change the account password
    ChangePassword {
        #[arg(long, env = "MARKETPLACE_PASSWORD", hide_env_values = true)]
        current: String,
        #[arg(long, env = "MARKETPLACE_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!(api = %config.api_base_url, "Starting marketplace client");

    let store = FileTokenStore::new(config.token_file.clone());
    let token_file = store.path().to_path_buf();
    let session = SessionManager::new(config, store)?;

    if let Command::Logout = cli.command {
        session.logout();
        println!("Logged out");
        return Ok(());
    }

    session.initialize().await;

    match cli.command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Logged in as {} ({:?})", user.display_name(), user.role);
        }
        Command::Whoami => {
            let user = AuthApi::new(session.clone()).current_user().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Status => {
            let state = session.auth_state();
            match state.user {
                Some(user) if state.is_authenticated => {
                    println!("Authenticated as {} ({:?})", user.email, user.role)
                }
                _ if state.is_authenticated => println!("Authenticated"),
                _ => println!("Not logged in"),
            }
            println!("Token file: {}", token_file.display());
        }
        Command::Get { path } => {
            let response = session.dispatch(ApiRequest::get(path)).await?;
            println!("{}", response.text());
        }
        Command::ChangePassword { current, new } => {
            AuthApi::new(session.clone())
                .change_password(&PasswordChangeData {
                    current_password: current,
                    new_password: new,
                })
                .await?;
            println!("Password changed");
        }
        Command::Logout => {}
    }

    Ok(())
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("marketplace_client=info,warn"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
