//! pollchat terminal client
//!
//! Logs in (or registers), then drives the sync engine from stdin and prints
//! what the view controllers derive.

mod repl;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pollchat_core::{ChatClient, ClientConfig, RegisterRequest};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// pollchat terminal CLI
#[derive(Parser)]
#[command(name = "pollchat")]
#[command(about = "Poll-based messenger client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend host (overrides config.json)
    #[arg(long)]
    host: Option<String>,

    /// Backend port (overrides config.json)
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding config.json
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log into an existing account
    Login { email: String, password: String },

    /// Create an account and log into it
    Register {
        email: String,
        password: String,
        firstname: String,
        lastname: String,

        #[arg(long, default_value = "")]
        descr: String,
    },

    /// Write the effective configuration to config.json
    SaveConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pollchat=info,pollchat_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_dir = cli.config_dir.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pollchat")
    });

    let mut config = ClientConfig::load(&config_dir)
        .with_context(|| format!("loading config from {:?}", config_dir))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Starting pollchat v{} against {}", env!("CARGO_PKG_VERSION"), config.http_url());

    let client = ChatClient::new(config.clone())?;

    let session = match cli.command {
        Commands::SaveConfig => {
            config.save(&config_dir)?;
            println!("Saved {:?}", config_dir.join("config.json"));
            return Ok(());
        }
        Commands::Login { email, password } => client.login(&email, &password).await,
        Commands::Register {
            email,
            password,
            firstname,
            lastname,
            descr,
        } => {
            client
                .register(RegisterRequest {
                    email,
                    password,
                    firstname,
                    lastname,
                    descr,
                })
                .await
        }
    };

    if let Some(notice) = client.store().take_notice() {
        println!("! {}", notice);
    }
    let me = session?;
    println!("Logged in as {} <{}>", me.display_name(), me.email);

    repl::run(&client).await
}
