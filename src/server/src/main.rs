//! Player Server Daemon
//!
//! Runs the status endpoint until interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use player_server::{config::Config, Server};

/// Player status server
#[derive(Parser)]
#[command(name = "player-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/player/player.conf")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error) [default: from config]
    #[arg(short, long)]
    log_level: Option<String>,

    /// Interface to bind [default: from config]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on [default: from config]
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server until Ctrl+C / SIGTERM
    Start,

    /// Print the resolved configuration
    Config,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    FmtSubscriber::builder()
        .with_max_level(parse_level(&config.logging.level))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    if cli.config.exists() {
        info!("Configuration file: {}", cli.config.display());
    } else {
        tracing::warn!(
            "Configuration file not found: {}, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        None | Some(Commands::Start) => run(config).await,
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let server = Server::new(config.server);

    if let Err(e) = server.start().await {
        if e.io_kind() == Some(std::io::ErrorKind::AddrInUse) {
            tracing::error!(
                "Port {} is already in use, choose another with --port",
                server.config().port
            );
        }
        return Err(e).context("Failed to start player server");
    }

    if let Some(addr) = server.api().await.and_then(|api| api.local_addr()) {
        info!("Player server listening on http://{}", addr);
    }

    shutdown_signal().await;
    info!("Shutting down...");

    server
        .stop()
        .await
        .context("Failed to stop player server")?;

    info!("Goodbye.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
