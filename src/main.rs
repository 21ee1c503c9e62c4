//! Novalink - Single-Port SOCKS5 Relay and File Server
//!
//! This is the main entry point for the Novalink application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use novalink::client::{FileClient, DEFAULT_QUIET};
use novalink::config::{load_config, Config};
use novalink::server::run_server;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Novalink - SOCKS5 relay and file server sharing one port
#[derive(Parser, Debug)]
#[command(name = "novalink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server (default)
    Serve {
        /// Address to bind to
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory whose files are offered for download
        #[arg(long)]
        files_dir: Option<PathBuf>,
    },

    /// Print the file catalog of a server
    List {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:10101")]
        addr: String,
    },

    /// Download a file from a server
    Fetch {
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1:10101")]
        addr: String,

        /// Name of the file to download
        name: String,

        /// Where to write the file (defaults to its name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, args.json_log)?;

    let command = args.command.unwrap_or(Command::Serve {
        bind: None,
        port: None,
        files_dir: None,
    });

    match command {
        Command::Serve {
            bind,
            port,
            files_dir,
        } => {
            let mut config = match &args.config {
                Some(path) => {
                    let config = load_config(path)?;
                    info!("Configuration loaded from: {:?}", path);
                    config
                }
                None => Config::default(),
            };
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = files_dir {
                config.files.dir = dir;
            }
            serve(config).await
        }
        Command::List { addr } => {
            let (client, welcome) = FileClient::connect(&addr, DEFAULT_QUIET).await?;
            println!("{}", welcome.message);
            for name in &welcome.files {
                println!("{}", name);
            }
            client.close().await
        }
        Command::Fetch { addr, name, output } => {
            let (mut client, _) = FileClient::connect(&addr, DEFAULT_QUIET).await?;
            let data = client
                .fetch(&name)
                .await?
                .with_context(|| format!("Server has no file named {:?}", name))?;
            let path = output.unwrap_or_else(|| PathBuf::from(&name));
            tokio::fs::write(&path, &data)
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!("Saved {} bytes to {:?}", data.len(), path);
            client.close().await
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Novalink v{}", novalink::VERSION);
    info!("Listening address: {}", config.server.listen_addr());
    info!("Serving files from: {:?}", config.files.dir);

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C and termination signals (cross-platform)
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            info!("Received Ctrl+C, shutting down...");
                        }
                        _ = sigterm.recv() => {
                            info!("Received SIGTERM, shutting down...");
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to setup SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Received Ctrl+C, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            // On Windows, only handle Ctrl+C
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx_clone.send(true);
    });

    run_server(config, shutdown_rx).await
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
