//! Curator Archive - Binary Entry Point
//!
//! Serves the lifecycle HTTP API or runs a single export, stats, import or
//! prune against the configured data directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator_archive::api::{create_router, AppState};
use curator_archive::lifecycle::{DataLifecycle, ImportSource};
use curator_archive::types::ArchivePolicy;
use curator_archive::LifecycleConfig;

/// Command-line arguments for curator-archive
#[derive(Parser, Debug)]
#[command(name = "curator-archive")]
#[command(about = "Backup, archive and import for the curator tracker")]
#[command(version)]
struct Args {
    /// Data directory (defaults to $CURATOR_DATA_DIR, then ./data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Archive policy: latest-wins or first-wins (defaults to $CURATOR_ARCHIVE_POLICY)
    #[arg(long, global = true)]
    archive_policy: Option<ArchivePolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5750", env = "CURATOR_PORT")]
        port: u16,
    },
    /// Export the live dataset to a new snapshot
    Export,
    /// Print backup directory statistics
    Stats,
    /// Merge a snapshot into the live store
    Import {
        /// Snapshot file to import (defaults to the newest snapshot)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Delete all but the newest snapshots
    Prune {
        /// Number of snapshots to keep
        #[arg(short, long, default_value = "10")]
        keep: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator_archive=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = LifecycleConfig::from_env();
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(policy) = args.archive_policy {
        config = config.with_archive_policy(policy);
    }

    info!("Data directory: {}", config.data_dir().display());

    let lifecycle = DataLifecycle::open(config).context("Failed to open data directory")?;

    match args.command {
        Command::Serve { port } => serve(Arc::new(lifecycle), port).await,
        Command::Export => {
            let exported = lifecycle.export_all_data().context("Export failed")?;
            print_json(&exported)
        }
        Command::Stats => {
            let stats = lifecycle.backup_stats().context("Failed to collect stats")?;
            print_json(&stats)
        }
        Command::Import { file } => {
            let source = file.map(ImportSource::File).unwrap_or(ImportSource::Latest);
            let report = lifecycle.import_from(source).context("Import failed")?;
            print_json(&report)
        }
        Command::Prune { keep } => {
            let removed = lifecycle.backups().prune(keep).context("Prune failed")?;
            print_json(&removed)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(lifecycle: Arc<DataLifecycle>, port: u16) -> Result<()> {
    let app = create_router(Arc::new(AppState::new(lifecycle)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
