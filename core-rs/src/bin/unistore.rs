//! unistore CLI
//!
//! Thin wrapper that builds a filesystem-backed engine and serves it over
//! HTTP (spec §6.3).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use unistore::{Driver, FileSystemDriver, StorageEngine};

#[derive(Parser)]
#[command(name = "unistore")]
#[command(version = unistore::VERSION)]
#[command(about = "Unified key-value storage, served over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a directory over HTTP (the default command)
    Serve {
        /// Directory to serve
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Directory to serve (overrides the positional argument)
        #[arg(long)]
        dir_flag: Option<PathBuf>,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let (dir, port) = match cli.command {
        Some(Commands::Serve { dir, dir_flag, port }) => (dir_flag.unwrap_or(dir), port),
        None => (PathBuf::from("."), 8080),
    };

    if let Err(e) = run(dir, port).await {
        tracing::error!(error = %e, "unistore exited with an error");
        std::process::exit(1);
    }
}

async fn run(dir: PathBuf, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let dir = dir.canonicalize()?;
    tracing::info!(dir = %dir.display(), port, "starting unistore");

    let driver: Arc<dyn Driver> = Arc::new(FileSystemDriver::new(dir));
    let engine = StorageEngine::new(driver);

    let state = unistore::http::AppState { engine, auth: None, resolver: None };
    let router = unistore::http::build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
