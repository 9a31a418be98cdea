//! Queue server binary
//!
//! Run with: cargo run -p callback-queue --bin callback-queue-server -- --config queue.toml

use callback_queue::{config::QueueConfig, server::QueueServer};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "callback-queue-server", version, about = "Durable job queue with callback delivery")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides config and QUEUE_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callback_queue=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration: file, then environment, then command line
    let mut config = match &cli.config {
        Some(path) => QueueConfig::from_file(path)?,
        None => QueueConfig::default(),
    };
    config.apply_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db) = cli.db {
        config.storage.path = db;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.path.display());
    tracing::info!("  - Callbacks: {}", if config.processing.deliver_callbacks { "enabled" } else { "disabled" });
    tracing::info!("  - Max attempts: {}", config.retry.max_attempts);

    let server = QueueServer::new(config)?;

    println!("\nServer starting...");
    println!("  Health: http://{}/", server.address());
    println!("\nEndpoints:");
    println!("  POST   /queue        - Submit a job");
    println!("  GET    /queue        - List jobs (?status=pending|processing|completed|failed)");
    println!("  GET    /queue/:id    - Get a job");
    println!("  DELETE /queue/:id    - Remove a job");
    println!("  GET    /queue/stats  - Queue statistics");
    println!("  POST   /queue/retry  - Requeue failed jobs");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
