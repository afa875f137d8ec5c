use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fjob_storage::{MemoryJobStore, PgJobStore};
use fjob_sync::{pipeline_from_env, SyncConfig, SyncOutcome, SyncPipeline};
use fjob_web::ServeOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fjob-cli")]
#[command(about = "Fractional executive job ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every configured provider query once, then reconcile.
    Sync {
        /// Use an in-memory store instead of DATABASE_URL.
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply embedded database migrations.
    Migrate,
    /// Serve the sync trigger and webhook endpoints.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_logging() -> Result<()> {
    let fallback = std::env::var("FJOB_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&fallback)
            .with_context(|| format!("invalid log filter '{fallback}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing tracing subscriber: {err}"))
}

fn print_outcome(outcome: &SyncOutcome) {
    let stats = &outcome.stats;
    println!(
        "sync complete: success={} fetched={} fractional={} inserted={} updated={} skipped={} deactivated={}",
        outcome.success,
        stats.fetched,
        stats.fractional_filtered,
        stats.inserted,
        stats.updated,
        stats.skipped,
        stats.deactivated
    );
    println!("{}", outcome.message);
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging()?;
    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Sync { dry_run: false }) {
        Commands::Sync { dry_run } => {
            let pipeline = if dry_run {
                info!("dry run: jobs are kept in memory only");
                SyncPipeline::from_config(&config, Arc::new(MemoryJobStore::new())).await?
            } else {
                pipeline_from_env(&config).await?
            };
            let outcome = pipeline.run_once().await?;
            print_outcome(&outcome);
        }
        Commands::Migrate => {
            let store = PgJobStore::connect(&config.database_url)
                .await
                .context("connecting to DATABASE_URL")?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::Serve { host, port } => {
            let defaults = ServeOptions::from_env();
            let options = ServeOptions {
                host: host.unwrap_or(defaults.host),
                port: port.unwrap_or(defaults.port),
            };
            fjob_web::serve(config, options).await?;
        }
    }

    Ok(())
}
