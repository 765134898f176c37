//! fieldrep-migrate - one-shot report/project reconciliation
//!
//! Walks every stored inspection report and merges it into the project it
//! references. Safe to re-run: a fully reconciled store migrates nothing.
//!
//! Credentials: `GOOGLE_APPLICATION_CREDENTIALS`, then
//! `FIREBASE_SERVICE_ACCOUNT`. Exit code 1 when neither is set or the run
//! fails, 0 otherwise.

use anyhow::{Context, Result};
use clap::Parser;
use fieldrep_common::config::{resolve_config_path, Config, CONFIG_ENV_VAR};
use fieldrep_common::reconcile::{BulkReconciler, ReconcileSummary, Synchronizer};
use fieldrep_common::{credentials, store};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Reconcile every inspection report into its project
#[derive(Parser, Debug)]
#[command(name = "fieldrep-migrate", version)]
struct Cli {}

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();

    let config_path = resolve_config_path(std::env::var(CONFIG_ENV_VAR).ok().as_deref());
    let config = match &config_path {
        Some(path) => Config::load_from(path),
        None => Ok(Config::default()),
    };

    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);

    info!(
        "Starting fieldrep-migrate v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run(config_path.is_some(), config).await {
        Ok(summary) => {
            println!("Migrated: {}", summary.migrated);
            println!("Skipped: {}", summary.skipped());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Migration failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(level: &str) {
    // RUST_LOG overrides the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(
    from_file: bool,
    config: fieldrep_common::Result<Config>,
) -> Result<ReconcileSummary> {
    // Fatal before any store I/O
    let credentials = credentials::from_env()?;
    info!("Using credentials from {}", credentials.source);

    let config = config.context("Failed to load configuration")?;
    if !from_file {
        warn!("No configuration file found, using defaults");
    }

    let store = store::open(&config.store, &credentials)
        .await
        .context("Failed to open document store")?;
    info!("✓ Connected to {} store", store.name());

    let synchronizer = Synchronizer::new(store, config.collections.projects.clone());
    let reconciler = BulkReconciler::new(synchronizer, config.collections.reports.clone())
        .with_page_size(config.store.page_size);

    let summary = reconciler.reconcile_all().await?;
    Ok(summary)
}
