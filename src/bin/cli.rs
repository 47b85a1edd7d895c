// src/bin/cli.rs
//
//! Upload every blob under a prefix as tagged training images.
//!
//! Examples:
//! ```bash
//! cvblob-upload myaccount animals train/cat cat southcentralus
//! cvblob-upload myaccount animals train/ cat,dog southcentralus -b 32 -j 64 -v
//! cvblob-upload --local-root ./data - train/cat cat http://localhost:8080
//! ```
//!
//! Credentials come from `keys.json` (`storage_key`, `customvision_projectid`,
//! `customvision_training_key`); `CVBLOB_*` variables, also read from `.env`,
//! override them.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cvblob::config::parse_tag_list;
use cvblob::constants::{DEFAULT_BATCH_SIZE, DEFAULT_KEYS_FILE, FATAL_EXIT_CODE};
use cvblob::{Driver, Keys, RunContext, RunOutcome, StorageSource, UploaderConfig};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Turn on verbose logging, counts the number of v's
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    /// Storage account name.
    storage_account: String,

    /// Blob container name.
    container: String,

    /// Blob name prefix (string prefix, e.g. `train/cat`).
    prefix: String,

    /// Comma-separated tag names applied to every uploaded image.
    tags: String,

    /// Training endpoint: a region name (e.g. southcentralus) or a full URL.
    endpoint: String,

    /// Credentials file.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_KEYS_FILE, env = "CVBLOB_KEYS_FILE")]
    keys: PathBuf,

    /// Images per upload call.
    #[arg(short = 'b', long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Concurrent fetches per batch (default: 8 x logical CPUs).
    #[arg(short = 'j', long = "workers")]
    workers: Option<usize>,

    /// Give up on a single blob after this long (e.g. 30s, 2m).
    #[arg(long = "fetch-timeout", default_value = "60s", value_parser = humantime::parse_duration)]
    fetch_timeout: Duration,

    /// Custom blob service endpoint, e.g. an emulator URL.
    #[arg(long = "storage-endpoint", value_name = "URL")]
    storage_endpoint: Option<String>,

    /// Read blobs from this directory instead of the storage account.
    #[arg(long = "local-root", value_name = "DIR")]
    local_root: Option<PathBuf>,
}

/// Main CLI function
#[tokio::main]
async fn main() -> ExitCode {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",        // no -v: WARN level
        1 => "info",        // -v: INFO level
        _ => "debug",       // -vv or more: DEBUG level
    };

    // Diagnostics go to stderr so stdout carries only progress lines.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    // Capture `log` records from dependencies
    tracing_log::LogTracer::init().ok();

    match run(cli).await {
        Ok(outcome) => {
            if let RunOutcome::Aborted { batch, .. } = &outcome {
                error!("run aborted at batch {}", batch);
            }
            ExitCode::from(outcome.exit_status())
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    println!("*****Custom Vision Service - Blob Upload*****");

    println!("Loading Keys.");
    let keys = if cli.keys.exists() {
        Keys::load(&cli.keys)?
    } else {
        warn!("{} not found, reading credentials from the environment", cli.keys.display());
        Keys::default()
    };
    let keys = keys.with_env_overrides();

    let source = match cli.local_root {
        Some(root) => StorageSource::Local { root },
        None => StorageSource::Azure {
            account: cli.storage_account,
            container: cli.container,
            access_key: keys.require_storage_key()?.to_string(),
            endpoint: cli.storage_endpoint,
        },
    };

    let mut config = UploaderConfig::new(
        source,
        cli.prefix,
        parse_tag_list(&cli.tags),
        &cli.endpoint,
        keys.require_project_id()?,
        keys.require_training_key()?,
    )
    .with_batch_size(cli.batch_size)
    .with_fetch_timeout(cli.fetch_timeout);
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    info!("batch size {}, {} fetch workers", config.batch_size, config.workers);

    let ctx = RunContext::connect(config).context("failed to set up storage and training clients")?;
    let mut driver = Driver::new(ctx);

    println!("Begin Batches");
    let outcome = driver.run(io::stdout()).await?;
    Ok(outcome)
}
