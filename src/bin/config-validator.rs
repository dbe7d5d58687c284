//! # Reqflow Configuration Validator
//!
//! Command-line tool for validating reqflow configuration files before a
//! batch run or workflow is started.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqflow_core::config::loader::CONFIG_PATH_ENV;
use reqflow_core::config::{ConfigManager, ReqflowConfig};
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate reqflow configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (defaults to $REQFLOW_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<String>,

    /// Ignore REQFLOW__* environment overrides
    #[arg(long)]
    no_env: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration and print a per-section report
    Validate,

    /// Print the effective configuration as JSON with secrets masked
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|manager| match &cli.command {
        Some(Commands::Show) => show_config(manager.config()),
        Some(Commands::Validate) => report(manager.config()),
        None => report(manager.config()).and_then(|()| show_config(manager.config())),
    });

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<Arc<ConfigManager>> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());

    let manager = match (path, cli.no_env) {
        (Some(path), false) => ConfigManager::load_from_file(&path)
            .with_context(|| format!("loading {path}"))?,
        (Some(path), true) => ConfigManager::load_file_only(&path)
            .with_context(|| format!("loading {path}"))?,
        (None, false) => ConfigManager::load()?,
        (None, true) => ConfigManager::from_config(ReqflowConfig::default())?,
    };

    match manager.source_path() {
        Some(path) => println!("🔧 Loaded configuration from {}", path.display()),
        None => println!("🔧 Using built-in configuration defaults"),
    }
    Ok(manager)
}

fn report(config: &ReqflowConfig) -> Result<()> {
    println!("🗄️  Database");
    match &config.database.url {
        Some(_) => println!("   ✅ URL configured (credentials taken from the URL)"),
        None => println!(
            "   ✅ {}:{}/{} (credentials from DB_UID/DB_PWD)",
            config.database.host, config.database.port, config.database.database
        ),
    }
    println!(
        "   ✅ Pool: max {} connections, acquire timeout {}s",
        config.database.max_connections, config.database.acquire_timeout_seconds
    );

    println!("📁 File store");
    println!("   ✅ Root: {}", config.file_store.root);
    println!("   ✅ Processed: {}", config.file_store.processed_root);
    println!("   ✅ Backup archive: {}", config.file_store.backup_root);

    println!("🔁 Retry");
    println!(
        "   ✅ {} retries, {}ms initial delay, x{} backoff, {}ms cap",
        config.retry.max_retries,
        config.retry.initial_delay_ms,
        config.retry.backoff_factor,
        config.retry.max_delay_ms
    );

    println!("📦 Batch limits");
    println!(
        "   ✅ download {}, restore {}, rerun {}",
        config.batch.download_max_concurrent,
        config.batch.restore_max_concurrent,
        config.batch.rerun_max_concurrent
    );
    match config.batch.timeout_seconds {
        Some(seconds) => println!("   ✅ Batch timeout: {seconds}s"),
        None => println!("   ℹ️  No batch timeout"),
    }

    println!("🔎 Query defaults");
    println!(
        "   ✅ statuses {:?}, type names {:?}",
        config.query.default_statuses, config.query.default_type_names
    );

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn show_config(config: &ReqflowConfig) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&config.sanitized())
        .context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
