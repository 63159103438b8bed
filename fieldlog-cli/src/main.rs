//! FieldLog backup tool
//!
//! Syncs a device database against its remote backup from the command line.
//!
//! Usage:
//!   fieldlog --db fieldlog.db --folder ~/Dropbox sync
//!   fieldlog --config fieldlog.json watch
//!   fieldlog --db fieldlog.db --folder /mnt/usb restore --yes

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fieldlog_cli::{export_local, open_engine, summarize, CliConfig, DriveRemoteConfig, RemoteConfig};
use fieldlog_sync::{FolderConfig, SyncStatus};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "fieldlog")]
#[command(about = "FieldLog offline-first backup sync")]
struct Args {
    /// Path to the device database
    #[arg(long, default_value = "fieldlog.db")]
    db: PathBuf,

    /// JSON config file (sync settings and remote)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use this folder as the remote (overrides the config file)
    #[arg(long, conflicts_with = "drive_token")]
    folder: Option<PathBuf>,

    /// Google Drive access token (overrides the config file)
    #[arg(long)]
    drive_token: Option<String>,

    /// Device name used in logs
    #[arg(long)]
    device_name: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync cycle
    Sync {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite local data with the remote backup
    Restore {
        /// Confirm that local changes may be lost
        #[arg(long)]
        yes: bool,
    },
    /// Keep syncing on a timer until interrupted
    Watch {
        /// Seconds between cycles (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print the local database as a backup document
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = resolve_config(&args)?;

    match args.command {
        Command::Sync { json } => {
            let engine = open_engine(&args.db, &config).await?;
            let report = engine.sync().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", summarize(&report));
            }
        }
        Command::Restore { yes } => {
            if !yes {
                bail!("Restore replaces all local records; re-run with --yes to confirm");
            }
            let engine = open_engine(&args.db, &config).await?;
            let records = engine.restore().await?;
            println!("Restored {} records from {}", records.len(), engine.provider_name());
        }
        Command::Watch { interval } => {
            let mut config = config;
            if let Some(secs) = interval {
                config.sync.auto_sync_interval_secs = secs;
            }
            watch(&args.db, &config).await?;
        }
        Command::Export { out } => {
            let document = export_local(&args.db).await?;
            let json = serde_json::to_string_pretty(&document)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Exported {} records to {}", document.records.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

/// Merges the config file with command-line overrides.
fn resolve_config(args: &Args) -> Result<CliConfig> {
    let mut config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    if let Some(name) = &args.device_name {
        config.sync.device_name = name.clone();
    }

    if let Some(root) = &args.folder {
        config.remote = Some(RemoteConfig::Folder(FolderConfig::new(root.clone())));
    } else if let Some(token) = &args.drive_token {
        let mut drive = match config.remote.take() {
            Some(RemoteConfig::GoogleDrive(drive)) => drive,
            _ => DriveRemoteConfig::default(),
        };
        drive.access_token = Some(token.clone());
        config.remote = Some(RemoteConfig::GoogleDrive(drive));
    }

    Ok(config)
}

async fn watch(db: &std::path::Path, config: &CliConfig) -> Result<()> {
    let engine = open_engine(db, config).await?;
    let _status = engine.subscribe(|event| match &event.status {
        SyncStatus::Error(message) => warn!("Sync error: {}", message),
        status => info!("Sync status: {}", status),
    });

    // First cycle right away; the timer takes over from there.
    if let Err(e) = engine.sync().await {
        warn!("Initial sync failed: {e}");
    }
    engine.set_auto_sync(true)?;

    println!("\n========================================");
    println!("  FieldLog sync watching");
    println!("========================================");
    println!("  Device:   {}", config.sync.device_name);
    println!("  Remote:   {}", engine.provider_name());
    println!("  Interval: {:?}", config.sync.auto_sync_interval());
    println!("  Ctrl-C to stop");
    println!("========================================\n");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    engine.shutdown();
    info!("Stopped");
    Ok(())
}
