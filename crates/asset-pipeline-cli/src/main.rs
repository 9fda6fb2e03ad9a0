//! # Asset Pipeline CLI
//!
//! Inspect and lock publish metadata, list production task layers, and push
//! task files into the next publish of an asset.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::PushOptions;
use config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "asset-pipeline", version, about = "Layered asset publishing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the asset and task layer records of a metadata sidecar
    Inspect {
        /// Metadata sidecar (`*.xmp`)
        metadata: PathBuf,
        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lock task layers in a metadata sidecar
    Lock {
        /// Metadata sidecar (`*.xmp`)
        metadata: PathBuf,
        /// Task layer ids to lock
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// List the task layers of a production, in merge order
    Layers {
        /// Production configuration
        #[arg(long, env = "ASSET_PIPELINE_CONFIG")]
        config: PathBuf,
    },
    /// Push a task file into the next publish of an asset
    Push(PushArgs),
}

#[derive(Debug, Args)]
struct PushArgs {
    /// Production configuration
    #[arg(long, env = "ASSET_PIPELINE_CONFIG")]
    config: PathBuf,
    /// Asset directory
    #[arg(long)]
    asset_dir: PathBuf,
    /// Task document
    #[arg(long)]
    task: PathBuf,
    /// Asset name, also the name of its root group
    #[arg(long)]
    asset_name: String,
    /// Asset type, e.g. `Character`
    #[arg(long)]
    asset_type: Option<String>,
    /// Task layer to push; repeat for several
    #[arg(long = "layer")]
    layers: Vec<String>,
    /// Machine name recorded in the metadata
    #[arg(long)]
    hostname: Option<String>,
    /// Tool build recorded in the metadata
    #[arg(long)]
    software_hash: Option<String>,
}

impl From<PushArgs> for PushOptions {
    fn from(args: PushArgs) -> Self {
        Self {
            config: args.config,
            asset_dir: args.asset_dir,
            task: args.task,
            asset_name: args.asset_name,
            asset_type: args.asset_type,
            layers: args.layers,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "Starting asset pipeline");

    match cli.command {
        Command::Inspect { metadata, json } => {
            let tree = commands::inspect(&metadata)?;
            if json {
                let text = serde_json::to_string_pretty(&tree).context("Failed to encode metadata")?;
                println!("{text}");
            } else {
                print!("{}", commands::render_metadata(&tree));
            }
        }
        Command::Lock { metadata, ids } => {
            let report = commands::lock(&metadata, &ids)?;
            for id in &report.locked {
                println!("locked {id}");
            }
            for id in &report.already_locked {
                println!("already locked {id}");
            }
            for skipped in &report.skipped {
                eprintln!("skipped: {skipped}");
            }
        }
        Command::Layers { config } => {
            let (_, assembly) = commands::load_assembly(&config)?;
            print!("{}", commands::render_assembly(&assembly));
        }
        Command::Push(mut args) => {
            let mut config = CliConfig::from_env()?;
            if let Some(hostname) = args.hostname.take() {
                config.hostname = hostname;
            }
            if let Some(hash) = args.software_hash.take() {
                config.software_hash = hash;
            }
            let summary = commands::push(&args.into(), &config)?;
            println!("{}", summary.publish_path.display());
            println!("{}", summary.metadata_path.display());
            for path in &summary.relocked {
                println!("relocked {}", path.display());
            }
        }
    }

    Ok(())
}
