//! tabsync CLI
//!
//! Synchronizes a local JSON dataset into a record store under one of four
//! reconciliation policies.
//!
//! # Commands
//!
//! - `sync` - Reconcile the input dataset into the store
//! - `plan` - Show the operations a sync would perform, without writing
//! - `diff` - Compare the input dataset against the store
//! - `version` - Show version information

mod commands;
mod dataset;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Records fetched per page from the store.
const PAGE_SIZE: usize = 500;

/// Synchronize local tabular data into a record store.
#[derive(Parser)]
#[command(name = "tabsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sync profile (JSON)
    #[arg(global = true, short = 'p', long)]
    profile: Option<PathBuf>,

    /// Path to the record store file
    #[arg(global = true, short = 's', long)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the input dataset into the store
    Sync {
        /// Input dataset (JSON array of row objects)
        input: PathBuf,
    },

    /// Show the operations a sync would perform, without writing
    Plan {
        /// Input dataset (JSON array of row objects)
        input: PathBuf,
    },

    /// Compare the input dataset against the store
    Diff {
        /// Input dataset (JSON array of row objects)
        input: PathBuf,

        /// Numeric comparison tolerance
        #[arg(short, long, default_value = "1e-6")]
        tolerance: f64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync { input } => {
            let profile = cli.profile.ok_or("Profile required for sync (-p)")?;
            let store = cli.store.ok_or("Store path required for sync (-s)")?;
            commands::sync::run(&profile, &input, &store, PAGE_SIZE)?;
        }
        Commands::Plan { input } => {
            let profile = cli.profile.ok_or("Profile required for plan (-p)")?;
            let store = cli.store.ok_or("Store path required for plan (-s)")?;
            commands::plan::run(&profile, &input, &store, PAGE_SIZE)?;
        }
        Commands::Diff { input, tolerance } => {
            let profile = cli.profile.ok_or("Profile required for diff (-p)")?;
            let store = cli.store.ok_or("Store path required for diff (-s)")?;
            commands::diff::run(&profile, &input, &store, PAGE_SIZE, tolerance)?;
        }
        Commands::Version => {
            println!("tabsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
