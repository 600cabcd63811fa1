//! DocSync CLI
//!
//! Command-line tools for checking merge behavior offline.
//!
//! # Commands
//!
//! - `merge` - Fold incoming partition data into a snapshot file
//! - `replay` - Run a scripted session against the in-memory store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DocSync snapshot tools.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge incoming partition data into a snapshot
    Merge {
        /// Snapshot JSON file (`{"partition": ..., "collections": {...}}`)
        #[arg(long)]
        previous: PathBuf,

        /// Incoming partition data JSON file (collection name to value)
        #[arg(long)]
        incoming: PathBuf,

        /// Merge policy (keep-populated, replace-all)
        #[arg(long, default_value = "keep-populated")]
        policy: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay a JSON script against the in-memory store
    Replay {
        /// Script file
        #[arg(short, long)]
        script: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Merge {
            previous,
            incoming,
            policy,
            format,
        } => {
            commands::merge::run(&previous, &incoming, &policy, &format)?;
        }
        Commands::Replay { script, format } => {
            commands::replay::run(&script, &format)?;
        }
        Commands::Version => {
            println!("DocSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DocSync Core v{}", docsync_core::VERSION);
        }
    }

    Ok(())
}
