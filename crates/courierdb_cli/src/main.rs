//! CourierDB CLI
//!
//! Command-line tools for inspecting and maintaining a store root.
//!
//! # Commands
//!
//! - `status` - Display owner, format, era counters, and peers
//! - `add` - Append a message under a uri in the current era
//! - `messages` - List messages for a uri across an era range
//! - `new-era` - Close the current era and open the next one
//! - `retire` - Drop chunks of the oldest era and advance retention
//! - `drop-era` - Drop local chunks of one specific era
//! - `peers` - List remote senders and last-synchronized eras

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CourierDB command-line store tools.
#[derive(Parser)]
#[command(name = "courierdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store root directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Attribute the store to this owner when opening
    #[arg(global = true, short, long)]
    owner: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display owner, format, era counters, and peers
    Status,

    /// Append a message under a uri in the current era
    Add {
        /// The uri to append under
        uri: String,

        /// The message payload
        message: String,
    },

    /// List messages for a uri across an era range
    Messages {
        /// The uri to read
        uri: String,

        /// Oldest era of the range (defaults to the retention boundary)
        #[arg(long)]
        from: Option<u32>,

        /// Youngest era of the range (defaults to the current era)
        #[arg(long)]
        to: Option<u32>,

        /// Newest message first instead of oldest first
        #[arg(short, long)]
        reverse: bool,
    },

    /// Close the current era and open the next one
    NewEra,

    /// Drop chunks of the oldest era and advance the retention boundary
    Retire,

    /// Drop local chunks of one specific era
    DropEra {
        /// The era to drop
        era: u32,
    },

    /// List remote senders and last-synchronized eras
    Peers,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = cli.path.ok_or("store root path required (--path)")?;
    let engine = match cli.owner {
        Some(owner) => courierdb_core::Engine::open_with_owner(&path, &owner)?,
        None => courierdb_core::Engine::open(&path)?,
    };

    match cli.command {
        Commands::Status => commands::status::run(&engine)?,
        Commands::Add { uri, message } => commands::add::run(&engine, &uri, &message)?,
        Commands::Messages {
            uri,
            from,
            to,
            reverse,
        } => commands::messages::run(&engine, &uri, from, to, reverse)?,
        Commands::NewEra => commands::era::run_new_era(&engine)?,
        Commands::Retire => commands::era::run_retire(&engine)?,
        Commands::DropEra { era } => commands::era::run_drop(&engine, era)?,
        Commands::Peers => commands::peers::run(&engine)?,
    }

    Ok(())
}
