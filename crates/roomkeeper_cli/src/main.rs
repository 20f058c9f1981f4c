//! roomkeeper CLI
//!
//! Command-line tools for roomkeeper deployments.
//!
//! # Commands
//!
//! - `check-config` - Validate a service configuration file
//! - `simulate` - Run the replication and ingestion pipeline in-process

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use roomkeeper_core::ServiceConfig;
use std::path::PathBuf;

/// roomkeeper command-line tools.
#[derive(Parser)]
#[command(name = "roomkeeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the service configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and show the resolved settings
    CheckConfig {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run publisher, bridge and collector in-process against simulated feeds
    Simulate {
        /// Rooms to publish in addition to the configured ones
        #[arg(short, long, value_delimiter = ',')]
        rooms: Vec<u64>,

        /// Gift events delivered to every room
        #[arg(short, long, default_value = "3")]
        events: usize,

        /// Dials that fail before the feed becomes reachable
        #[arg(long, default_value = "0")]
        fail_dials: usize,

        /// Drop the membership watch once to exercise resynchronization
        #[arg(long)]
        break_watch: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    let _log_guard = logging::init(cli.verbose, &config.log)?;

    match cli.command {
        Commands::CheckConfig { format } => {
            let path = cli.config.ok_or("Config file required for check-config")?;
            commands::check_config::run(&path, &config, &format)?;
        }
        Commands::Simulate {
            rooms,
            events,
            fail_dials,
            break_watch,
            format,
        } => {
            let options = commands::simulate::SimulateOptions {
                extra_rooms: rooms,
                events_per_room: events,
                fail_dials,
                break_watch,
            };
            commands::simulate::run(&config, &options, &format)?;
        }
        Commands::Version => {
            println!("roomkeeper CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
