//! Qibla CLI - Command-line interface
//!
//! Thin wrapper over the `qibla` library: one-shot bearing and declination
//! queries, a stdin-driven compass session, and config file management.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::bearing::BearingArgs;
use commands::config::ConfigCommands;
use commands::declination::DeclinationArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "qibla", version, about = "Stable bearing toward the Qibla")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the bearing and distance from a location to the target
    Bearing {
        /// Observer latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Observer longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Target latitude (defaults to target.latitude from config)
        #[arg(long, allow_hyphen_values = true, requires = "target_lon")]
        target_lat: Option<f64>,

        /// Target longitude (defaults to target.longitude from config)
        #[arg(long, allow_hyphen_values = true, requires = "target_lat")]
        target_lon: Option<f64>,
    },

    /// Resolve the magnetic declination at a location
    Declination {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Skip the network lookup and use the regional approximation
        #[arg(long)]
        offline: bool,
    },

    /// Run a compass session fed with orientation events from stdin
    Simulate {
        /// Observer latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Observer longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Target latitude (defaults to target.latitude from config)
        #[arg(long, allow_hyphen_values = true, requires = "target_lon")]
        target_lat: Option<f64>,

        /// Target longitude (defaults to target.longitude from config)
        #[arg(long, allow_hyphen_values = true, requires = "target_lat")]
        target_lon: Option<f64>,

        /// Start a recalibration as soon as the session is listening
        #[arg(long)]
        recalibrate: bool,

        /// Skip the network declination lookup
        #[arg(long)]
        offline: bool,
    },

    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let verbose = cli.verbose;

    match cli.command {
        Commands::Bearing {
            lat,
            lon,
            target_lat,
            target_lon,
        } => commands::bearing::run(
            BearingArgs {
                latitude: lat,
                longitude: lon,
                target_latitude: target_lat,
                target_longitude: target_lon,
            },
            verbose,
        ),

        Commands::Declination { lat, lon, offline } => commands::declination::run(
            DeclinationArgs {
                latitude: lat,
                longitude: lon,
                offline,
            },
            verbose,
        ),

        Commands::Simulate {
            lat,
            lon,
            target_lat,
            target_lon,
            recalibrate,
            offline,
        } => commands::simulate::run(
            SimulateArgs {
                latitude: lat,
                longitude: lon,
                target_latitude: target_lat,
                target_longitude: target_lon,
                recalibrate,
                offline,
            },
            verbose,
        ),

        Commands::Config { command } => commands::config::run(command),
    }
}
