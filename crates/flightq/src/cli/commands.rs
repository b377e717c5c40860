//! Arguments of each subcommand.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Track command arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Flight number, ICAO (e.g. BAW117) or IATA (e.g. BA117)
    pub flight: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Route search arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Departure airport IATA code
    pub departure: String,

    /// Arrival airport IATA code
    pub arrival: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Highlight command arguments.
#[derive(Debug, Args)]
pub struct HighlightCommand {
    /// Departure airport IATA code
    pub departure: String,

    /// Arrival airport IATA code
    pub arrival: String,

    /// Flight number from the latest search of the route
    pub flight: String,
}

/// Routes command arguments.
#[derive(Debug, Args)]
pub struct RoutesCommand {
    /// Only routes with highlighted flights
    #[arg(long)]
    pub highlighted: bool,

    /// Every stored search, including older searches of the same route
    #[arg(long, conflicts_with = "highlighted")]
    pub history: bool,

    /// Maximum number of routes (defaults to the configured limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Order by average delay instead of update time
    #[arg(long)]
    pub most_delayed: bool,

    /// Every tracked flight, ignoring the limit
    #[arg(long, conflicts_with = "limit")]
    pub all: bool,

    /// Maximum number of flights
    #[arg(short, long, default_value = "30")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Update command arguments.
#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Output the cycle report as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Daemon command arguments.
#[derive(Debug, Args)]
pub struct DaemonCommand {
    /// Run one cycle at startup instead of waiting for the initial delay
    #[arg(long)]
    pub now: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
