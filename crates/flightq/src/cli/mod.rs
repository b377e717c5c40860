//! Argument parsing for the `flightq` binary.
//!
//! Handlers live in `main.rs`; this module only describes the arguments.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DaemonCommand, HighlightCommand, RoutesCommand, SearchCommand, StatsCommand,
    TrackCommand, UpdateCommand,
};

/// flightq - Track flights and their delay history
///
/// Looks up flights by number or route, keeps a history of route searches,
/// and maintains running delay statistics for highlighted flights.
#[derive(Debug, Parser)]
#[command(name = "flightq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file to use instead of the default
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up a flight by number
    Track(TrackCommand),

    /// Search flights between two airports
    Search(SearchCommand),

    /// Toggle a flight in a route's highlighted set
    Highlight(HighlightCommand),

    /// List recently searched routes
    Routes(RoutesCommand),

    /// Show flight statistics
    Stats(StatsCommand),

    /// Update statistics for highlighted flights now
    Update(UpdateCommand),

    /// Run the update scheduler in the foreground
    Daemon(DaemonCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Logging verbosity selected by `-q` and `-v`.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "flightq");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(
            parse(&["flightq", "-q", "update"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["flightq", "update"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["flightq", "-v", "update"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["flightq", "-vv", "update"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_track() {
        let cli = parse(&["flightq", "track", "BA117", "--json"]);
        match cli.command {
            Command::Track(cmd) => {
                assert_eq!(cmd.flight, "BA117");
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_search() {
        let cli = parse(&["flightq", "search", "JFK", "LAX"]);
        match cli.command {
            Command::Search(cmd) => {
                assert_eq!(cmd.departure, "JFK");
                assert_eq!(cmd.arrival, "LAX");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_highlight() {
        let cli = parse(&["flightq", "highlight", "JFK", "LAX", "AA1"]);
        assert!(matches!(cli.command, Command::Highlight(ref cmd) if cmd.flight == "AA1"));
    }

    #[test]
    fn test_parse_stats_defaults() {
        let cli = parse(&["flightq", "stats"]);
        match cli.command {
            Command::Stats(cmd) => {
                assert_eq!(cmd.limit, 30);
                assert!(!cmd.most_delayed);
                assert!(!cmd.all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_routes() {
        let cli = parse(&["flightq", "routes", "--highlighted", "-l", "5"]);
        match cli.command {
            Command::Routes(cmd) => {
                assert!(cmd.highlighted);
                assert_eq!(cmd.limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_routes_history() {
        let cli = parse(&["flightq", "routes", "--history"]);
        match cli.command {
            Command::Routes(cmd) => {
                assert!(cmd.history);
                assert!(!cmd.highlighted);
                assert_eq!(cmd.limit, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["flightq", "routes", "--history", "--highlighted"]).is_err());
    }

    #[test]
    fn test_parse_stats_all() {
        let cli = parse(&["flightq", "stats", "--all", "--most-delayed"]);
        match cli.command {
            Command::Stats(cmd) => {
                assert!(cmd.all);
                assert!(cmd.most_delayed);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["flightq", "stats", "--all", "-l", "5"]).is_err());
    }

    #[test]
    fn test_parse_daemon() {
        let cli = parse(&["flightq", "daemon", "--now"]);
        assert!(matches!(cli.command, Command::Daemon(DaemonCommand { now: true })));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = parse(&["flightq", "config", "validate", "-f", "/tmp/c.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["flightq", "-c", "/custom/config.toml", "update"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_search_requires_both_airports() {
        assert!(Cli::try_parse_from(["flightq", "search", "JFK"]).is_err());
    }
}
