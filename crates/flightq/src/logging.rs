//! Tracing setup for the CLI and the update daemon.
//!
//! Log lines go to stderr, leaving stdout to command output. The HTTP stack
//! is held at `warn` unless tracing is requested.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates below `flightq` whose logs are capped at `warn` by default.
const HTTP_TARGETS: [&str; 3] = ["reqwest", "hyper", "hyper_util"];

/// How much the binary logs, chosen with `-q` and `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Cycle summaries and notifications.
    #[default]
    Normal,
    /// Per-flight updates, retries and storage operations.
    Verbose,
    /// Everything, including the HTTP client.
    Trace,
}

impl Verbosity {
    /// Map the `-q` flag and the number of `-v` flags. `-q` wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Maximum level for `flightq` events.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        let level = self.to_level_filter();
        let http_level = if *self == Self::Trace {
            Level::TRACE
        } else {
            Level::WARN.min(level)
        };

        let mut directives = vec![format!("flightq={level}")];
        directives.extend(HTTP_TARGETS.iter().map(|t| format!("{t}={http_level}")));
        directives.join(",")
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces the
/// directives derived from `verbosity`.
///
/// Calling it again is a no-op.
///
/// # Examples
///
/// ```no_run
/// use flightq::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity >= Verbosity::Verbose)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

/// Warnings and errors, captured per test.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 4), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Verbose < Verbosity::Trace);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
    }

    #[test]
    fn test_http_stack_capped_below_trace() {
        assert_eq!(
            Verbosity::Verbose.filter_directive(),
            "flightq=DEBUG,reqwest=WARN,hyper=WARN,hyper_util=WARN"
        );
        assert_eq!(
            Verbosity::Quiet.filter_directive(),
            "flightq=ERROR,reqwest=ERROR,hyper=ERROR,hyper_util=ERROR"
        );
        assert_eq!(
            Verbosity::Trace.filter_directive(),
            "flightq=TRACE,reqwest=TRACE,hyper=TRACE,hyper_util=TRACE"
        );
    }

    #[test]
    fn test_directives_parse() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(verbosity.filter_directive()).is_ok());
        }
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Trace);
    }
}
