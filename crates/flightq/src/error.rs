//! Crate-wide error type.
//!
//! API failures have their own type, [`ApiError`], which the update worker
//! absorbs per flight. It only appears here when a CLI command fails on it.

use std::path::PathBuf;
use thiserror::Error;

use crate::api::ApiError;

/// Errors returned by flightq operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The database file could not be opened.
    #[error("cannot open database {path}: {source}")]
    DatabaseOpen {
        /// Database file.
        path: PathBuf,
        /// Cause.
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The schema could not be brought up to date.
    #[error("schema upgrade failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    /// Configuration sources could not be merged or parsed.
    #[error("cannot load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// The offending setting and why.
        message: String,
    },

    /// The flight data API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A route's highlighted-flights payload could not be decoded.
    #[error("invalid highlighted flights for route {route}: {source}")]
    HighlightDecode {
        /// The route label, e.g. `JFK → LAX`.
        route: String,
        /// Cause.
        #[source]
        source: serde_json::Error,
    },

    /// The highlighted-flights selection is full.
    #[error("at most {max} flights can be highlighted per route")]
    HighlightLimit {
        /// The selection limit.
        max: usize,
    },

    /// No cached search exists for the route.
    #[error("no cached search for route {route}")]
    RouteNotFound {
        /// The route label.
        route: String,
    },

    /// The flight is not part of the cached search results.
    #[error("flight {flight} not found")]
    FlightNotFound {
        /// The flight number that was looked up.
        flight: String,
    },

    /// The data directory could not be created.
    #[error("cannot create {path}: {source}")]
    DirectoryCreate {
        /// Directory that was being created.
        path: PathBuf,
        /// Cause.
        #[source]
        source: std::io::Error,
    },

    /// Other file system failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON payload could not be encoded or decoded.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An invariant did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// An [`Error::Internal`] with `message`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// An [`Error::ConfigValidation`] with `message`.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// An [`Error::RouteNotFound`] for a departure/arrival pair.
    #[must_use]
    pub fn route_not_found(departure: &str, arrival: &str) -> Self {
        Self::RouteNotFound {
            route: format!("{departure} → {arrival}"),
        }
    }
}
