//! `flightq` - Flight lookup and delay statistics
//!
//! This library provides the flight data API client, the route search cache,
//! and the update worker that keeps running delay averages for the flights a
//! user has highlighted.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod flight;
pub mod logging;
pub mod notify;
pub mod route;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod worker;

pub use api::{ApiError, AviationStackClient, FlightApi};
pub use config::Config;
pub use error::{Error, Result};
pub use flight::{FlightData, FlightNumber, FlightResponse};
pub use logging::init_logging;
pub use notify::{Notification, Notifier, Notifiers};
pub use route::{HighlightSelection, Route, RouteRecord};
pub use scheduler::{RunSummary, SchedulePolicy, Scheduler, Trigger};
pub use stats::{FlightStats, Observation};
pub use storage::{RouteCache, StatsStore, Storage, StorageSummary};
pub use worker::{CycleReport, UpdateWorker, WorkerSettings};
