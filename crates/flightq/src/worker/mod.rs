//! The statistics update cycle.
//!
//! One cycle reads every route with highlighted flights, looks each flight up
//! in a fresh route search and folds the result into its statistics record.
//! Failures are contained per flight: a flight without live data gets a
//! synthetic observation instead, and a route whose highlighted payload
//! cannot be decoded is skipped. Only a failure to read the route cache
//! fails the cycle.

pub mod synthetic;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::FlightApi;
use crate::config::Config;
use crate::error::Result;
use crate::flight::FlightData;
use crate::notify::{Notification, Notifier};
use crate::route::Route;
use crate::scheduler::Trigger;
use crate::stats::{FlightStats, Observation};
use crate::storage::{RouteCache, StatsStore};

/// Tunables of the update worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Result limit for each route search.
    pub route_search_limit: u32,
    /// Record a synthetic observation when no live data is available.
    pub synthetic_fallback: bool,
}

impl WorkerSettings {
    /// Settings taken from the application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            route_search_limit: config.api.route_search_limit,
            synthetic_fallback: config.worker.synthetic_fallback,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            route_search_limit: 100,
            synthetic_fallback: true,
        }
    }
}

/// What happened to one highlighted flight during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightUpdate {
    /// Updated from live data.
    Live(FlightStats),
    /// Updated from a synthetic observation.
    Synthetic(FlightStats),
    /// No live data and synthetic fallback disabled.
    Missed,
    /// The statistics record could not be written.
    Failed,
}

/// Summary of one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// What started the cycle.
    pub trigger: Trigger,
    /// Routes with highlighted flights.
    pub routes: usize,
    /// Routes skipped because their payload could not be decoded.
    pub skipped_routes: usize,
    /// Flights updated from live data.
    pub live: usize,
    /// Flights updated from synthetic observations.
    pub synthetic: usize,
    /// Flights left untouched.
    pub missed: usize,
}

impl CycleReport {
    /// An empty report.
    #[must_use]
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            routes: 0,
            skipped_routes: 0,
            live: 0,
            synthetic: 0,
            missed: 0,
        }
    }

    /// Flights whose statistics were written.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.live + self.synthetic
    }

    fn record(&mut self, update: &FlightUpdate) {
        match update {
            FlightUpdate::Live(_) => self.live += 1,
            FlightUpdate::Synthetic(_) => self.synthetic += 1,
            FlightUpdate::Missed | FlightUpdate::Failed => self.missed += 1,
        }
    }

    /// The notification that summarizes this report.
    #[must_use]
    pub fn notification(&self) -> Notification {
        if self.routes == 0 {
            Notification::no_routes()
        } else if self.updated() > 0 {
            Notification::updated(self.updated())
        } else {
            Notification::nothing_updated()
        }
    }
}

/// Runs update cycles against borrowed collaborators.
pub struct UpdateWorker<'a> {
    routes: &'a dyn RouteCache,
    stats: &'a dyn StatsStore,
    api: &'a dyn FlightApi,
    notifier: &'a dyn Notifier,
    settings: WorkerSettings,
}

impl std::fmt::Debug for UpdateWorker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateWorker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<'a> UpdateWorker<'a> {
    /// Create a worker.
    #[must_use]
    pub fn new(
        routes: &'a dyn RouteCache,
        stats: &'a dyn StatsStore,
        api: &'a dyn FlightApi,
        notifier: &'a dyn Notifier,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            routes,
            stats,
            api,
            notifier,
            settings,
        }
    }

    /// Run one update cycle and notify the user of its outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the route cache cannot be read. Per-flight and
    /// per-route failures are absorbed into the report.
    pub async fn run_cycle(&self, trigger: Trigger) -> Result<CycleReport> {
        match self.process(trigger).await {
            Ok(report) => {
                info!(
                    ?trigger,
                    routes = report.routes,
                    skipped_routes = report.skipped_routes,
                    live = report.live,
                    synthetic = report.synthetic,
                    missed = report.missed,
                    "Flight statistics update finished"
                );
                self.notifier.notify(&report.notification());
                Ok(report)
            }
            Err(e) => {
                error!(?trigger, error = %e, "Flight statistics update failed");
                self.notifier.notify(&Notification::failed(&e));
                Err(e)
            }
        }
    }

    async fn process(&self, trigger: Trigger) -> Result<CycleReport> {
        let routes = self.routes.routes_with_highlighted_flights()?;
        let mut report = CycleReport::new(trigger);
        report.routes = routes.len();

        if routes.is_empty() {
            info!("No highlighted flights to update");
            return Ok(report);
        }
        info!(count = routes.len(), "Updating statistics for highlighted routes");

        for record in &routes {
            let flights = match record.highlighted() {
                Ok(flights) => flights,
                Err(e) => {
                    warn!(route = %record.route, error = %e, "Skipping route");
                    report.skipped_routes += 1;
                    continue;
                }
            };

            for flight in &flights {
                let update = self.update_flight(&record.route, flight).await;
                report.record(&update);
            }
        }

        Ok(report)
    }

    /// Update one highlighted flight, falling back to synthetic data.
    pub async fn update_flight(&self, route: &Route, highlighted: &FlightData) -> FlightUpdate {
        let identity = highlighted.identity();

        match self
            .api
            .search_by_route(
                &route.departure,
                &route.arrival,
                self.settings.route_search_limit,
            )
            .await
        {
            Ok(response) => {
                let fresh = response
                    .data
                    .iter()
                    .find(|fresh| identity.matches(&fresh.identity()));
                if let Some(fresh) = fresh {
                    let observation = Observation::from_flight(fresh, highlighted);
                    match self.apply(route, &observation) {
                        Ok(stats) => {
                            debug!(
                                flight = %identity,
                                count = stats.update_count,
                                "Updated from live data"
                            );
                            return FlightUpdate::Live(stats);
                        }
                        Err(e) => {
                            warn!(
                                flight = %identity,
                                error = %e,
                                "Failed to store live statistics"
                            );
                        }
                    }
                } else {
                    debug!(flight = %identity, route = %route, "Flight not in current results");
                }
            }
            Err(e) => {
                warn!(flight = %identity, route = %route, error = %e, "Flight data unavailable");
            }
        }

        if !self.settings.synthetic_fallback {
            return FlightUpdate::Missed;
        }

        let observation = synthetic::observation(highlighted, &mut rand::rng());
        match self.apply(route, &observation) {
            Ok(stats) => {
                debug!(
                    flight = %identity,
                    count = stats.update_count,
                    "Updated from synthetic data"
                );
                FlightUpdate::Synthetic(stats)
            }
            Err(e) => {
                error!(flight = %identity, error = %e, "Failed to store synthetic statistics");
                FlightUpdate::Failed
            }
        }
    }

    fn apply(&self, route: &Route, observation: &Observation) -> Result<FlightStats> {
        let existing = self.stats.get_stats(&observation.flight_icao)?;
        let stats = FlightStats::apply(existing.as_ref(), observation, route, Utc::now());
        self.stats.upsert_stats(&stats)?;
        Ok(stats)
    }
}
