//! Running delay and flight-time statistics per flight.
//!
//! [`FlightStats::apply`] folds one [`Observation`] into a flight's running
//! record. Every application increments `update_count` by one and moves the
//! delay averages to the equal-weight mean of all observed values.
//!
//! `avg_flight_time` uses the same update formula with `update_count` as the
//! divisor, but is left untouched by observations that carry no flight time.
//! Its effective denominator is therefore not the number of flight-time
//! samples, and the value is biased low once any observation lacked a
//! flight time. Existing records depend on this formula; keep it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flight::{FlightData, FlightIdentity};
use crate::route::Route;

/// Airline name recorded when neither the observation nor the highlighted
/// entry names one.
pub const UNKNOWN_AIRLINE: &str = "Unknown";

/// One data point fed into the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// ICAO designator; the record key.
    pub flight_icao: String,
    /// IATA designator, for display.
    pub flight_iata: Option<String>,
    /// Airline name.
    pub airline_name: String,
    /// Departure delay in minutes. Absent counts as zero.
    pub departure_delay: Option<i32>,
    /// Arrival delay in minutes. Absent counts as zero.
    pub arrival_delay: Option<i32>,
    /// Flight time in minutes, when it could be computed.
    pub flight_minutes: Option<f64>,
}

impl Observation {
    /// Build an observation from a fresh API record of a highlighted flight.
    ///
    /// The record is keyed by the highlighted entry's identity so that a
    /// match made on the IATA code still updates the same row.
    #[must_use]
    pub fn from_flight(fresh: &FlightData, highlighted: &FlightData) -> Self {
        let identity = highlighted.identity();
        let airline_name = fresh
            .airline_name()
            .or_else(|| highlighted.airline_name())
            .unwrap_or(UNKNOWN_AIRLINE)
            .to_string();
        Self {
            flight_icao: identity.icao.clone(),
            flight_iata: Some(iata_or_icao(&identity)),
            airline_name,
            departure_delay: fresh.departure_delay(),
            arrival_delay: fresh.arrival_delay(),
            flight_minutes: fresh.scheduled_flight_minutes(),
        }
    }
}

/// The IATA code, falling back to the ICAO code.
pub(crate) fn iata_or_icao(identity: &FlightIdentity) -> String {
    identity.display_code().to_string()
}

/// How late a flight tends to be, judged on its averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelaySeverity {
    /// Both averages at most 15 minutes.
    OnTime,
    /// Either average above 15 minutes.
    Moderate,
    /// Either average above an hour.
    Severe,
}

impl std::fmt::Display for DelaySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnTime => write!(f, "on time"),
            Self::Moderate => write!(f, "moderate"),
            Self::Severe => write!(f, "severe"),
        }
    }
}

/// Running statistics for one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightStats {
    /// ICAO designator (primary key).
    pub flight_icao: String,
    /// IATA designator.
    pub flight_iata: Option<String>,
    /// Airline name from the latest observation.
    pub airline_name: String,
    /// Departure airport of the latest observation.
    pub departure_iata: String,
    /// Arrival airport of the latest observation.
    pub arrival_iata: String,
    /// When the record was last written.
    pub last_updated: DateTime<Utc>,
    /// Number of observations applied since creation.
    pub update_count: u32,
    /// Departure delay of the latest observation, in minutes.
    pub last_departure_delay: i32,
    /// Arrival delay of the latest observation, in minutes.
    pub last_arrival_delay: i32,
    /// Mean departure delay, in minutes.
    pub avg_departure_delay: f64,
    /// Mean arrival delay, in minutes.
    pub avg_arrival_delay: f64,
    /// Mean scheduled flight time, in minutes.
    pub avg_flight_time: f64,
}

impl FlightStats {
    /// Fold `observation` into `existing`, producing the replacement record.
    ///
    /// With no existing record a new one is created with a count of one.
    /// Identity and route fields are always taken from this round.
    #[must_use]
    pub fn apply(
        existing: Option<&FlightStats>,
        observation: &Observation,
        route: &Route,
        now: DateTime<Utc>,
    ) -> FlightStats {
        let departure_delay = observation.departure_delay.unwrap_or(0);
        let arrival_delay = observation.arrival_delay.unwrap_or(0);

        let (update_count, avg_departure_delay, avg_arrival_delay, avg_flight_time) =
            match existing {
                None => (
                    1,
                    f64::from(departure_delay),
                    f64::from(arrival_delay),
                    observation.flight_minutes.unwrap_or(0.0),
                ),
                Some(old) => {
                    let count = f64::from(old.update_count);
                    let next = old.update_count.saturating_add(1);
                    let running = |avg: f64, value: f64| (avg * count + value) / f64::from(next);
                    (
                        next,
                        running(old.avg_departure_delay, f64::from(departure_delay)),
                        running(old.avg_arrival_delay, f64::from(arrival_delay)),
                        observation
                            .flight_minutes
                            .map_or(old.avg_flight_time, |minutes| {
                                running(old.avg_flight_time, minutes)
                            }),
                    )
                }
            };

        FlightStats {
            flight_icao: observation.flight_icao.clone(),
            flight_iata: observation.flight_iata.clone(),
            airline_name: observation.airline_name.clone(),
            departure_iata: route.departure.clone(),
            arrival_iata: route.arrival.clone(),
            last_updated: now,
            update_count,
            last_departure_delay: departure_delay,
            last_arrival_delay: arrival_delay,
            avg_departure_delay,
            avg_arrival_delay,
            avg_flight_time,
        }
    }

    /// The route of the latest observation, e.g. `JFK → LAX`.
    #[must_use]
    pub fn route_label(&self) -> String {
        format!("{} → {}", self.departure_iata, self.arrival_iata)
    }

    /// Classify the average delays.
    #[must_use]
    pub fn delay_severity(&self) -> DelaySeverity {
        let worst = self.avg_departure_delay.max(self.avg_arrival_delay);
        if worst > 60.0 {
            DelaySeverity::Severe
        } else if worst > 15.0 {
            DelaySeverity::Moderate
        } else {
            DelaySeverity::OnTime
        }
    }

    /// Average flight time as `"2 h 5 min"`, or `"45 min"` under an hour.
    #[must_use]
    pub fn formatted_flight_time(&self) -> String {
        #[allow(clippy::cast_possible_truncation)]
        let total = self.avg_flight_time.trunc() as i64;
        let (hours, minutes) = (total / 60, total % 60);
        if hours > 0 {
            format!("{hours} h {minutes} min")
        } else {
            format!("{minutes} min")
        }
    }
}
