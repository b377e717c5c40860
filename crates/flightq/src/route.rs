//! Route identity and cached route searches.
//!
//! A [`RouteRecord`] is one stored search for a departure/arrival pair. Several
//! records may exist for the same pair; the newest one is the current one.
//! Its highlighted-flights payload is the JSON encoding of the flights the
//! user picked from that search.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flight::{FlightData, FlightIdentity, FlightResponse};

/// Default number of flights a user may highlight per route.
pub const MAX_HIGHLIGHTED_FLIGHTS: usize = 3;

/// A departure/arrival airport pair, by IATA code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Departure airport IATA code.
    pub departure: String,
    /// Arrival airport IATA code.
    pub arrival: String,
}

impl Route {
    /// Create a route, normalizing both codes to upper case.
    #[must_use]
    pub fn new(departure: &str, arrival: &str) -> Self {
        Self {
            departure: departure.trim().to_uppercase(),
            arrival: arrival.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.departure, self.arrival)
    }
}

/// A stored route search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Row id assigned by storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The searched route.
    pub route: Route,
    /// When the search was made.
    pub searched_at: DateTime<Utc>,
    /// Raw JSON body returned by the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_response: Option<String>,
    /// JSON array of highlighted [`FlightData`] entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_flights: Option<String>,
}

impl RouteRecord {
    /// A new, unsaved search result for `route`.
    #[must_use]
    pub fn new(route: Route, api_response: Option<String>) -> Self {
        Self {
            id: None,
            route,
            searched_at: Utc::now(),
            api_response,
            highlighted_flights: None,
        }
    }

    /// Whether the record carries a non-empty highlighted-flights payload.
    #[must_use]
    pub fn has_highlights(&self) -> bool {
        self.highlighted_flights
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    /// Decode the highlighted flights. An absent or empty payload yields an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HighlightDecode`] if the payload is not a JSON array
    /// of flights.
    pub fn highlighted(&self) -> Result<Vec<FlightData>> {
        match self.highlighted_flights.as_deref() {
            Some(payload) if !payload.trim().is_empty() => {
                serde_json::from_str(payload).map_err(|source| Error::HighlightDecode {
                    route: self.route.to_string(),
                    source,
                })
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Decode the stored API response.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored body is not a flights response.
    pub fn response(&self) -> Result<Option<FlightResponse>> {
        self.api_response
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Error::from)
    }
}

/// The outcome of toggling a flight in a [`HighlightSelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The flight was added.
    Added,
    /// The flight was already selected and has been removed.
    Removed,
}

/// The set of highlighted flights for one route, bounded in size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightSelection {
    flights: Vec<FlightData>,
    max: usize,
}

impl HighlightSelection {
    /// An empty selection holding at most `max` flights.
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            flights: Vec::new(),
            max,
        }
    }

    /// Restore a selection from a stored record.
    ///
    /// Stored entries are re-matched against `current` results so the
    /// selection reflects the latest data. Entries with no match are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored payload cannot be decoded.
    pub fn restore(record: &RouteRecord, current: &[FlightData], max: usize) -> Result<Self> {
        let stored = record.highlighted()?;
        let flights = stored
            .iter()
            .filter_map(|h| {
                let id = h.identity();
                current.iter().find(|f| id.matches(&f.identity())).cloned()
            })
            .take(max)
            .collect();
        Ok(Self { flights, max })
    }

    /// Add `flight` if not selected, remove it if it is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HighlightLimit`] if adding would exceed the limit.
    pub fn toggle(&mut self, flight: &FlightData) -> Result<Toggle> {
        let id = flight.identity();
        if let Some(pos) = self.position(&id) {
            self.flights.remove(pos);
            return Ok(Toggle::Removed);
        }
        if self.flights.len() >= self.max {
            return Err(Error::HighlightLimit { max: self.max });
        }
        self.flights.push(flight.clone());
        Ok(Toggle::Added)
    }

    /// Whether a flight with this identity is selected.
    #[must_use]
    pub fn contains(&self, id: &FlightIdentity) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &FlightIdentity) -> Option<usize> {
        self.flights.iter().position(|f| id.matches(&f.identity()))
    }

    /// Number of selected flights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// The selected flights.
    #[must_use]
    pub fn flights(&self) -> &[FlightData] {
        &self.flights
    }

    /// Encode the selection as a stored payload. An empty selection encodes
    /// to `None` so that the route drops out of the update cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<Option<String>> {
        if self.flights.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(&self.flights)?))
    }
}
