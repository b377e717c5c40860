//! Flight data types returned by the flight data API.
//!
//! These mirror the aviationstack `/flights` payload. Every field except the
//! flight's ICAO code is optional, and unknown fields are ignored so that API
//! additions never break decoding of stored responses.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// ICAO flight designators are a three-letter airline code followed by digits.
static ICAO_FLIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-Z]{3}\d+$").expect("static regex"));

/// One page of results from the flights endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightResponse {
    /// Paging information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// The flights on this page.
    pub data: Vec<FlightData>,
    /// Set when the API rejected the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl FlightResponse {
    /// Whether the API reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Paging information for a [`FlightResponse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    /// Page size requested.
    pub limit: u32,
    /// Offset of this page.
    pub offset: u32,
    /// Number of results on this page.
    pub count: u32,
    /// Total results available.
    pub total: u32,
}

/// Error object returned in place of data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    /// Machine-readable error code.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
}

/// A snapshot of one flight's state at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightData {
    /// Date of the flight (`YYYY-MM-DD`).
    pub flight_date: Option<String>,
    /// Status, e.g. `scheduled`, `active`, `landed`.
    pub flight_status: Option<String>,
    /// Departure details.
    pub departure: Option<Endpoint>,
    /// Arrival details.
    pub arrival: Option<Endpoint>,
    /// Operating airline.
    pub airline: Option<Airline>,
    /// Flight designators.
    pub flight: FlightInfo,
    /// Aircraft details.
    pub aircraft: Option<Aircraft>,
    /// Live position, only present while airborne.
    pub live: Option<LiveInfo>,
}

/// Departure or arrival details of a flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Endpoint {
    pub airport: Option<String>,
    pub timezone: Option<String>,
    pub iata: Option<String>,
    pub icao: Option<String>,
    pub terminal: Option<String>,
    pub gate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baggage: Option<String>,
    /// Delay in minutes.
    pub delay: Option<i32>,
    pub scheduled: Option<String>,
    pub estimated: Option<String>,
    pub actual: Option<String>,
    pub estimated_runway: Option<String>,
    pub actual_runway: Option<String>,
}

/// Airline details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Airline {
    pub name: Option<String>,
    pub iata: Option<String>,
    pub icao: Option<String>,
}

/// Flight designators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct FlightInfo {
    pub number: Option<String>,
    pub iata: Option<String>,
    /// ICAO designator. This is the stable identity of a flight.
    pub icao: String,
    pub codeshared: Option<Codeshare>,
}

/// Codeshare partner details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Codeshare {
    pub airline_name: Option<String>,
    pub airline_iata: Option<String>,
    pub airline_icao: Option<String>,
    pub flight_number: Option<String>,
    pub flight_iata: Option<String>,
    pub flight_icao: Option<String>,
}

/// Aircraft details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Aircraft {
    pub registration: Option<String>,
    pub iata: Option<String>,
    pub icao: Option<String>,
    pub icao24: Option<String>,
}

/// Live tracking data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct LiveInfo {
    pub updated: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub direction: Option<f64>,
    pub speed_horizontal: Option<f64>,
    pub speed_vertical: Option<f64>,
    pub is_ground: Option<bool>,
}

/// A simplified position derived from [`LiveInfo`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct Position {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
}

/// The identifiers used to match a flight across API calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightIdentity {
    /// ICAO designator.
    pub icao: String,
    /// IATA designator, if known.
    pub iata: Option<String>,
}

impl FlightIdentity {
    /// Whether `other` refers to the same flight.
    ///
    /// Two identities match when their ICAO codes are equal and non-empty, or
    /// when both carry the same IATA code.
    #[must_use]
    pub fn matches(&self, other: &FlightIdentity) -> bool {
        if !self.icao.is_empty() && self.icao == other.icao {
            return true;
        }
        matches!((&self.iata, &other.iata), (Some(a), Some(b)) if a == b)
    }

    /// The IATA code, or the ICAO code when no IATA code is known.
    #[must_use]
    pub fn display_code(&self) -> &str {
        self.iata.as_deref().unwrap_or(&self.icao)
    }
}

impl fmt::Display for FlightIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.iata {
            Some(iata) => write!(f, "{} ({iata})", self.icao),
            None => write!(f, "{}", self.icao),
        }
    }
}

impl FlightData {
    /// The identifiers of this flight.
    #[must_use]
    pub fn identity(&self) -> FlightIdentity {
        FlightIdentity {
            icao: self.flight.icao.clone(),
            iata: self.flight.iata.clone().filter(|s| !s.is_empty()),
        }
    }

    /// The operating airline's name, if present.
    #[must_use]
    pub fn airline_name(&self) -> Option<&str> {
        self.airline.as_ref().and_then(|a| a.name.as_deref())
    }

    /// Departure delay in minutes, if reported.
    #[must_use]
    pub fn departure_delay(&self) -> Option<i32> {
        self.departure.as_ref().and_then(|d| d.delay)
    }

    /// Arrival delay in minutes, if reported.
    #[must_use]
    pub fn arrival_delay(&self) -> Option<i32> {
        self.arrival.as_ref().and_then(|a| a.delay)
    }

    /// Scheduled flight time in minutes.
    ///
    /// Returns `None` unless both scheduled timestamps parse. Inconsistent data
    /// (arrival before departure) yields a negative duration.
    #[must_use]
    pub fn scheduled_flight_minutes(&self) -> Option<f64> {
        let departure = parse_timestamp(self.departure.as_ref()?.scheduled.as_deref()?)?;
        let arrival = parse_timestamp(self.arrival.as_ref()?.scheduled.as_deref()?)?;
        #[allow(clippy::cast_precision_loss)]
        let minutes = (arrival - departure).num_milliseconds() as f64 / 60_000.0;
        Some(minutes)
    }

    /// Position derived from the live tracking block.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.live.as_ref().map(|live| Position {
            latitude: live.latitude,
            longitude: live.longitude,
            altitude: live.altitude,
            speed: live.speed_horizontal,
        })
    }
}

/// Parse an ISO-8601 timestamp with offset, as returned by the API.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// A user-entered flight number, classified by designator scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightNumber {
    /// ICAO designator, e.g. `BAW117`.
    Icao(String),
    /// IATA designator, e.g. `BA117`.
    Iata(String),
}

impl FlightNumber {
    /// Classify a flight number. Input is trimmed and upper-cased.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_uppercase();
        if ICAO_FLIGHT.is_match(&normalized) {
            Self::Icao(normalized)
        } else {
            Self::Iata(normalized)
        }
    }

    /// The normalized designator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Icao(s) | Self::Iata(s) => s,
        }
    }

    /// Whether `flight` carries this designator.
    #[must_use]
    pub fn matches(&self, flight: &FlightData) -> bool {
        match self {
            Self::Icao(s) => flight.flight.icao.eq_ignore_ascii_case(s),
            Self::Iata(s) => flight
                .flight
                .iata
                .as_deref()
                .is_some_and(|iata| iata.eq_ignore_ascii_case(s)),
        }
    }
}

impl fmt::Display for FlightNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
