//! Synthetic observations for flights with no live data.
//!
//! Values are drawn uniformly from fixed ranges. They keep a flight's record
//! moving when the API has nothing current for it; they are not estimates.

use std::ops::RangeInclusive;

use rand::Rng;

use crate::flight::FlightData;
use crate::stats::{iata_or_icao, Observation, UNKNOWN_AIRLINE};

/// Departure delay range, in minutes.
pub const DEPARTURE_DELAY_MINUTES: RangeInclusive<i32> = 10..=120;

/// Arrival delay range, in minutes.
pub const ARRIVAL_DELAY_MINUTES: RangeInclusive<i32> = 5..=90;

/// Flight time range, in minutes.
pub const FLIGHT_TIME_MINUTES: RangeInclusive<i32> = 60..=240;

/// Build a synthetic observation for a highlighted flight.
pub fn observation<R: Rng + ?Sized>(highlighted: &FlightData, rng: &mut R) -> Observation {
    let identity = highlighted.identity();
    Observation {
        flight_iata: Some(iata_or_icao(&identity)),
        flight_icao: identity.icao,
        airline_name: highlighted
            .airline_name()
            .unwrap_or(UNKNOWN_AIRLINE)
            .to_string(),
        departure_delay: Some(rng.random_range(DEPARTURE_DELAY_MINUTES)),
        arrival_delay: Some(rng.random_range(ARRIVAL_DELAY_MINUTES)),
        flight_minutes: Some(f64::from(rng.random_range(FLIGHT_TIME_MINUTES))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::{Airline, FlightInfo};

    fn highlighted(airline: Option<&str>) -> FlightData {
        FlightData {
            flight: FlightInfo {
                icao: "DAL2".into(),
                iata: Some("DL2".into()),
                ..FlightInfo::default()
            },
            airline: airline.map(|name| Airline {
                name: Some(name.into()),
                ..Airline::default()
            }),
            ..FlightData::default()
        }
    }

    #[test]
    fn test_values_within_ranges() {
        let mut rng = rand::rng();
        let flight = highlighted(Some("Delta"));
        for _ in 0..500 {
            let obs = observation(&flight, &mut rng);
            assert!(DEPARTURE_DELAY_MINUTES.contains(&obs.departure_delay.unwrap()));
            assert!(ARRIVAL_DELAY_MINUTES.contains(&obs.arrival_delay.unwrap()));
            let minutes = obs.flight_minutes.unwrap();
            assert!((60.0..=240.0).contains(&minutes));
            assert!((minutes - minutes.trunc()).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_identity_from_highlighted_entry() {
        let obs = observation(&highlighted(Some("Delta")), &mut rand::rng());
        assert_eq!(obs.flight_icao, "DAL2");
        assert_eq!(obs.flight_iata.as_deref(), Some("DL2"));
        assert_eq!(obs.airline_name, "Delta");
    }

    #[test]
    fn test_unknown_airline() {
        let obs = observation(&highlighted(None), &mut rand::rng());
        assert_eq!(obs.airline_name, UNKNOWN_AIRLINE);
    }
}
