use chrono::{TimeZone, Utc};
use flightq::{FlightStats, Observation, Route};
use proptest::prelude::*;

fn observation(departure: i32, arrival: i32, minutes: Option<f64>) -> Observation {
    Observation {
        flight_icao: "AAL100".to_string(),
        flight_iata: Some("AA100".to_string()),
        airline_name: "American Airlines".to_string(),
        departure_delay: Some(departure),
        arrival_delay: Some(arrival),
        flight_minutes: minutes,
    }
}

fn fold(observations: &[Observation]) -> Option<FlightStats> {
    let route = Route::new("JFK", "LAX");
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    observations.iter().fold(None, |acc, obs| {
        Some(FlightStats::apply(acc.as_ref(), obs, &route, now))
    })
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn test_first_observation_seeds_record() {
    let stats = fold(&[observation(30, 20, Some(300.0))]).unwrap();
    assert_eq!(stats.update_count, 1);
    assert!(approx_eq(stats.avg_departure_delay, 30.0));
    assert!(approx_eq(stats.avg_arrival_delay, 20.0));
    assert!(approx_eq(stats.avg_flight_time, 300.0));
    assert_eq!(stats.last_departure_delay, 30);
}

#[test]
fn test_missing_delays_count_as_zero() {
    let mut obs = observation(0, 0, None);
    obs.departure_delay = None;
    obs.arrival_delay = None;
    let stats = fold(&[observation(40, 40, None), obs]).unwrap();
    assert!(approx_eq(stats.avg_departure_delay, 20.0));
    assert_eq!(stats.last_arrival_delay, 0);
}

proptest! {
    #[test]
    fn prop_update_count_matches_observations(
        delays in prop::collection::vec((-30i32..300, -30i32..300), 1..40)
    ) {
        let observations: Vec<_> = delays
            .iter()
            .map(|&(d, a)| observation(d, a, None))
            .collect();
        let stats = fold(&observations).unwrap();
        prop_assert_eq!(stats.update_count as usize, observations.len());
    }

    #[test]
    fn prop_averages_are_equal_weight_means(
        delays in prop::collection::vec((-30i32..300, -30i32..300), 1..40)
    ) {
        let observations: Vec<_> = delays
            .iter()
            .map(|&(d, a)| observation(d, a, None))
            .collect();
        let stats = fold(&observations).unwrap();

        let n = delays.len() as f64;
        let mean_dep = delays.iter().map(|&(d, _)| f64::from(d)).sum::<f64>() / n;
        let mean_arr = delays.iter().map(|&(_, a)| f64::from(a)).sum::<f64>() / n;
        prop_assert!(approx_eq(stats.avg_departure_delay, mean_dep));
        prop_assert!(approx_eq(stats.avg_arrival_delay, mean_arr));
    }

    #[test]
    fn prop_average_stays_within_observed_range(
        delays in prop::collection::vec(-30i32..300, 1..40)
    ) {
        let observations: Vec<_> = delays
            .iter()
            .map(|&d| observation(d, d, None))
            .collect();
        let stats = fold(&observations).unwrap();

        let min = f64::from(*delays.iter().min().unwrap());
        let max = f64::from(*delays.iter().max().unwrap());
        prop_assert!(stats.avg_departure_delay >= min - 1e-6);
        prop_assert!(stats.avg_departure_delay <= max + 1e-6);
    }

    #[test]
    fn prop_flight_time_untouched_without_sample(
        seed in 30.0f64..600.0,
        delays in prop::collection::vec(0i32..120, 1..20)
    ) {
        let mut observations = vec![observation(0, 0, Some(seed))];
        observations.extend(delays.iter().map(|&d| observation(d, d, None)));
        let stats = fold(&observations).unwrap();
        prop_assert!(approx_eq(stats.avg_flight_time, seed));
    }

    #[test]
    fn prop_identity_follows_latest_observation(
        names in prop::collection::vec("[A-Z][a-z]{2,10}", 1..10)
    ) {
        let observations: Vec<_> = names
            .iter()
            .map(|name| Observation {
                airline_name: name.clone(),
                ..observation(5, 5, None)
            })
            .collect();
        let stats = fold(&observations).unwrap();
        prop_assert_eq!(&stats.airline_name, names.last().unwrap());
        prop_assert_eq!(stats.departure_iata.as_str(), "JFK");
    }
}
