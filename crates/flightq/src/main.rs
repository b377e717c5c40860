//! `flightq` - CLI for flight tracking and delay statistics
//!
//! This binary provides the command-line interface for searching flights,
//! managing highlighted flights and running the statistics updater.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::time::Duration;

use clap::Parser;
use tracing::{debug, error};

use flightq::api::{ApiError, AviationStackClient, FlightApi};
use flightq::cli::{
    Cli, Command, ConfigCommand, DaemonCommand, HighlightCommand, RoutesCommand, SearchCommand,
    StatsCommand, TrackCommand, UpdateCommand,
};
use flightq::flight::{FlightData, FlightNumber};
use flightq::notify::Notifiers;
use flightq::route::{HighlightSelection, Route, RouteRecord, Toggle};
use flightq::scheduler::{SchedulePolicy, Scheduler, Trigger};
use flightq::stats::FlightStats;
use flightq::worker::{UpdateWorker, WorkerSettings};
use flightq::{init_logging, Config, Error, Storage};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// How long `update` and `daemon` wait for webhook deliveries before exiting.
const NOTIFY_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // Validation reports problems instead of failing the load.
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        handle_validate(file.clone().or_else(|| cli.config.clone()));
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Track(cmd) => handle_track(&config, &cmd).await,
        Command::Search(cmd) => handle_search(&config, &cmd).await,
        Command::Highlight(cmd) => handle_highlight(&config, &cmd),
        Command::Routes(cmd) => handle_routes(&config, &cmd),
        Command::Stats(cmd) => handle_stats(&config, &cmd),
        Command::Update(cmd) => handle_update(&config, &cmd).await,
        Command::Daemon(cmd) => handle_daemon(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

/// Log the technical error and surface the user-facing message.
fn api_failure(e: ApiError) -> Box<dyn std::error::Error> {
    debug!(error = ?e, "API request failed");
    e.user_message().into()
}

async fn handle_track(config: &Config, cmd: &TrackCommand) -> CliResult {
    let client = AviationStackClient::from_config(config)?;
    let number = FlightNumber::parse(&cmd.flight);
    let response = client
        .track_flight(&number, config.api.track_limit)
        .await
        .map_err(api_failure)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&response.data)?);
        return Ok(());
    }

    let Some(latest) = response.data.first() else {
        println!(
            "No flight found with number \"{number}\". \
             Please check the flight number and try again."
        );
        return Ok(());
    };

    print_flight_details(latest);
    println!();
    println!("{} records in history", response.data.len());
    Ok(())
}

async fn handle_search(config: &Config, cmd: &SearchCommand) -> CliResult {
    let route = Route::new(&cmd.departure, &cmd.arrival);
    let client = AviationStackClient::from_config(config)?;
    let response = client
        .search_by_route(
            &route.departure,
            &route.arrival,
            config.api.route_search_limit,
        )
        .await
        .map_err(api_failure)?;

    let storage = Storage::open(config.database_path())?;
    let previous = storage.latest_route(&route)?;

    let mut record = RouteRecord::new(route.clone(), Some(serde_json::to_string(&response)?));
    let selection = match &previous {
        Some(previous) => HighlightSelection::restore(
            previous,
            &response.data,
            config.worker.max_highlighted_flights,
        )
        .unwrap_or_else(|e| {
            error!(route = %route, error = %e, "Dropping unreadable highlighted flights");
            HighlightSelection::new(config.worker.max_highlighted_flights)
        }),
        None => HighlightSelection::new(config.worker.max_highlighted_flights),
    };
    record.highlighted_flights = selection.to_payload()?;
    storage.record_search(&record)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&response.data)?);
        return Ok(());
    }

    if response.data.is_empty() {
        println!("No flights found for {route}.");
        return Ok(());
    }

    println!("Flights {route} ({} found)", response.data.len());
    println!();
    for flight in &response.data {
        let marker = if selection.contains(&flight.identity()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {}", flight_summary(flight));
    }
    if !selection.is_empty() {
        println!();
        println!(
            "* highlighted ({}/{})",
            selection.len(),
            config.worker.max_highlighted_flights
        );
    }
    Ok(())
}

fn handle_highlight(config: &Config, cmd: &HighlightCommand) -> CliResult {
    let route = Route::new(&cmd.departure, &cmd.arrival);
    let storage = Storage::open(config.database_path())?;
    let record = storage
        .latest_route(&route)?
        .ok_or_else(|| Error::route_not_found(&route.departure, &route.arrival))?;
    let id = record
        .id
        .ok_or_else(|| Error::internal("stored route without id"))?;

    let results = record.response()?.map(|r| r.data).unwrap_or_default();
    let number = FlightNumber::parse(&cmd.flight);
    let flight = results
        .iter()
        .find(|f| number.matches(f))
        .ok_or_else(|| Error::FlightNotFound {
            flight: number.to_string(),
        })?;

    let max = config.worker.max_highlighted_flights;
    let mut selection = HighlightSelection::restore(&record, &results, max)?;
    let toggle = selection.toggle(flight)?;
    storage.set_highlighted_flights(id, selection.to_payload()?.as_deref())?;

    let verb = match toggle {
        Toggle::Added => "Highlighted",
        Toggle::Removed => "Removed highlight from",
    };
    println!(
        "{verb} {} on {route} ({}/{max} highlighted)",
        flight.identity(),
        selection.len()
    );
    Ok(())
}

fn handle_routes(config: &Config, cmd: &RoutesCommand) -> CliResult {
    let storage = Storage::open(config.database_path())?;
    let limit = cmd.limit.unwrap_or(config.storage.recent_routes_limit);
    let routes: Vec<RouteRecord> = if cmd.history {
        storage.recent_routes(limit)?
    } else {
        storage
            .unique_routes()?
            .into_iter()
            .filter(|r| !cmd.highlighted || r.has_highlights())
            .take(limit)
            .collect()
    };

    let highlighted_count = |record: &RouteRecord| record.highlighted().map_or(0, |f| f.len());

    if cmd.json {
        let summary: Vec<_> = routes
            .iter()
            .map(|r| {
                serde_json::json!({
                    "departure": r.route.departure,
                    "arrival": r.route.arrival,
                    "searched_at": r.searched_at,
                    "highlighted": highlighted_count(r),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if routes.is_empty() {
        println!("No routes searched yet.");
        return Ok(());
    }

    for record in &routes {
        println!(
            "{:<14} {}  {} highlighted",
            record.route.to_string(),
            record.searched_at.format("%Y-%m-%d %H:%M"),
            highlighted_count(record)
        );
    }
    Ok(())
}

fn handle_stats(config: &Config, cmd: &StatsCommand) -> CliResult {
    let storage = Storage::open(config.database_path())?;
    let stats = match (cmd.most_delayed, cmd.all) {
        (true, true) => storage.most_delayed(usize::MAX)?,
        (true, false) => storage.most_delayed(cmd.limit)?,
        (false, true) => storage.all_stats()?,
        (false, false) => storage.recently_updated(cmd.limit)?,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No flight statistics yet. Highlight flights and run `flightq update`.");
        return Ok(());
    }

    println!(
        "{:<9} {:<24} {:<14} {:>7} {:>9} {:>9} {:>12}  {}",
        "FLIGHT", "AIRLINE", "ROUTE", "UPDATES", "AVG DEP", "AVG ARR", "FLIGHT TIME", "DELAYS"
    );
    for s in &stats {
        print_stats_row(s);
    }

    let summary = storage.summary()?;
    println!();
    println!(
        "{} flights tracked across {} highlighted routes{}",
        summary.tracked_flights,
        summary.highlighted_routes,
        summary
            .last_update
            .map(|t| format!(", last update {}", t.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default()
    );
    Ok(())
}

fn print_stats_row(stats: &FlightStats) {
    println!(
        "{:<9} {:<24} {:<14} {:>7} {:>9.1} {:>9.1} {:>12}  {}",
        stats.flight_iata.as_deref().unwrap_or(&stats.flight_icao),
        truncate(&stats.airline_name, 24),
        stats.route_label(),
        stats.update_count,
        stats.avg_departure_delay,
        stats.avg_arrival_delay,
        stats.formatted_flight_time(),
        stats.delay_severity()
    );
}

async fn handle_update(config: &Config, cmd: &UpdateCommand) -> CliResult {
    let storage = Storage::open(config.database_path())?;
    let client = AviationStackClient::from_config(config)?;
    let notifiers = Notifiers::from_config(&config.notifications);
    let worker = UpdateWorker::new(
        &storage,
        &storage,
        &client,
        &notifiers,
        WorkerSettings::from_config(config),
    );

    let report = worker.run_cycle(Trigger::Manual).await;
    notifiers.flush(NOTIFY_FLUSH_TIMEOUT).await;
    let report = report?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let notification = report.notification();
        println!("{}: {}", notification.title, notification.message);
        if report.routes > 0 {
            println!(
                "  routes: {} ({} skipped), live: {}, synthetic: {}, missed: {}",
                report.routes, report.skipped_routes, report.live, report.synthetic, report.missed
            );
        }
    }
    Ok(())
}

async fn handle_daemon(config: &Config, cmd: &DaemonCommand) -> CliResult {
    let storage = Storage::open(config.database_path())?;
    let client = AviationStackClient::from_config(config)?;
    let notifiers = Notifiers::from_config(&config.notifications);
    let worker = UpdateWorker::new(
        &storage,
        &storage,
        &client,
        &notifiers,
        WorkerSettings::from_config(config),
    );

    let mut scheduler = Scheduler::new(SchedulePolicy::from_config(config));
    if cmd.now {
        scheduler.handle().request();
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    };

    let summary = scheduler.run(&worker, shutdown).await;
    notifiers.flush(NOTIFY_FLUSH_TIMEOUT).await;
    println!(
        "Stopped after {} scheduled and {} manual updates ({} failed)",
        summary.scheduled, summary.manual, summary.failed
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                let mut shown = config.clone();
                if !shown.api.access_key.is_empty() {
                    shown.api.access_key = "(set)".to_string();
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:       {}", config.database_path().display());
                println!("  Recent routes:       {}", config.storage.recent_routes_limit);
                println!();
                println!("[API]");
                println!("  Base URL:            {}", config.api.base_url);
                println!(
                    "  Access key:          {}",
                    if config.api.access_key.is_empty() {
                        "(not set)"
                    } else {
                        "(set)"
                    }
                );
                println!("  Route search limit:  {}", config.api.route_search_limit);
                println!("  Timeout (s):         {}", config.api.timeout_secs);
                println!("  Max retries:         {}", config.api.max_retries);
                println!();
                println!("[Schedule]");
                println!(
                    "  Frequency (hours):   {}",
                    config.schedule.update_frequency_hours
                );
                println!(
                    "  Initial delay (min): {}",
                    config.schedule.initial_delay_minutes
                );
                println!();
                println!("[Worker]");
                println!("  Synthetic fallback:  {}", config.worker.synthetic_fallback);
                println!(
                    "  Max highlighted:     {}",
                    config.worker.max_highlighted_flights
                );
                println!();
                println!("[Notifications]");
                println!(
                    "  Webhook:             {}",
                    config
                        .notifications
                        .webhook_url
                        .as_deref()
                        .unwrap_or("(none)")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file),
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}

fn print_flight_details(flight: &FlightData) {
    println!("Flight:   {}", flight.identity());
    if let Some(airline) = flight.airline_name() {
        println!("Airline:  {airline}");
    }
    if let Some(date) = &flight.flight_date {
        println!("Date:     {date}");
    }
    if let Some(status) = &flight.flight_status {
        println!("Status:   {status}");
    }
    for (label, endpoint) in [("From", &flight.departure), ("To", &flight.arrival)] {
        if let Some(endpoint) = endpoint {
            println!(
                "{:<9} {} ({})  scheduled {}{}",
                format!("{label}:"),
                endpoint.airport.as_deref().unwrap_or("?"),
                endpoint.iata.as_deref().unwrap_or("?"),
                endpoint.scheduled.as_deref().unwrap_or("?"),
                endpoint
                    .delay
                    .map(|d| format!(", delayed {d} min"))
                    .unwrap_or_default()
            );
        }
    }
    if let Some(position) = flight.position() {
        if let (Some(lat), Some(lon)) = (position.latitude, position.longitude) {
            println!("Position: {lat:.3}, {lon:.3}");
        }
    }
}

fn flight_summary(flight: &FlightData) -> String {
    format!(
        "{:<16} {:<24} {:<10} {}",
        flight.identity().to_string(),
        truncate(flight.airline_name().unwrap_or("Unknown"), 24),
        flight.flight_status.as_deref().unwrap_or("-"),
        flight
            .departure_delay()
            .map(|d| format!("dep +{d} min"))
            .unwrap_or_default()
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
