//! `SQLite` persistence for route searches and per-flight statistics.
//!
//! The update worker only needs the two narrow traits [`RouteCache`] and
//! [`StatsStore`]. [`Storage`] implements both and adds the listing queries
//! used by the CLI.
//!
//! A route may have many stored searches; only the newest one per
//! (departure, arrival) pair is current.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::route::{Route, RouteRecord};
use crate::stats::FlightStats;

/// Read access to cached route searches.
pub trait RouteCache {
    /// The current search of every route whose highlighted-flights payload
    /// is non-empty, newest first. Older searches of a route are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn routes_with_highlighted_flights(&self) -> Result<Vec<RouteRecord>>;
}

/// Point access to per-flight statistics.
pub trait StatsStore {
    /// Look up the statistics record for a flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get_stats(&self, flight_icao: &str) -> Result<Option<FlightStats>>;

    /// Insert or replace a statistics record, keyed by its ICAO code.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_stats(&self, stats: &FlightStats) -> Result<()>;
}

const ROUTE_COLUMNS: &str =
    "id, departure_iata, arrival_iata, searched_at, api_response, highlighted_flights";

/// Matches the newest row of each route in a query aliasing `flight_routes`
/// as `fr`.
const CURRENT_ROUTE: &str = "fr.id = (
    SELECT id FROM flight_routes
    WHERE departure_iata = fr.departure_iata AND arrival_iata = fr.arrival_iata
    ORDER BY searched_at DESC, id DESC LIMIT 1
)";

const HAS_HIGHLIGHTS: &str =
    "fr.highlighted_flights IS NOT NULL AND TRIM(fr.highlighted_flights) != ''";

const STATS_COLUMNS: &str = "flight_icao, flight_iata, airline_name, departure_iata, \
     arrival_iata, last_updated, update_count, last_departure_delay, last_arrival_delay, \
     avg_departure_delay, avg_arrival_delay, avg_flight_time";

/// A single `SQLite` connection holding both tables.
#[derive(Debug)]
pub struct Storage {
    path: PathBuf,
    conn: Connection,
}

impl Storage {
    /// Open the database at `path`, creating it and its directory as needed,
    /// and upgrade the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, the file or the schema upgrade
    /// fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!(path = %path.display(), "Opening database");
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!(path = %path.display(), "Database ready");
        Ok(Self { path, conn })
    }

    /// A private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate it.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Database file, or `:memory:`.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Route cache ===

    /// Store a route search. Returns the assigned ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_search(&self, record: &RouteRecord) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO flight_routes
                (departure_iata, arrival_iata, searched_at, api_response, highlighted_flights)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                record.route.departure,
                record.route.arrival,
                encode_time(record.searched_at),
                record.api_response,
                record.highlighted_flights,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(route = %record.route, id, "Stored route search");
        Ok(id)
    }

    /// The newest search for a route.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_route(&self, route: &Route) -> Result<Option<RouteRecord>> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM flight_routes
             WHERE departure_iata = ?1 AND arrival_iata = ?2
             ORDER BY searched_at DESC, id DESC LIMIT 1"
        );
        let result = self
            .conn
            .query_row(
                &sql,
                params![route.departure, route.arrival],
                Self::row_to_route,
            )
            .optional()?;
        Ok(result)
    }

    /// The most recent searches, newest first, including superseded ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_routes(&self, limit: usize) -> Result<Vec<RouteRecord>> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM flight_routes
             ORDER BY searched_at DESC, id DESC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let routes = stmt
            .query_map([limit_i64], Self::row_to_route)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(routes)
    }

    /// The newest search of every distinct route, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn unique_routes(&self) -> Result<Vec<RouteRecord>> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM flight_routes fr
             WHERE {CURRENT_ROUTE}
             ORDER BY searched_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let routes = stmt
            .query_map([], Self::row_to_route)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(routes)
    }

    /// Replace the highlighted-flights payload of a stored search.
    ///
    /// Returns `true` if the search exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_highlighted_flights(&self, id: i64, payload: Option<&str>) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE flight_routes SET highlighted_flights = ?1 WHERE id = ?2",
            params![payload, id],
        )?;
        Ok(affected > 0)
    }

    // === Statistics ===

    /// All statistics, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all_stats(&self) -> Result<Vec<FlightStats>> {
        self.query_stats(
            &format!("SELECT {STATS_COLUMNS} FROM flight_stats ORDER BY last_updated DESC"),
            [],
        )
    }

    /// Flights with the highest combined average delay.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn most_delayed(&self, limit: usize) -> Result<Vec<FlightStats>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_stats(
            &format!(
                "SELECT {STATS_COLUMNS} FROM flight_stats
                 ORDER BY avg_departure_delay + avg_arrival_delay DESC LIMIT ?1"
            ),
            [limit_i64],
        )
    }

    /// The most recently updated flights.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recently_updated(&self, limit: usize) -> Result<Vec<FlightStats>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_stats(
            &format!(
                "SELECT {STATS_COLUMNS} FROM flight_stats ORDER BY last_updated DESC LIMIT ?1"
            ),
            [limit_i64],
        )
    }

    /// Number of flights with a statistics record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM flight_stats", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_stats<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<FlightStats>> {
        let mut stmt = self.conn.prepare(sql)?;
        let stats = stmt
            .query_map(params, Self::row_to_stats)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Row counts, last update time and file size.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn summary(&self) -> Result<StorageSummary> {
        let route_searches: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM flight_routes", [], |row| row.get(0))?;
        let highlighted_routes: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM flight_routes fr WHERE {CURRENT_ROUTE} AND {HAS_HIGHLIGHTS}"
            ),
            [],
            |row| row.get(0),
        )?;
        let tracked_flights = self.stats_count()?;

        let last_update: Option<String> = self
            .conn
            .query_row("SELECT MAX(last_updated) FROM flight_stats", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageSummary {
            route_searches,
            highlighted_routes,
            tracked_flights,
            last_update: last_update.as_deref().and_then(decode_time),
            db_size_bytes,
        })
    }

    /// Convert a database row to a [`RouteRecord`].
    fn row_to_route(row: &rusqlite::Row) -> rusqlite::Result<RouteRecord> {
        let id: i64 = row.get(0)?;
        let departure: String = row.get(1)?;
        let arrival: String = row.get(2)?;
        let searched_at: String = row.get(3)?;

        let searched_at = decode_time(&searched_at).unwrap_or_else(|| {
            warn!(id, "Unparseable search timestamp {searched_at:?}");
            DateTime::<Utc>::UNIX_EPOCH
        });

        Ok(RouteRecord {
            id: Some(id),
            route: Route { departure, arrival },
            searched_at,
            api_response: row.get(4)?,
            highlighted_flights: row.get(5)?,
        })
    }

    /// Convert a database row to a [`FlightStats`].
    fn row_to_stats(row: &rusqlite::Row) -> rusqlite::Result<FlightStats> {
        let flight_icao: String = row.get(0)?;
        let last_updated: String = row.get(5)?;
        let last_updated = decode_time(&last_updated).unwrap_or_else(|| {
            warn!(flight = %flight_icao, "Unparseable update timestamp {last_updated:?}");
            DateTime::<Utc>::UNIX_EPOCH
        });

        Ok(FlightStats {
            flight_icao,
            flight_iata: row.get(1)?,
            airline_name: row.get(2)?,
            departure_iata: row.get(3)?,
            arrival_iata: row.get(4)?,
            last_updated,
            update_count: row.get(6)?,
            last_departure_delay: row.get(7)?,
            last_arrival_delay: row.get(8)?,
            avg_departure_delay: row.get(9)?,
            avg_arrival_delay: row.get(10)?,
            avg_flight_time: row.get(11)?,
        })
    }
}

impl RouteCache for Storage {
    fn routes_with_highlighted_flights(&self) -> Result<Vec<RouteRecord>> {
        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM flight_routes fr
             WHERE {CURRENT_ROUTE} AND {HAS_HIGHLIGHTS}
             ORDER BY searched_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let routes = stmt
            .query_map([], Self::row_to_route)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(routes)
    }
}

impl StatsStore for Storage {
    fn get_stats(&self, flight_icao: &str) -> Result<Option<FlightStats>> {
        let sql = format!("SELECT {STATS_COLUMNS} FROM flight_stats WHERE flight_icao = ?1");
        let result = self
            .conn
            .query_row(&sql, [flight_icao], Self::row_to_stats)
            .optional()?;
        Ok(result)
    }

    fn upsert_stats(&self, stats: &FlightStats) -> Result<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO flight_stats (
                flight_icao, flight_iata, airline_name, departure_iata, arrival_iata,
                last_updated, update_count, last_departure_delay, last_arrival_delay,
                avg_departure_delay, avg_arrival_delay, avg_flight_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                stats.flight_icao,
                stats.flight_iata,
                stats.airline_name,
                stats.departure_iata,
                stats.arrival_iata,
                encode_time(stats.last_updated),
                stats.update_count,
                stats.last_departure_delay,
                stats.last_arrival_delay,
                stats.avg_departure_delay,
                stats.avg_arrival_delay,
                stats.avg_flight_time,
            ],
        )?;
        debug!(flight = %stats.flight_icao, count = stats.update_count, "Stored flight stats");
        Ok(())
    }
}

/// Fixed-width UTC timestamps keep text ordering chronological.
fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Row counts and file size of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSummary {
    /// Total number of stored route searches.
    pub route_searches: i64,
    /// Routes whose current search carries highlighted flights.
    pub highlighted_routes: i64,
    /// Flights with a statistics record.
    pub tracked_flights: i64,
    /// Most recent statistics update.
    pub last_update: Option<DateTime<Utc>>,
    /// File size in bytes; 0 in memory.
    pub db_size_bytes: u64,
}
