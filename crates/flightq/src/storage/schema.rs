//! `SQLite` schema definitions for flightq.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the route search cache.
pub const CREATE_ROUTES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_routes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    departure_iata TEXT NOT NULL,
    arrival_iata TEXT NOT NULL,
    searched_at TEXT NOT NULL,
    api_response TEXT,
    highlighted_flights TEXT
)
";

/// SQL statement to index route searches by pair and recency.
pub const CREATE_ROUTE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_routes_pair
    ON flight_routes(departure_iata, arrival_iata, searched_at DESC)
";

/// SQL statement to create the per-flight statistics table.
pub const CREATE_STATS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_stats (
    flight_icao TEXT PRIMARY KEY NOT NULL,
    flight_iata TEXT,
    airline_name TEXT NOT NULL,
    departure_iata TEXT NOT NULL,
    arrival_iata TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    update_count INTEGER NOT NULL DEFAULT 0,
    last_departure_delay INTEGER NOT NULL DEFAULT 0,
    last_arrival_delay INTEGER NOT NULL DEFAULT 0,
    avg_departure_delay REAL NOT NULL DEFAULT 0,
    avg_arrival_delay REAL NOT NULL DEFAULT 0,
    avg_flight_time REAL NOT NULL DEFAULT 0
)
";

/// SQL statement to index statistics by update time.
pub const CREATE_STATS_UPDATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_stats_updated ON flight_stats(last_updated DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ROUTES_TABLE,
    CREATE_ROUTE_INDEX,
    CREATE_STATS_TABLE,
    CREATE_STATS_UPDATED_INDEX,
    CREATE_METADATA_TABLE,
];
