//! Schema versioning.
//!
//! The version lives in the `metadata` table under `schema_version`. A
//! database without one is treated as version 0 and brought forward one step
//! at a time, each step in its own transaction.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Schema version written by this build.
pub const CURRENT_VERSION: i32 = 2;

const VERSION_KEY: &str = "schema_version";

type Step = fn(&Connection) -> Result<()>;

/// Ordered upgrade steps. Entry `i` upgrades version `i` to `i + 1`.
const STEPS: &[Step] = &[base_schema, add_flight_time];

/// Create missing tables and upgrade the schema to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a statement fails or the database was written by a
/// newer schema.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let found = stored_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {found} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for version in found..CURRENT_VERSION {
        upgrade(conn, version)?;
    }
    Ok(())
}

fn upgrade(conn: &Connection, from: i32) -> Result<()> {
    let step = usize::try_from(from)
        .ok()
        .and_then(|i| STEPS.get(i))
        .ok_or_else(|| Error::DatabaseMigration {
            message: format!("no upgrade step from version {from}"),
        })?;

    let tx = conn.unchecked_transaction()?;
    step(&tx)?;
    store_version(&tx, from + 1)?;
    tx.commit()?;
    tracing::debug!(version = from + 1, "Upgraded database schema");
    Ok(())
}

fn stored_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value.map_or(Ok(0), |v| {
        v.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("unreadable schema version {v:?}"),
        })
    })
}

fn store_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Version 1 is whatever `SCHEMA_STATEMENTS` created.
fn base_schema(_conn: &Connection) -> Result<()> {
    Ok(())
}

/// Version 2: statistics carry an average flight time.
fn add_flight_time(conn: &Connection) -> Result<()> {
    if !has_column(conn, "flight_stats", "avg_flight_time")? {
        conn.execute(
            "ALTER TABLE flight_stats ADD COLUMN avg_flight_time REAL NOT NULL DEFAULT 0",
            [],
        )?;
    }
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1_STATS: &str = r"
        CREATE TABLE flight_stats (
            flight_icao TEXT PRIMARY KEY NOT NULL,
            flight_iata TEXT,
            airline_name TEXT NOT NULL,
            departure_iata TEXT NOT NULL,
            arrival_iata TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            update_count INTEGER NOT NULL,
            last_departure_delay INTEGER NOT NULL,
            last_arrival_delay INTEGER NOT NULL,
            avg_departure_delay REAL NOT NULL,
            avg_arrival_delay REAL NOT NULL
        );
        CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
        INSERT INTO metadata (key, value) VALUES ('schema_version', '1');
        INSERT INTO flight_stats VALUES
            ('AAL1', 'AA1', 'American', 'JFK', 'LAX', '2024-01-01T00:00:00Z', 2, 5, 3, 4.5, 2.5);
    ";

    #[test]
    fn test_steps_cover_every_version() {
        assert_eq!(STEPS.len(), usize::try_from(CURRENT_VERSION).unwrap());
    }

    #[test]
    fn test_fresh_database_gets_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["flight_routes", "flight_stats", "metadata"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_reopen_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(stored_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_missing_version_reads_as_zero() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(super::super::schema::CREATE_METADATA_TABLE, [])
            .unwrap();
        assert_eq!(stored_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_v1_database_gains_flight_time() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(V1_STATS).unwrap();

        initialize_schema(&conn).unwrap();

        assert!(has_column(&conn, "flight_stats", "avg_flight_time").unwrap());
        let (count, time): (i64, f64) = conn
            .query_row(
                "SELECT update_count, avg_flight_time FROM flight_stats WHERE flight_icao = 'AAL1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 2);
        assert!(time.abs() < f64::EPSILON);
        assert_eq!(stored_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        store_version(&conn, CURRENT_VERSION + 1).unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_garbage_version_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = 'abc' WHERE key = ?1",
            [VERSION_KEY],
        )
        .unwrap();

        assert!(matches!(
            stored_version(&conn),
            Err(Error::DatabaseMigration { .. })
        ));
    }
}
