//! Database pool, migrations and per-entity queries
//!
//! Every query function takes a plain `&Connection`, so callers can pass a
//! pooled connection, a transaction or a savepoint without the storage layer
//! caring which.

pub mod achievements;
pub mod catalog;
pub mod certificates;
pub mod challenges;
pub mod communities;
pub mod db;
pub mod migrations;
pub mod progress;
pub mod users;

use chrono::{DateTime, Utc};

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};

/// Matches SQLite's `CURRENT_TIMESTAMP`, so stored values sort and compare
/// as plain strings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a moment the way it is stored in the database.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back. `None` for NULL-ish or foreign formats.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
pub(crate) fn test_connection() -> rusqlite::Connection {
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    migrations::run_migrations(&mut conn).unwrap();
    conn
}
