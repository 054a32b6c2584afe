//! SQLite-backed storage.
//!
//! Entries live in a single `entries` table keyed by memo key. Access goes
//! through tokio-rusqlite, which runs every statement on a dedicated
//! background thread, so each operation suspends the caller at least once.

mod connection;
mod entries;
mod migrations;

pub use connection::SqliteStorage;
