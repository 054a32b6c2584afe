//! Key to entry persistence.
//!
//! Every backend honors the same contract:
//!
//! - `get` on a missing key returns `Ok(None)`, never an error
//! - `set` is last-write-wins and replaces the whole entry at once
//! - `remove` is idempotent
//!
//! Backends provided here:
//!
//! - [`MemoryStorage`]: process-local map (the default)
//! - [`SqliteStorage`]: SQLite via tokio-rusqlite, WAL mode, versioned migrations
//! - [`FileStorage`]: a single JSON document rewritten atomically on every mutation

pub mod file;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::{Entry, Error};

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Storage backend for memo entries.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up the entry for `key`.
    async fn get(&self, key: &str) -> Result<Option<Entry>, Error>;

    /// Store `entry` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, entry: Entry) -> Result<(), Error>;

    /// Delete the entry for `key`, if any.
    async fn remove(&self, key: &str) -> Result<(), Error>;
}
