//! Core types and shared functionality for memorable.
//!
//! This crate provides:
//! - The persisted `Entry` record and the `MemoResult` returned to callers
//! - The `Storage` trait with in-memory, SQLite and JSON file backends
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod entry;
pub mod error;
pub mod result;
pub mod storage;

pub use config::{ConfigError, MemorableConfig, ReconcilerKind, StorageBackend};
pub use entry::{Entry, Ttl};
pub use error::{BoxError, Error};
pub use result::{CacheStatus, MemoResult};
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, Storage};
