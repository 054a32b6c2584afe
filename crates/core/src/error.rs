//! Unified error types for memorable.
//!
//! Only `InvalidArgument` and `Fetch` ever reach a `memo` caller. The storage
//! variants surface from direct backend use; inside the orchestrator they are
//! logged and absorbed.

use tokio_rusqlite::rusqlite;

/// Boxed error produced by a caller-supplied fetch operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for memorable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `memo` call was missing its key or its fetch operation.
    #[error("INVALID_ARGUMENT: {0}")]
    InvalidArgument(String),

    /// The caller-supplied fetch operation failed.
    ///
    /// The caller's error is kept as-is and can be recovered by downcasting
    /// the source.
    #[error("FETCH_FAILED: {0}")]
    Fetch(#[source] BoxError),

    /// A storage backend could not complete an operation.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// SQLite operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A value could not be converted to or from its stored JSON form.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File-backed storage I/O failed.
    #[error("STORAGE_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from the caller's fetch operation.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
