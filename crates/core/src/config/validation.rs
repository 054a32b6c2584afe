//! Configuration validation rules.
//!
//! Checks `MemorableConfig` values after they have been loaded from
//! environment, files, or defaults.

use crate::config::{MemorableConfig, ReconcilerKind, StorageBackend};
use thiserror::Error;

/// Longest allowed background revalidation delay (5 minutes).
const MAX_REVALIDATE_DELAY_MS: u64 = 300_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl MemorableConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `ttl_ms` is 0 (use a negative value to disable caching)
    /// - `revalidate_delay_ms` exceeds 5 minutes
    ///
    /// Returns `ConfigError::Missing` if the selected storage backend has an
    /// empty path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "ttl_ms".into(),
                reason: "must not be 0; use -1 to disable caching".into(),
            });
        }

        if self.revalidate_delay_ms > MAX_REVALIDATE_DELAY_MS {
            return Err(ConfigError::Invalid {
                field: "revalidate_delay_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        match self.storage {
            StorageBackend::Sqlite if self.db_path.as_os_str().is_empty() => {
                return Err(ConfigError::Missing {
                    field: "db_path".into(),
                    hint: "Set MEMORABLE_DB_PATH environment variable".into(),
                });
            }
            StorageBackend::File if self.file_path.as_os_str().is_empty() => {
                return Err(ConfigError::Missing {
                    field: "file_path".into(),
                    hint: "Set MEMORABLE_FILE_PATH environment variable".into(),
                });
            }
            _ => {}
        }

        if self.reconciler == ReconcilerKind::Strict && !self.strict_keys.is_empty() {
            tracing::warn!(
                strict_keys = self.strict_keys.len(),
                "strict_keys only apply to the stale_while_revalidate reconciler; ignoring"
            );
        }

        Ok(())
    }
}
