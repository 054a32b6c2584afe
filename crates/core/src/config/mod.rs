//! Protocol configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MEMORABLE_*)
//! 2. TOML config file (if MEMORABLE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::Ttl;

mod validation;

pub use validation::ConfigError;

/// Which storage backend the protocol should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
    File,
}

/// Which reconciler strategy the protocol should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilerKind {
    /// Serve only fresh entries; fetch otherwise.
    #[default]
    Strict,
    /// Serve stale entries immediately and refresh them in the background.
    StaleWhileRevalidate,
}

/// Protocol configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MEMORABLE_*)
/// 2. TOML config file (if MEMORABLE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorableConfig {
    /// Default time-to-live in milliseconds; `-1` disables caching.
    ///
    /// Set via MEMORABLE_TTL_MS environment variable.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: i64,

    /// Storage backend.
    ///
    /// Set via MEMORABLE_STORAGE environment variable.
    #[serde(default)]
    pub storage: StorageBackend,

    /// Path to the SQLite database (sqlite backend only).
    ///
    /// Set via MEMORABLE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Path to the JSON storage file (file backend only).
    ///
    /// Set via MEMORABLE_FILE_PATH environment variable.
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,

    /// Reconciler strategy.
    ///
    /// Set via MEMORABLE_RECONCILER environment variable.
    #[serde(default)]
    pub reconciler: ReconcilerKind,

    /// Keys that keep strict TTL semantics under stale-while-revalidate.
    ///
    /// Set via MEMORABLE_STRICT_KEYS environment variable (e.g. `[a,b]`).
    #[serde(default)]
    pub strict_keys: Vec<String>,

    /// Delay before a stale entry is refreshed in the background, in milliseconds.
    ///
    /// Set via MEMORABLE_REVALIDATE_DELAY_MS environment variable.
    #[serde(default)]
    pub revalidate_delay_ms: u64,
}

fn default_ttl_ms() -> i64 {
    Ttl::DEFAULT.as_millis()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./memorable.sqlite")
}

fn default_file_path() -> PathBuf {
    PathBuf::from("./memorable.json")
}

impl Default for MemorableConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            storage: StorageBackend::default(),
            db_path: default_db_path(),
            file_path: default_file_path(),
            reconciler: ReconcilerKind::default(),
            strict_keys: Vec::new(),
            revalidate_delay_ms: 0,
        }
    }
}

impl MemorableConfig {
    pub fn ttl(&self) -> Ttl {
        Ttl::from_millis(self.ttl_ms)
    }

    /// Revalidation delay as Duration for use with tokio.
    pub fn revalidate_delay(&self) -> Duration {
        Duration::from_millis(self.revalidate_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MEMORABLE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MEMORABLE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
