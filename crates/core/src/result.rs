//! The record handed back to `memo` callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, Ttl};

/// Whether a result was served from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Outcome of a single `memo` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoResult<T> {
    pub key: String,
    pub ttl: Ttl,
    pub value: Option<T>,
    pub expires: DateTime<Utc>,
    pub cache: CacheStatus,
}

impl<T> MemoResult<T> {
    /// A freshly fetched value.
    pub fn miss(key: impl Into<String>, ttl: Ttl, value: T, expires: DateTime<Utc>) -> Self {
        Self { key: key.into(), ttl, value: Some(value), expires, cache: CacheStatus::Miss }
    }

    /// A value served from `entry`, carrying the entry's own metadata.
    pub fn hit(entry: Entry, value: T) -> Self {
        Self { key: entry.key, ttl: entry.ttl, value: Some(value), expires: entry.expires, cache: CacheStatus::Hit }
    }

    /// The empty result produced when a reconciler abstains.
    pub fn abstain(key: impl Into<String>, ttl: Ttl) -> Self {
        Self { key: key.into(), ttl, value: None, expires: DateTime::<Utc>::UNIX_EPOCH, cache: CacheStatus::Miss }
    }

    pub fn is_hit(&self) -> bool {
        self.cache == CacheStatus::Hit
    }
}
