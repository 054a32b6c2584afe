//! Persisted cache records and their time-to-live.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time-to-live in milliseconds.
///
/// Signed on purpose: any value `<= 0` means caching is disabled for the
/// request that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ttl(i64);

impl Ttl {
    /// Conventional "never cache" value.
    pub const DISABLED: Ttl = Ttl(-1);

    /// Default protocol TTL (10 minutes).
    pub const DEFAULT: Ttl = Ttl(10 * 60 * 1000);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// True when this TTL can never produce a fresh entry.
    pub const fn is_disabled(&self) -> bool {
        self.0 <= 0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::try_milliseconds(self.0).unwrap_or(if self.0 < 0 { Duration::MIN } else { Duration::MAX })
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<std::time::Duration> for Ttl {
    fn from(duration: std::time::Duration) -> Self {
        Self(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }
}

/// A persisted memo for one key.
///
/// `value` is kept in its JSON form so a single storage backend can hold
/// values of any serializable type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub ttl: Ttl,
    pub value: serde_json::Value,
    pub expires: DateTime<Utc>,
}

impl Entry {
    /// Build an entry written at `written_at`, expiring `ttl` later.
    pub fn new(key: impl Into<String>, ttl: Ttl, value: serde_json::Value, written_at: DateTime<Utc>) -> Self {
        let expires = expires_at(written_at, ttl);
        Self { key: key.into(), ttl, value, expires }
    }

    /// Fresh strictly before `expires`; expired from `expires` onwards.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// `written_at + ttl`, saturating at the representable bounds.
pub fn expires_at(written_at: DateTime<Utc>, ttl: Ttl) -> DateTime<Utc> {
    written_at.checked_add_signed(ttl.as_duration()).unwrap_or(if ttl.is_disabled() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
