//! Entry CRUD operations.

use super::connection::SqliteStorage;
use crate::storage::Storage;
use crate::{Entry, Error, Ttl};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// 9999-12-31T23:59:59.999Z, the last instant with a four-digit year.
const LATEST_MILLIS: i64 = 253_402_300_799_999;

/// Fixed-width UTC timestamps so `expires_at` compares correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    let millis = at.timestamp_millis().clamp(0, LATEST_MILLIS);
    DateTime::from_timestamp_millis(millis)
        .unwrap_or(at)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("invalid expires_at {raw:?}: {e}")))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<Entry>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Entry>, Error> {
                let mut stmt = conn.prepare("SELECT key, ttl_ms, value_json, expires_at FROM entries WHERE key = ?1")?;

                let result = stmt.query_row(params![key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?))
                });

                match result {
                    Ok((key, ttl_ms, value_json, expires_at)) => Ok(Some(Entry {
                        key,
                        ttl: Ttl::from_millis(ttl_ms),
                        value: serde_json::from_str(&value_json)?,
                        expires: parse_timestamp(&expires_at)?,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics: inserts if the key doesn't exist, replaces all
    /// fields if it does.
    async fn set(&self, key: &str, entry: Entry) -> Result<(), Error> {
        let key = key.to_string();
        let value_json = serde_json::to_string(&entry.value)?;
        let expires_at = timestamp(entry.expires);
        let written_at = timestamp(Utc::now());
        let ttl_ms = entry.ttl.as_millis();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, ttl_ms, value_json, expires_at, written_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(key) DO UPDATE SET
                        ttl_ms = excluded.ttl_ms,
                        value_json = excluded.value_json,
                        expires_at = excluded.expires_at,
                        written_at = excluded.written_at",
                    params![key, ttl_ms, value_json, expires_at, written_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

impl SqliteStorage {
    /// Delete entries that are no longer fresh.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries, fresh or not.
    pub async fn count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
