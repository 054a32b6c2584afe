//! Stale-while-revalidate: answer from cache, refresh out of band.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use memorable_core::{Entry, Storage, Ttl};
use serde_json::Value;

use super::{Decision, Fetcher, ReconcileRequest, Reconciler, StrictTtlReconciler};
use crate::Protocol;

/// Decides whether a refreshed value differs from the stale one.
pub type Equality = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Serves stale entries immediately and refreshes them on a detached task.
///
/// Keys registered with [`strict_key`](Self::strict_key), and requests whose
/// TTL is disabled, are delegated to [`StrictTtlReconciler`].
///
/// The refresh task is spawned on the current tokio runtime. It is not tied
/// to the originating call, nothing observes its completion, and it cannot
/// be cancelled; if the runtime shuts down first the refresh is simply lost.
/// A refresh writes a new entry only when the fetched value differs from the
/// stale one, so an unchanged value stays stale and is refreshed again on the
/// next call.
#[derive(Clone)]
pub struct StaleWhileRevalidate {
    strict: StrictTtlReconciler,
    strict_keys: HashSet<String>,
    equals: Equality,
    delay: Duration,
}

impl Default for StaleWhileRevalidate {
    fn default() -> Self {
        Self {
            strict: StrictTtlReconciler,
            strict_keys: HashSet::new(),
            equals: Arc::new(|a: &Value, b: &Value| a == b),
            delay: Duration::ZERO,
        }
    }
}

impl std::fmt::Debug for StaleWhileRevalidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleWhileRevalidate")
            .field("strict_keys", &self.strict_keys)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl StaleWhileRevalidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep strict TTL semantics for `key`.
    pub fn strict_key(mut self, key: impl Into<String>) -> Self {
        self.strict_keys.insert(key.into());
        self
    }

    pub fn strict_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strict_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Replace the default JSON equality used to detect changed values.
    pub fn with_equality<F>(mut self, equals: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.equals = Arc::new(equals);
        self
    }

    /// Wait `delay` before the background fetch starts.
    pub fn revalidate_after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn spawn_revalidation(&self, storage: Arc<dyn Storage>, fetch: Fetcher, stale: Entry, ttl: Ttl) {
        let equals = Arc::clone(&self.equals);
        let delay = self.delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            revalidate(storage.as_ref(), &fetch, &stale, ttl, &equals).await;
        });
    }
}

async fn revalidate(storage: &dyn Storage, fetch: &Fetcher, stale: &Entry, ttl: Ttl, equals: &Equality) {
    let value = match fetch().await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(key = %stale.key, error = %err, "background revalidation fetch failed");
            return;
        }
    };

    if equals(&stale.value, &value) {
        tracing::debug!(key = %stale.key, "revalidated value unchanged");
        return;
    }

    let entry = Entry::new(stale.key.clone(), ttl, value, Utc::now());
    match storage.set(&stale.key, entry).await {
        Ok(()) => tracing::debug!(key = %stale.key, ttl_ms = ttl.as_millis(), "revalidated entry stored"),
        Err(err) => tracing::warn!(key = %stale.key, error = %err, "failed to store revalidated entry"),
    }
}

#[async_trait]
impl Reconciler for StaleWhileRevalidate {
    async fn should_fetch(&self, request: &ReconcileRequest, protocol: &Protocol) -> Decision {
        if request.ttl.is_disabled() || self.strict_keys.contains(&request.key) {
            return self.strict.should_fetch(request, protocol).await;
        }

        let entry = match protocol.storage().get(&request.key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Decision::Fetch,
            Err(err) => {
                tracing::warn!(key = %request.key, error = %err, "storage read failed; fetching");
                return Decision::Fetch;
            }
        };

        if !request.accepts(&entry) {
            tracing::debug!(key = %request.key, "cached value does not decode; fetching");
            return Decision::Fetch;
        }

        if !entry.is_fresh_at(Utc::now()) {
            tracing::debug!(key = %request.key, "serving stale entry while revalidating");
            self.spawn_revalidation(
                Arc::clone(protocol.storage()),
                Arc::clone(&request.fetch),
                entry.clone(),
                request.ttl,
            );
        }

        Decision::Serve(entry)
    }
}
