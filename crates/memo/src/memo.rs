//! The `memo` entry point.
//!
//! Per call: resolve the TTL, ask the reconciler, then either fetch and
//! persist (MISS), return the reconciler's entry (HIT), or return an empty
//! MISS when the reconciler abstains.
//!
//! The storage write after a fetch is never awaited. It is started inline and,
//! if the backend needs to suspend, finished on a detached task. Persistence
//! is therefore eventual: a failed or slow write never affects the returned
//! result, and a failed write only shows up in the logs.
//!
//! Concurrent calls for the same key are not coordinated. Two callers that
//! both miss will both fetch and both write; the last write wins.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use memorable_core::{BoxError, Entry, Error, MemoResult, Storage, Ttl, entry::expires_at};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::Protocol;
use crate::reconciler::{Decision, Fetcher, ReconcileRequest};

type TypedFetch<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;

/// Parameters for one `memo` call.
///
/// ```ignore
/// let request = MemoRequest::new("user:42")
///     .ttl(Ttl::from_secs(30))
///     .fetch(|| async { load_user(42).await });
/// ```
pub struct MemoRequest<T> {
    key: String,
    ttl: Option<Ttl>,
    fetch: Option<TypedFetch<T>>,
}

impl<T> std::fmt::Debug for MemoRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoRequest")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("fetch", &self.fetch.is_some())
            .finish()
    }
}

impl<T: Send + 'static> MemoRequest<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ttl: None, fetch: None }
    }

    /// Override the protocol's default TTL for this call.
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// The operation producing a fresh value.
    ///
    /// It may be called more than once: by this call on a miss, and by a
    /// stale-while-revalidate reconciler refreshing in the background.
    pub fn fetch<F, Fut, E>(mut self, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let typed: TypedFetch<T> =
            Arc::new(move || fetch().map(|result| result.map_err(Into::<BoxError>::into)).boxed());
        self.fetch = Some(typed);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Erase the value type so reconcilers can fetch without knowing `T`.
fn erase<T>(fetch: TypedFetch<T>) -> Fetcher
where
    T: Serialize + Send + 'static,
{
    Arc::new(move || {
        fetch()
            .map(|result| result.and_then(|value| serde_json::to_value(value).map_err(Into::into)))
            .boxed()
    })
}

/// Serve `request` from cache or fetch it, as decided by the protocol's reconciler.
///
/// # Errors
///
/// - `Error::InvalidArgument` if the key is empty or no fetch was supplied;
///   nothing is read or written in that case.
/// - `Error::Fetch` carrying the fetch operation's own error. Nothing is
///   written and any previous entry stays in place.
pub async fn memo<T>(protocol: &Protocol, request: MemoRequest<T>) -> Result<MemoResult<T>, Error>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let MemoRequest { key, ttl, fetch } = request;
    if key.is_empty() {
        return Err(Error::InvalidArgument("key is required".into()));
    }
    let Some(fetch) = fetch else {
        return Err(Error::InvalidArgument("fetch is required".into()));
    };

    let ttl = ttl.unwrap_or(protocol.ttl());
    let reconcile = ReconcileRequest::new(key, ttl, erase(Arc::clone(&fetch)))
        .with_decodes(Arc::new(|value: &Value| T::deserialize(value).is_ok()));

    let decision = protocol.reconciler().should_fetch(&reconcile, protocol).await;
    match decision {
        Decision::Serve(entry) => match serde_json::from_value::<T>(entry.value.clone()) {
            Ok(value) => {
                tracing::debug!(key = %entry.key, "memo hit");
                return Ok(MemoResult::hit(entry, value));
            }
            Err(err) => {
                tracing::warn!(key = %entry.key, error = %err, "cached value does not decode; fetching");
            }
        },
        Decision::Abstain => {
            tracing::debug!(key = %reconcile.key, "reconciler abstained");
            return Ok(MemoResult::abstain(reconcile.key, ttl));
        }
        Decision::Fetch => {}
    }

    let ReconcileRequest { key, .. } = reconcile;
    let value = fetch().await.map_err(Error::Fetch)?;
    let written_at = Utc::now();

    let expires = match serde_json::to_value(&value) {
        Ok(json) => {
            let entry = Entry::new(key.clone(), ttl, json, written_at);
            let expires = entry.expires;
            dispatch_write(Arc::clone(protocol.storage()), entry).await;
            expires
        }
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "fetched value does not serialize; not persisting");
            expires_at(written_at, ttl)
        }
    };

    tracing::debug!(key = %key, ttl_ms = ttl.as_millis(), "memo miss");
    Ok(MemoResult::miss(key, ttl, value, expires))
}

/// Start persisting `entry` without waiting for it.
///
/// The write is polled once here so backends that never suspend finish
/// before `memo` returns. Anything still pending moves to a detached task.
async fn dispatch_write(storage: Arc<dyn Storage>, entry: Entry) {
    let mut write = Box::pin(persist(storage, entry));
    if futures_util::poll!(write.as_mut()).is_pending() {
        tokio::spawn(write);
    }
}

async fn persist(storage: Arc<dyn Storage>, entry: Entry) {
    let key = entry.key.clone();
    if let Err(err) = storage.set(&key, entry).await {
        tracing::warn!(key = %key, error = %err, "failed to persist memo entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolOptions;
    use crate::reconciler::Reconciler;
    use crate::test_support::{FailingStorage, GatedStorage, eventually};
    use async_trait::async_trait;
    use chrono::Duration;
    use memorable_core::{CacheStatus, MemoryStorage};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("upstream unavailable")]
    struct Upstream;

    fn counted(calls: &Arc<AtomicUsize>, value: &'static str) -> MemoRequest<String> {
        let calls = Arc::clone(calls);
        MemoRequest::new("k").fetch(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Upstream>(value.to_string()) }
        })
    }

    fn protocol_with(storage: Arc<dyn Storage>) -> Protocol {
        Protocol::with_options(ProtocolOptions { storage: Some(storage), ..Default::default() })
    }

    #[tokio::test]
    async fn test_back_to_back_calls_fetch_once() {
        let protocol = Protocol::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = protocol.memo(counted(&calls, "A")).await.unwrap();
        let second = protocol.memo(counted(&calls, "B")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(first.value, second.value);
        assert_eq!(first.expires, second.expires);
    }

    #[tokio::test]
    async fn test_miss_result_shape() {
        let protocol = Protocol::new();
        let before = Utc::now();
        let result = protocol
            .memo(MemoRequest::new("k").ttl(Ttl::from_secs(5)).fetch(|| async { Ok::<_, Upstream>(7u8) }))
            .await
            .unwrap();

        assert_eq!(result.key, "k");
        assert_eq!(result.ttl, Ttl::from_secs(5));
        assert_eq!(result.value, Some(7));
        assert!(result.expires >= before + Duration::seconds(5));
        assert!(result.expires <= Utc::now() + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_expiry_forces_refetch() {
        let protocol = Protocol::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = protocol.memo(counted(&calls, "A").ttl(Ttl::from_millis(30))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert!(Utc::now() >= first.expires);

        let second = protocol.memo(counted(&calls, "B").ttl(Ttl::from_millis(30))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.cache, CacheStatus::Miss);
        assert_eq!(second.value.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_disabled_ttl_always_fetches() {
        let protocol = Protocol::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for ttl in [Ttl::from_millis(0), Ttl::DISABLED] {
            for _ in 0..2 {
                let result = protocol.memo(counted(&calls, "A").ttl(ttl)).await.unwrap();
                assert_eq!(result.cache, CacheStatus::Miss);
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_protocol_default_ttl_disabled() {
        let protocol = Protocol::with_options(ProtocolOptions { ttl: Some(Ttl::DISABLED), ..Default::default() });
        let calls = Arc::new(AtomicUsize::new(0));

        protocol.memo(counted(&calls, "A")).await.unwrap();
        let second = protocol.memo(counted(&calls, "A")).await.unwrap();
        assert_eq!(second.cache, CacheStatus::Miss);
        assert_eq!(second.ttl, Ttl::DISABLED);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_touch_nothing() {
        let storage = FailingStorage::default();
        let protocol = protocol_with(Arc::new(storage.clone()));

        let no_key = protocol
            .memo(MemoRequest::new("").fetch(|| async { Ok::<_, Upstream>(1) }))
            .await;
        assert!(matches!(no_key, Err(Error::InvalidArgument(msg)) if msg.contains("key")));

        let no_fetch = protocol.memo(MemoRequest::<i32>::new("k")).await;
        assert!(matches!(no_fetch, Err(Error::InvalidArgument(msg)) if msg.contains("fetch")));

        assert_eq!(storage.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_and_keeps_entry() {
        let storage = MemoryStorage::new();
        let stale = Entry::new("k", Ttl::from_secs(1), json!("old"), Utc::now() - Duration::seconds(5));
        storage.set("k", stale.clone()).await.unwrap();
        let protocol = protocol_with(Arc::new(storage.clone()));

        let result = protocol
            .memo(MemoRequest::<String>::new("k").fetch(|| async { Err(Upstream) }))
            .await;

        let err = result.unwrap_err();
        assert!(err.is_fetch());
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<Upstream>().is_some());
        assert_eq!(storage.get("k").await.unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn test_slow_storage_does_not_block() {
        let storage = GatedStorage::default();
        let protocol = protocol_with(Arc::new(storage.clone()));

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            protocol.memo(MemoRequest::new("k").fetch(|| async { Ok::<_, Upstream>("A".to_string()) })),
        )
        .await
        .expect("memo waited on storage")
        .unwrap();

        assert_eq!(result.cache, CacheStatus::Miss);
        assert!(!storage.is_written());

        storage.open();
        eventually(|| {
            let storage = storage.clone();
            async move { storage.is_written().then_some(()) }
        })
        .await;
        assert_eq!(storage.inner().get("k").await.unwrap().unwrap().value, json!("A"));
    }

    #[tokio::test]
    async fn test_persist_failure_is_not_surfaced() {
        let protocol = protocol_with(Arc::new(FailingStorage::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = protocol.memo(counted(&calls, "A")).await.unwrap();
        assert_eq!(first.value.as_deref(), Some("A"));
        assert_eq!(first.cache, CacheStatus::Miss);

        let second = protocol.memo(counted(&calls, "A")).await.unwrap();
        assert_eq!(second.cache, CacheStatus::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_refetched() {
        let storage = MemoryStorage::new();
        storage
            .set("k", Entry::new("k", Ttl::DEFAULT, json!({"not": "a number"}), Utc::now()))
            .await
            .unwrap();
        let protocol = protocol_with(Arc::new(storage.clone()));

        let result = protocol
            .memo(MemoRequest::new("k").fetch(|| async { Ok::<_, Upstream>(5u64) }))
            .await
            .unwrap();
        assert_eq!(result.cache, CacheStatus::Miss);
        assert_eq!(result.value, Some(5));
        assert_eq!(storage.get("k").await.unwrap().unwrap().value, json!(5));
    }

    struct Abstaining;

    #[async_trait]
    impl Reconciler for Abstaining {
        async fn should_fetch(&self, _request: &ReconcileRequest, _protocol: &Protocol) -> Decision {
            Decision::Abstain
        }
    }

    #[tokio::test]
    async fn test_abstain_returns_empty_miss() {
        let storage = MemoryStorage::new();
        let protocol = Protocol::with_options(ProtocolOptions {
            storage: Some(Arc::new(storage.clone())),
            reconciler: Some(Arc::new(Abstaining)),
            ..Default::default()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let result = protocol.memo(counted(&calls, "A")).await.unwrap();
        assert_eq!(result.cache, CacheStatus::Miss);
        assert!(result.value.is_none());
        assert_eq!(result.expires.timestamp_millis(), 0);
        assert_eq!(result.ttl, Ttl::DEFAULT);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_forget_forces_refetch() {
        let protocol = Protocol::new();
        let calls = Arc::new(AtomicUsize::new(0));

        protocol.memo(counted(&calls, "A")).await.unwrap();
        protocol.forget("k").await.unwrap();
        let result = protocol.memo(counted(&calls, "A")).await.unwrap();

        assert_eq!(result.cache, CacheStatus::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_both_fetch() {
        let storage = GatedStorage::default();
        let protocol = Arc::new(protocol_with(Arc::new(storage.clone())));
        let calls = Arc::new(AtomicUsize::new(0));

        let a = tokio::spawn({
            let (protocol, calls) = (Arc::clone(&protocol), Arc::clone(&calls));
            async move { protocol.memo(counted(&calls, "A")).await }
        });
        let b = tokio::spawn({
            let (protocol, calls) = (Arc::clone(&protocol), Arc::clone(&calls));
            async move { protocol.memo(counted(&calls, "B")).await }
        });

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a.cache, CacheStatus::Miss);
        assert_eq!(b.cache, CacheStatus::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
