//! Shared fixtures for unit tests.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use memorable_core::{BoxError, Entry, Error, MemoryStorage, Storage, Ttl};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::reconciler::{Fetcher, ReconcileRequest};

pub fn fetcher(value: Value) -> Fetcher {
    Arc::new(move || {
        let value = value.clone();
        async move { Ok::<_, BoxError>(value) }.boxed()
    })
}

pub fn counting_fetcher(value: Value, calls: Arc<AtomicUsize>) -> Fetcher {
    Arc::new(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let value = value.clone();
        async move { Ok::<_, BoxError>(value) }.boxed()
    })
}

pub fn request(key: &str, ttl: Ttl) -> ReconcileRequest {
    ReconcileRequest::new(key, ttl, fetcher(Value::Null))
}

/// Poll `probe` until it yields a value, panicking after five seconds.
pub async fn eventually<F, Fut, T>(mut probe: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..500 {
        if let Some(value) = probe().await {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

/// Storage whose every operation fails.
#[derive(Clone, Default)]
pub struct FailingStorage {
    calls: Arc<AtomicUsize>,
}

impl FailingStorage {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> Error {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Error::Storage("unavailable".into())
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get(&self, _key: &str) -> Result<Option<Entry>, Error> {
        Err(self.fail())
    }

    async fn set(&self, _key: &str, _entry: Entry) -> Result<(), Error> {
        Err(self.fail())
    }

    async fn remove(&self, _key: &str) -> Result<(), Error> {
        Err(self.fail())
    }
}

/// In-memory storage whose writes block until [`open`](Self::open) is called.
#[derive(Clone)]
pub struct GatedStorage {
    inner: MemoryStorage,
    gate: Arc<Semaphore>,
    written: Arc<AtomicBool>,
}

impl Default for GatedStorage {
    fn default() -> Self {
        Self { inner: MemoryStorage::new(), gate: Arc::new(Semaphore::new(0)), written: Arc::new(AtomicBool::new(false)) }
    }
}

impl GatedStorage {
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

#[async_trait]
impl Storage for GatedStorage {
    async fn get(&self, key: &str) -> Result<Option<Entry>, Error> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<(), Error> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        self.inner.set(key, entry).await?;
        self.written.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.inner.remove(key).await
    }
}
