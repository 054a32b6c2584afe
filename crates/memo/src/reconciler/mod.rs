//! Fetch-or-serve decision strategies.
//!
//! A [`Reconciler`] looks at a request and the active [`Protocol`] and
//! decides whether the orchestrator should fetch, serve a cached entry, or
//! abstain. It never fails: anything ambiguous, including a storage read
//! error, must resolve to [`Decision::Fetch`].

mod strict;
mod swr;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use memorable_core::{BoxError, Entry, Ttl};
use serde_json::Value;

use crate::Protocol;

pub use strict::StrictTtlReconciler;
pub use swr::{Equality, StaleWhileRevalidate};

/// Type-erased fetch operation producing the JSON form of a value.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// Reports whether a stored JSON value decodes as the caller's type.
pub type Decodes = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A memo request with its TTL already resolved.
#[derive(Clone)]
pub struct ReconcileRequest {
    pub key: String,
    pub ttl: Ttl,
    pub fetch: Fetcher,
    pub decodes: Decodes,
}

impl ReconcileRequest {
    /// A request that accepts any stored value.
    pub fn new(key: impl Into<String>, ttl: Ttl, fetch: Fetcher) -> Self {
        Self { key: key.into(), ttl, fetch, decodes: Arc::new(|_: &Value| true) }
    }

    pub fn with_decodes(mut self, decodes: Decodes) -> Self {
        self.decodes = decodes;
        self
    }

    /// Whether `entry` can be handed back to the caller as a hit.
    pub fn accepts(&self, entry: &Entry) -> bool {
        (self.decodes)(&entry.value)
    }
}

impl std::fmt::Debug for ReconcileRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileRequest")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// What the orchestrator should do for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Invoke the fetch operation and persist its result.
    Fetch,
    /// Return an empty result without fetching or writing.
    Abstain,
    /// Return this cached entry as a hit.
    Serve(Entry),
}

/// Decision strategy consulted once per `memo` call.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn should_fetch(&self, request: &ReconcileRequest, protocol: &Protocol) -> Decision;
}
