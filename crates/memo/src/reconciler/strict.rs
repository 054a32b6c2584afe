//! Strict TTL: serve an entry only while it is fresh.

use async_trait::async_trait;
use chrono::Utc;

use super::{Decision, ReconcileRequest, Reconciler};
use crate::Protocol;

/// The default reconciler.
///
/// A disabled TTL always fetches, without consulting storage. Otherwise a
/// missing or expired entry fetches and a fresh one is served.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictTtlReconciler;

#[async_trait]
impl Reconciler for StrictTtlReconciler {
    async fn should_fetch(&self, request: &ReconcileRequest, protocol: &Protocol) -> Decision {
        if request.ttl.is_disabled() {
            tracing::debug!(key = %request.key, ttl_ms = request.ttl.as_millis(), "cache disabled for request");
            return Decision::Fetch;
        }

        match protocol.storage().get(&request.key).await {
            Ok(Some(entry)) if entry.is_fresh_at(Utc::now()) => Decision::Serve(entry),
            Ok(Some(_)) => {
                tracing::debug!(key = %request.key, "cached entry expired");
                Decision::Fetch
            }
            Ok(None) => Decision::Fetch,
            Err(err) => {
                tracing::warn!(key = %request.key, error = %err, "storage read failed; fetching");
                Decision::Fetch
            }
        }
    }
}
