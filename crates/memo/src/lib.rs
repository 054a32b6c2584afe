//! Memoization protocol for expensive or remote fetches.
//!
//! Each [`memo`] call asks the configured [`Reconciler`] whether to serve a
//! stored [`Entry`](memorable_core::Entry), fetch a fresh value, or abstain,
//! then persists fresh values through the configured
//! [`Storage`](memorable_core::Storage) without waiting for the write.
//!
//! ```ignore
//! use memorable::{MemoRequest, Protocol};
//!
//! let protocol = Protocol::new();
//! let result = protocol
//!     .memo(MemoRequest::new("my-computation-result").fetch(|| async { expensive().await }))
//!     .await?;
//! ```

pub mod memo;
pub mod protocol;
pub mod reconciler;

pub use memo::{MemoRequest, memo};
pub use protocol::{Protocol, ProtocolOptions};
pub use reconciler::{Decision, Decodes, Fetcher, ReconcileRequest, Reconciler, StaleWhileRevalidate, StrictTtlReconciler};

pub use memorable_core::{BoxError, CacheStatus, Entry, Error, MemoResult, Storage, Ttl};

#[cfg(test)]
pub(crate) mod test_support;
