//! Shared configuration: default TTL, active storage, active reconciler.
//!
//! Build one `Protocol` at startup, configure it, then share it (by reference
//! or behind an `Arc`) with every caller. `configure` takes `&mut self`, so
//! reconfiguring a protocol that is already shared requires the caller to
//! coordinate; nothing here locks around it.

use std::sync::Arc;

use memorable_core::{
    Error, FileStorage, MemorableConfig, MemoResult, MemoryStorage, ReconcilerKind, SqliteStorage, Storage,
    StorageBackend, Ttl,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::memo::{MemoRequest, memo};
use crate::reconciler::{Reconciler, StaleWhileRevalidate, StrictTtlReconciler};

/// Replacement values for [`Protocol::configure`]. `None` keeps the current value.
#[derive(Clone, Default)]
pub struct ProtocolOptions {
    /// New default TTL. Zero is ignored like `None`; negative disables caching.
    pub ttl: Option<Ttl>,
    pub storage: Option<Arc<dyn Storage>>,
    pub reconciler: Option<Arc<dyn Reconciler>>,
}

/// Process-wide memoization settings consulted by every `memo` call.
#[derive(Clone)]
pub struct Protocol {
    ttl: Ttl,
    storage: Arc<dyn Storage>,
    reconciler: Arc<dyn Reconciler>,
}

impl Default for Protocol {
    /// Ten minute TTL, in-memory storage, strict TTL reconciler.
    fn default() -> Self {
        Self { ttl: Ttl::DEFAULT, storage: Arc::new(MemoryStorage::new()), reconciler: Arc::new(StrictTtlReconciler) }
    }
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with `options` applied.
    pub fn with_options(options: ProtocolOptions) -> Self {
        let mut protocol = Self::default();
        protocol.configure(options);
        protocol
    }

    /// Replace any of the default TTL, storage and reconciler.
    pub fn configure(&mut self, options: ProtocolOptions) {
        if let Some(ttl) = options.ttl
            && ttl.as_millis() != 0
        {
            self.ttl = ttl;
        }
        if let Some(storage) = options.storage {
            self.storage = storage;
        }
        if let Some(reconciler) = options.reconciler {
            self.reconciler = reconciler;
        }
    }

    /// Build a protocol from loaded configuration, opening the selected backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQLite database or the storage file cannot be opened.
    pub async fn from_config(config: &MemorableConfig) -> Result<Self, Error> {
        let storage: Arc<dyn Storage> = match config.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Sqlite => Arc::new(SqliteStorage::open(&config.db_path).await?),
            StorageBackend::File => Arc::new(FileStorage::open(&config.file_path).await?),
        };

        let reconciler: Arc<dyn Reconciler> = match config.reconciler {
            ReconcilerKind::Strict => Arc::new(StrictTtlReconciler),
            ReconcilerKind::StaleWhileRevalidate => Arc::new(
                StaleWhileRevalidate::new()
                    .strict_keys(config.strict_keys.iter().cloned())
                    .revalidate_after(config.revalidate_delay()),
            ),
        };

        tracing::info!(
            ttl_ms = config.ttl_ms,
            storage = ?config.storage,
            reconciler = ?config.reconciler,
            "memorable protocol configured"
        );

        Ok(Self::with_options(ProtocolOptions {
            ttl: Some(config.ttl()),
            storage: Some(storage),
            reconciler: Some(reconciler),
        }))
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn reconciler(&self) -> &Arc<dyn Reconciler> {
        &self.reconciler
    }

    /// Shorthand for [`memo`](crate::memo()) against this protocol.
    pub async fn memo<T>(&self, request: MemoRequest<T>) -> Result<MemoResult<T>, Error>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        memo(self, request).await
    }

    /// Remove the stored entry for `key` so the next call fetches.
    pub async fn forget(&self, key: &str) -> Result<(), Error> {
        self.storage.remove(key).await
    }
}
