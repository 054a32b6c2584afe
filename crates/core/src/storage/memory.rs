//! Process-local storage.
//!
//! Nothing survives a restart. Operations never suspend, so a write started
//! by the orchestrator is visible to the very next read.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::Storage;
use crate::{Entry, Error};

/// In-memory storage backed by a `HashMap`.
///
/// Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry that is no longer fresh.
    ///
    /// Returns the number of removed entries.
    pub fn purge_expired(&self) -> Result<u64, Error> {
        let now = Utc::now();
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let before = state.len();
        state.retain(|_, entry| entry.is_fresh_at(now));
        Ok((before - state.len()) as u64)
    }
}

fn poisoned() -> Error {
    Error::Storage("memory storage lock poisoned".into())
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Entry>, Error> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<(), Error> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.remove(key);
        Ok(())
    }
}
