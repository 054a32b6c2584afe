//! Single-file JSON storage.
//!
//! The whole key to entry map is one JSON object on disk. It is loaded once
//! on open and rewritten after every `set` and `remove`, through a temporary
//! file and a rename so readers of the file never see a partial write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Storage;
use crate::{Entry, Error};

/// JSON file storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<HashMap<String, Entry>>,
}

impl FileStorage {
    /// Open the storage file at `path`.
    ///
    /// A missing or unreadable file starts an empty map; it is created on the
    /// first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable storage file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read storage file; starting empty");
                HashMap::new()
            }
        };

        Ok(Self { path, state: Mutex::new(state) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, state: &HashMap<String, Entry>) -> Result<(), Error> {
        let bytes = serde_json::to_vec(state)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Entry>, Error> {
        Ok(self.state.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: Entry) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let previous = state.insert(key.to_string(), entry);
        if let Err(e) = self.flush(&state).await {
            match previous {
                Some(previous) => state.insert(key.to_string(), previous),
                None => state.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let Some(previous) = state.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.flush(&state).await {
            state.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}
