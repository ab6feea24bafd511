use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::error::{ClientError, Result};

/// The fixed key the credential is persisted under.
pub const TOKEN_STORAGE_KEY: &str = "access-token";

/// TokenStore
///
/// Durable home of the session credential. Survives process restarts so a reload
/// does not force re-authentication. Never touches the network.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, token: &str) -> Result<()>;
    async fn read(&self) -> Result<Option<String>>;
    /// Removes the credential. Succeeds when nothing is stored.
    async fn clear(&self) -> Result<()>;
}

pub type TokenStoreState = Arc<dyn TokenStore>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    #[serde(rename = "access-token")]
    access_token: String,
}

/// FileTokenStore
///
/// Keeps the credential in a small JSON document on disk, the client-side analogue
/// of browser local storage.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn save(&self, token: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string_pretty(&StoredToken {
            access_token: token.to_string(),
        })?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    async fn read(&self) -> Result<Option<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // A corrupt document is reported as an empty store; the session layer
        // then starts anonymous instead of failing startup.
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(stored) if !stored.access_token.is_empty() => Ok(Some(stored.access_token)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::from(e)),
        }
    }
}

/// MemoryTokenStore
///
/// In-memory store for tests. Clones share the same slot, which lets a test hand
/// one store to two independent session managers to simulate a process reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.to_string()))),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, token: &str) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    async fn read(&self) -> Result<Option<String>> {
        let slot = self
            .slot
            .lock()
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        Ok(slot.clone())
    }

    async fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
