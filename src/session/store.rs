//! Durable key-value storage for the session.
//!
//! The session persists exactly two keys (see [`keys`]). The file backend
//! keeps them in one small JSON object so they are written and cleared
//! together.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::SessionError;

/// Keys used for session persistence.
pub mod keys {
    /// Raw phone number of the signed-in user.
    pub const PHONE: &str = "landify.phone";
    /// JSON-serialized profile object.
    pub const PROFILE: &str = "landify.profile";
}

/// Process-durable string storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Remove all given keys in one write.
    async fn remove(&self, keys: &[&str]) -> Result<(), SessionError>;
}

/// JSON-file-backed store.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: RwLock<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, SessionError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SessionError::Corrupt {
                key: self.path.display().to_string(),
                reason: "expected a JSON object".into(),
            }),
            Err(e) => Err(SessionError::Corrupt {
                key: self.path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn save(&self, map: &Map<String, Value>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(map).map_err(|e| SessionError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.read().await;
        let map = self.load().await?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let _guard = self.lock.write().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&map).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), SessionError> {
        let _guard = self.lock.write().await;
        let mut map = match self.load().await {
            Ok(map) => map,
            // A corrupt file is replaced rather than blocking logout.
            Err(SessionError::Corrupt { .. }) => Map::new(),
            Err(e) => return Err(e),
        };
        for key in keys {
            map.remove(*key);
        }
        self.save(&map).await
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
