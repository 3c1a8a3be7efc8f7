//! Object bucket holding uploaded files.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;

/// Directory under a local bucket root holding content-type sidecars.
const META_DIR: &str = ".meta";

/// An object read back from a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl StoredObject {
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Errors from a bucket.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value blob storage.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Store `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Fetch the object under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;
}

/// Bucket backed by a directory on disk.
pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to a path under the root, refusing keys that would escape it.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(key)
    }
}

#[async_trait]
impl Bucket for LocalBucket {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let meta = self.meta_path(key);

        for p in [&path, &meta] {
            if let Some(parent) = p.parent() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(&path, &body).await?;
        fs::write(&meta, content_type).await?;

        tracing::debug!("Stored {} ({} bytes)", key, body.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.object_path(key)?;

        let body = match fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let content_type = fs::read_to_string(self.meta_path(key))
            .await
            .ok()
            .filter(|ct| !ct.is_empty());

        Ok(Some(StoredObject { body, content_type }))
    }
}

/// Bucket held in process memory.
#[derive(Default)]
pub struct MemoryBucket {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        Ok(self.objects.read().await.get(key).cloned())
    }
}
