use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};

/// Raw bytes of uploaded files, keyed by storage id
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, storage_id: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, storage_id: &str) -> Result<Option<Vec<u8>>>;

    async fn delete(&self, storage_id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, storage_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write().await.insert(storage_id.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, storage_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(storage_id).cloned())
    }

    async fn delete(&self, storage_id: &str) -> Result<()> {
        self.blobs.write().await.remove(storage_id);
        Ok(())
    }
}

/// One file per blob under a root directory
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, storage_id: &str) -> Result<PathBuf> {
        // Storage ids are generated uuids; anything else could escape the root
        if storage_id.is_empty()
            || !storage_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(PersistError::Internal(format!(
                "invalid storage id: {storage_id}"
            )));
        }
        Ok(self.root.join(storage_id))
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn put(&self, storage_id: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(storage_id)?;
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(storage_id, size = bytes.len(), "blob written");
        Ok(())
    }

    async fn get(&self, storage_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(storage_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, storage_id: &str) -> Result<()> {
        let path = self.path_for(storage_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
