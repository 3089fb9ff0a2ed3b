//! Binary object storage for QR images.
//!
//! The store is a narrow put/get/public-url seam: production uses a
//! filesystem directory served under a configured public base URL, tests use
//! an in-memory map. Keys are flat file names (the single "qr-codes" bucket
//! is folded into the store's root and base URL).

#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, overwriting any existing object at `key`.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str)
    -> Result<(), ObjectStoreError>;

    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Stable public URL for an object.
    fn public_url(&self, key: &str) -> String;
}

/// Keys are generated from certificate identifiers, but reject path
/// separators anyway so a store can never write outside its root.
fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Filesystem-backed object store.
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            root,
            public_base_url,
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        tokio::fs::write(self.root.join(key), bytes)
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        validate_key(key)?;

        match tokio::fs::read(self.root.join(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(ObjectStoreError::Io(e.to_string())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}

/// In-memory object store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        self.objects
            .lock()
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        validate_key(key)?;
        self.objects
            .lock()
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://qr-codes/{key}")
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip_and_overwrite() {
        let store = MemoryObjectStore::default();
        store.put("a.png", b"one", "image/png").await.unwrap();
        store.put("a.png", b"two", "image/png").await.unwrap();

        assert_eq!(store.get("a.png").await.unwrap(), b"two");
        assert!(matches!(
            store.get("b.png").await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn keys_with_separators_are_rejected() {
        let store = MemoryObjectStore::default();
        for key in ["../evil.png", "a/b.png", ""] {
            assert!(matches!(
                store.put(key, b"x", "image/png").await,
                Err(ObjectStoreError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf(), "https://cdn.example.org/qr-codes/");

        store.put("c.png", b"png-bytes", "image/png").await.unwrap();
        assert_eq!(store.get("c.png").await.unwrap(), b"png-bytes");
        assert_eq!(
            store.public_url("c.png"),
            "https://cdn.example.org/qr-codes/c.png"
        );
        assert!(matches!(
            store.get("missing.png").await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }
}
