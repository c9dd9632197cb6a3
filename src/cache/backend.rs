//! Storage backend implementations.
//!
//! A backend is a namespaced key-value byte store. Cache stores serialize
//! their entries and keep them here; the backend knows nothing about
//! responses or eviction.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{CacheError, Result};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;
    /// Stores a value, creating the namespace on first write.
    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;
    async fn keys(&self, namespace: &str) -> Result<Vec<String>>;
    /// Removes a namespace and everything in it.
    async fn clear(&self, namespace: &str) -> Result<()>;
    async fn namespaces(&self) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}

// == Memory Backend ==
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces
            .get_mut(namespace)
            .map(|ns| ns.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// == File Backend ==
/// Disk backend: one directory per namespace, one file per key.
///
/// Directory names are the hex encoding of the namespace. File names are the
/// SHA-256 of the key; each file holds a little-endian u32 key length, the
/// key, then the value. Writes go to a temp file first and are renamed into
/// place, so readers never observe a partial entry.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

const ENTRY_EXTENSION: &str = "entry";

impl FileBackend {
    /// Opens (and creates if missing) a backend rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(hex::encode(namespace.as_bytes()))
    }

    fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.namespace_dir(namespace)
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    fn encode_record(key: &str, value: &[u8]) -> Vec<u8> {
        let key_bytes = key.as_bytes();
        let mut record = Vec::with_capacity(4 + key_bytes.len() + value.len());
        record.extend_from_slice(&(key_bytes.len() as u32).to_le_bytes());
        record.extend_from_slice(key_bytes);
        record.extend_from_slice(value);
        record
    }

    fn decode_record(record: &[u8]) -> Result<(String, Vec<u8>)> {
        if record.len() < 4 {
            return Err(CacheError::Storage("truncated entry record".to_string()));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&record[..4]);
        let key_len = u32::from_le_bytes(len_bytes) as usize;
        let rest = &record[4..];
        if rest.len() < key_len {
            return Err(CacheError::Storage("truncated entry key".to_string()));
        }
        let key = String::from_utf8(rest[..key_len].to_vec())
            .map_err(|e| CacheError::Storage(format!("entry key is not UTF-8: {}", e)))?;
        Ok((key, rest[key_len..].to_vec()))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.entry_path(namespace, key)).await {
            Ok(record) => {
                let (stored_key, value) = Self::decode_record(&record)?;
                // A digest collision must not serve another key's value.
                if stored_key == key {
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        let dir = self.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.entry_path(namespace, key);
        let tmp = dir.join(format!(
            ".tmp-{}-{}",
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, Self::encode_record(key, value)).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.entry_path(namespace, key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let record = match tokio::fs::read(&path).await {
                Ok(record) => record,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Skipping unreadable entry file {}: {}", path.display(), e);
                    continue;
                }
            };
            match Self::decode_record(&record) {
                Ok((key, _)) => keys.push(key),
                Err(e) => {
                    warn!("Removing corrupt entry file {}: {}", path.display(), e);
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!("Failed to remove {}: {}", path.display(), e);
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        match tokio::fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            let decoded = item
                .file_name()
                .to_str()
                .and_then(|name| hex::decode(name).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some(name) = decoded {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
