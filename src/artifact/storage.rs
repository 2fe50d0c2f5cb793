//! Path-addressed blob storage backends

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{AutoopError, Result};

/// Blob storage keyed by `/`-separated relative paths
pub trait Storage: Send + Sync {
    fn save(&self, data: &[u8], key: &str) -> Result<()>;

    /// Fails with [`AutoopError::ArtifactNotFound`] for unknown keys
    fn load(&self, key: &str) -> Result<Vec<u8>>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Keys under `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    fn exists(&self, key: &str) -> bool {
        self.load(key).is_ok()
    }
}

/// Reject empty, absolute and parent-escaping keys
fn check_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(AutoopError::InvalidInput(format!(
            "invalid storage key '{}'",
            key
        )));
    }
    Ok(())
}

/// Files under a base directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    /// Open storage rooted at `base_dir`, creating the directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.base_dir.join(key))
    }

    fn walk(&self, dir: &Path, keys: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.walk(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.base_dir) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    fn save(&self, data: &[u8], key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        debug!(key, bytes = data.len(), "stored blob");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(AutoopError::ArtifactNotFound(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(AutoopError::ArtifactNotFound(key.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if self.base_dir.is_dir() {
            self.walk(&self.base_dir, &mut keys)?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

/// In-process storage for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn save(&self, data: &[u8], key: &str) -> Result<()> {
        check_key(key)?;
        self.blobs.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| AutoopError::ArtifactNotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| AutoopError::ArtifactNotFound(key.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn exists(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(storage: &dyn Storage) {
        storage.save(b"one", "a/x.bin").unwrap();
        storage.save(b"two", "a/y.bin").unwrap();
        storage.save(b"three", "b/z.bin").unwrap();

        assert_eq!(storage.load("a/x.bin").unwrap(), b"one");
        assert_eq!(storage.list("a/").unwrap(), vec!["a/x.bin", "a/y.bin"]);
        assert_eq!(storage.list("").unwrap().len(), 3);

        storage.save(b"uno", "a/x.bin").unwrap();
        assert_eq!(storage.load("a/x.bin").unwrap(), b"uno");

        storage.delete("a/x.bin").unwrap();
        assert!(!storage.exists("a/x.bin"));
        assert!(matches!(
            storage.load("a/x.bin"),
            Err(AutoopError::ArtifactNotFound(_))
        ));
        assert!(matches!(
            storage.delete("a/x.bin"),
            Err(AutoopError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_memory_storage() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn test_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&LocalStorage::new(dir.path().join("objects")).unwrap());
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let storage = MemoryStorage::new();
        assert!(storage.save(b"x", "../outside").is_err());
        assert!(storage.save(b"x", "/abs").is_err());
        assert!(storage.save(b"x", "").is_err());
    }
}
