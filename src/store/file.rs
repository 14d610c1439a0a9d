//! Directory-backed [`KeyValueStore`] for hosts without their own persistence.
//!
//! Each key maps to one file named after a digest of the key. Values are
//! written to a sibling `.tmp` file first and renamed into place, so a crash
//! mid-write leaves the previous value readable.

use crate::store::KeyValueStore;
use crate::SellergateError;
use std::fs;
use std::path::{Path, PathBuf};

/// File-based store.
pub struct FileStore {
    /// Directory holding one file per key.
    dir: PathBuf,
}

impl FileStore {
    /// Store under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, SellergateError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| SellergateError::Store("No platform data directory".to_string()))?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create a store rooted at a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, SellergateError> {
        fs::create_dir_all(&dir)
            .map_err(|e| SellergateError::Store(format!("Cannot create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    /// Directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, digest: &str) -> PathBuf {
        let short = &digest[..16.min(digest.len())];
        self.dir.join(format!("{}.json", short))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SellergateError> {
        let path = self.value_path(&hash_key(key));
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SellergateError::Store(format!("Cannot read {}: {}", path.display(), e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SellergateError> {
        let digest = hash_key(key);
        let path = self.value_path(&digest);
        let staging = self.dir.join(format!("{}.tmp", digest));

        fs::write(&staging, value)
            .map_err(|e| SellergateError::Store(format!("Cannot write {}: {}", staging.display(), e)))?;
        fs::rename(&staging, &path)
            .map_err(|e| SellergateError::Store(format!("Cannot replace {}: {}", path.display(), e)))
    }
}

/// SHA-256 of a storage key, hex-encoded.
pub fn hash_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(key.as_bytes()))
}
