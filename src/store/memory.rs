//! In-process key/value store.

use crate::store::KeyValueStore;
use crate::SellergateError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Volatile store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SellergateError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SellergateError> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
