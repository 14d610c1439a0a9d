//! Entitlement persistence.
//!
//! The host supplies a plain key/value capability ([`KeyValueStore`]);
//! [`EntitlementStore`] keeps one JSON record per product on top of it so
//! writes for unrelated products never share a blob.

pub mod file;
pub mod memory;
pub mod record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{AuthState, EntitlementRecord};

use crate::SellergateError;
use std::sync::Arc;

/// Storage key prefix for entitlement records.
pub const STORAGE_KEY: &str = "sellergate_authdata";

/// Persistence capability provided by the host.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, SellergateError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), SellergateError>;
}

/// Typed access to entitlement records.
#[derive(Clone)]
pub struct EntitlementStore {
    backend: Arc<dyn KeyValueStore>,
}

impl EntitlementStore {
    /// Wrap a key/value backend.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Storage key for a product's record.
    pub fn record_key(product_id: &str) -> String {
        format!("{}:{}", STORAGE_KEY, product_id)
    }

    /// Load a product's record, if one was ever written.
    pub fn load(&self, product_id: &str) -> Result<Option<EntitlementRecord>, SellergateError> {
        let Some(json) = self.backend.get(&Self::record_key(product_id))? else {
            return Ok(None);
        };
        let mut record = EntitlementRecord::from_json(&json)?;
        // Records written before the key carried the id
        if record.product_id.is_empty() {
            record.product_id = product_id.to_string();
        }
        Ok(Some(record))
    }

    /// Persist a record under its product id.
    pub fn save(&self, record: &EntitlementRecord) -> Result<(), SellergateError> {
        let json = record.to_json()?;
        self.backend.set(&Self::record_key(&record.product_id), &json)
    }
}
