use crate::errors::StoreError;
use crate::storage::synced_store::SyncedStore;

/// String key/value operations shared by callers that only need the basics.
/// `SyncedStore` is the file-backed implementation.
pub trait KvStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<String, StoreError>;
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn contains(&self, key: &str) -> Result<bool, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn pop_or(&self, key: &str, default: &str) -> Result<String, StoreError>;
    fn items(&self) -> Result<Vec<(String, String)>, StoreError>;
}

impl KvStore for SyncedStore {
    fn get_item(&self, key: &str) -> Result<String, StoreError> { self.get_item(key) }
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> { self.get(key) }
    fn contains(&self, key: &str) -> Result<bool, StoreError> { self.contains(key) }
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> { self.set(key, value) }
    fn pop_or(&self, key: &str, default: &str) -> Result<String, StoreError> { self.pop_or(key, default) }
    fn items(&self) -> Result<Vec<(String, String)>, StoreError> { self.items() }
}
