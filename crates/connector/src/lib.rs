//! Dictionary-like string store kept consistent with a dotenv file on disk.
//! - Reads refresh from the file, writes flush back to it; no explicit load/save.
//! - Several processes can share state through one file (last writer wins).
//! - `SyncedStore::copy` branches a store onto a new, independently synced file.

pub mod errors;
pub mod kv_store;
pub mod storage;

pub use errors::StoreError;
pub use kv_store::KvStore;
pub use storage::synced_store::{SyncedStore, DEFAULT_PATH};
