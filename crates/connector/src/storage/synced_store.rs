use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace, warn};

use crate::errors::StoreError;
use crate::storage::dotenv_file;

/// Backing file used by [`SyncedStore::open_default`].
pub const DEFAULT_PATH: &str = ".env";

/// String map whose state is kept in sync with a dotenv file.
///
/// Every read refreshes the in-memory entries from the file first, and every
/// write rewrites the file afterwards, so several processes can share state
/// through the same file without explicit load/save calls. There is no
/// cross-process locking: concurrent read-modify-write cycles on one file
/// resolve as last-writer-wins.
pub struct SyncedStore {
    inner: RwLock<BTreeMap<String, String>>,
    file_path: PathBuf,
}

impl SyncedStore {
    /// Open the store backed by `path`, creating an empty file if none exists.
    ///
    /// The parent directory must already exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let requested = path.as_ref();
        if !dotenv_file::exists(requested) {
            dotenv_file::create_empty(requested)?;
            debug!(event = "create", path = %requested.display(), "created empty backing file");
        }
        let file_path = requested
            .canonicalize()
            .map_err(|e| StoreError::io(requested, e))?;
        let entries = dotenv_file::read(&file_path)?;
        debug!(event = "open", path = %file_path.display(), len = entries.len(), "store opened");
        Ok(Self { inner: RwLock::new(entries), file_path })
    }

    /// Open the store backed by `.env` in the current directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::new(DEFAULT_PATH)
    }

    /// Open the nearest `file_name` found in the current directory or one of its
    /// ancestors; create it in the current directory when there is none.
    pub fn discover(file_name: &str) -> Result<Self, StoreError> {
        let cwd = std::env::current_dir().map_err(|e| StoreError::io(Path::new("."), e))?;
        Self::discover_from(&cwd, file_name)
    }

    /// Same as [`SyncedStore::discover`], searching upwards from `start`.
    pub fn discover_from(start: &Path, file_name: &str) -> Result<Self, StoreError> {
        let found = start
            .ancestors()
            .map(|dir| dir.join(file_name))
            .find(|candidate| dotenv_file::exists(candidate));
        match found {
            Some(path) => Self::new(path),
            None => Self::new(start.join(file_name)),
        }
    }

    /// Canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reload entries from the file: keys missing from the file are dropped and
    /// values present in the file win.
    pub fn update_from_file(&self) -> Result<(), StoreError> {
        let fresh = dotenv_file::read(&self.file_path)?;
        let mut entries = self.entries_mut();
        let before = entries.len();
        entries.retain(|key, _| fresh.contains_key(key));
        let dropped = before - entries.len();
        entries.extend(fresh);
        trace!(event = "refresh", path = %self.file_path.display(), dropped, len = entries.len(), "entries refreshed");
        Ok(())
    }

    /// Rewrite the file from the entries: stale keys are unset, every entry is set.
    pub fn write_to_file(&self) -> Result<(), StoreError> {
        let entries = self.entries();
        dotenv_file::write(&self.file_path, &entries)?;
        trace!(event = "flush", path = %self.file_path.display(), len = entries.len(), "entries flushed");
        Ok(())
    }

    fn refresh_before(&self) -> Result<(), StoreError> {
        self.update_from_file()
    }

    fn flush_after(&self) -> Result<(), StoreError> {
        self.write_to_file()
    }

    /// Value for `key`, or `NotFound`.
    pub fn get_item(&self, key: &str) -> Result<String, StoreError> {
        self.refresh_before()?;
        self.entries()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.refresh_before()?;
        Ok(self.entries().get(key).cloned())
    }

    pub fn get_or(&self, key: &str, default: &str) -> Result<String, StoreError> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn contains(&self, key: &str) -> Result<bool, StoreError> {
        self.refresh_before()?;
        Ok(self.entries().contains_key(key))
    }

    /// Insert or overwrite `key` and persist.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), StoreError> {
        let key = key.into();
        validate_key(&key)?;
        self.refresh_before()?;
        self.entries_mut().insert(key, value.into());
        self.flush_after()
    }

    /// Remove `key` and persist; `NotFound` if it is absent.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.refresh_before()?;
        if self.entries_mut().remove(key).is_none() {
            return Err(StoreError::not_found(key));
        }
        self.flush_after()
    }

    /// Insert every pair and persist once. Nothing is written if a key is invalid.
    pub fn update<I, K, V>(&self, pairs: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some((bad, _)) = pairs.iter().find(|(k, _)| !dotenv_file::is_valid_key(k)) {
            return Err(StoreError::InvalidKey(bad.clone()));
        }
        self.refresh_before()?;
        self.entries_mut().extend(pairs);
        self.flush_after()
    }

    /// Remove `key` and return its value; `NotFound` if it is absent.
    pub fn pop(&self, key: &str) -> Result<String, StoreError> {
        self.refresh_before()?;
        let value = self
            .entries_mut()
            .remove(key)
            .ok_or_else(|| StoreError::not_found(key))?;
        self.flush_after()?;
        Ok(value)
    }

    /// Remove `key` and return its value, or `default` if it is absent.
    pub fn pop_or(&self, key: &str, default: &str) -> Result<String, StoreError> {
        self.refresh_before()?;
        let value = self.entries_mut().remove(key);
        self.flush_after()?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    /// Remove and return the entry with the greatest key; `Empty` if there is none.
    pub fn popitem(&self) -> Result<(String, String), StoreError> {
        self.refresh_before()?;
        let item = self.entries_mut().pop_last().ok_or(StoreError::Empty)?;
        self.flush_after()?;
        Ok(item)
    }

    /// Drop every entry and empty the file's assignments.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.entries_mut().clear();
        self.flush_after()
    }

    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.refresh_before()?;
        Ok(self.entries().keys().cloned().collect())
    }

    pub fn values(&self) -> Result<Vec<String>, StoreError> {
        self.refresh_before()?;
        Ok(self.entries().values().cloned().collect())
    }

    pub fn items(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.refresh_before()?;
        Ok(self
            .entries()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.refresh_before()?;
        Ok(self.entries().len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Owned copy of the current entries.
    pub fn snapshot(&self) -> Result<BTreeMap<String, String>, StoreError> {
        self.refresh_before()?;
        Ok(self.entries().clone())
    }

    /// `{"key": "value", ...}` rendering of the current entries.
    pub fn render(&self) -> Result<String, StoreError> {
        self.refresh_before()?;
        Ok(format!("{:?}", *self.entries()))
    }

    /// Detached copy backed by `new_path`.
    ///
    /// Whatever `new_path` held before is replaced by this store's entries; the
    /// two stores share nothing afterwards.
    pub fn copy<P: AsRef<Path>>(&self, new_path: P) -> Result<SyncedStore, StoreError> {
        let snapshot = self.snapshot()?;
        let copied = SyncedStore::new(new_path)?;
        copied.clear()?;
        copied.update(snapshot)?;
        debug!(
            event = "copy",
            from = %self.file_path.display(),
            to = %copied.file_path.display(),
            "store copied"
        );
        Ok(copied)
    }

    // Display and PartialEq cannot report errors, so they fall back to the cached entries.
    fn refresh_or_warn(&self) {
        if let Err(e) = self.refresh_before() {
            warn!(event = "refresh_failed", path = %self.file_path.display(), error = %e, "using cached entries");
        }
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if dotenv_file::is_valid_key(key) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

impl fmt::Display for SyncedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.refresh_or_warn();
        write!(f, "{:?}", *self.entries())
    }
}

impl fmt::Debug for SyncedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedStore")
            .field("path", &self.file_path)
            .field("entries", &*self.entries())
            .finish()
    }
}

impl PartialEq for SyncedStore {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.refresh_or_warn();
        other.refresh_or_warn();
        *self.entries() == *other.entries()
    }
}

impl PartialEq<BTreeMap<String, String>> for SyncedStore {
    fn eq(&self, other: &BTreeMap<String, String>) -> bool {
        self.refresh_or_warn();
        *self.entries() == *other
    }
}

impl PartialEq<HashMap<String, String>> for SyncedStore {
    fn eq(&self, other: &HashMap<String, String>) -> bool {
        self.refresh_or_warn();
        let entries = self.entries();
        entries.len() == other.len()
            && entries.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}
