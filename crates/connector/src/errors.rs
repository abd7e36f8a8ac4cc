use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("store is empty")]
    Empty,
    #[error("invalid key {0:?}: expected [A-Za-z_][A-Za-z0-9_.]*")]
    InvalidKey(String),
}

impl StoreError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    pub fn not_found(key: &str) -> Self { Self::NotFound(key.to_string()) }

    /// True for the lookup failures (`NotFound`, `Empty`), false for I/O and validation.
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Empty)
    }
}
