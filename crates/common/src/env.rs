//! Runtime environment checks
//!
//! The store never creates directories, so callers verify the location first.

use std::path::Path;

use anyhow::anyhow;
use tracing::{info, warn};

/// Ensure the directory that will hold `store_path` exists.
pub fn ensure_env(store_path: &str) -> anyhow::Result<()> {
    let path = Path::new(store_path);
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(anyhow!("directory {} for store {store_path} does not exist", parent.display()));
    }
    if path.is_dir() {
        return Err(anyhow!("store path {store_path} is a directory"));
    }
    if path.exists() {
        info!(%store_path, "using existing store file");
    } else {
        warn!(%store_path, "store file not found; it will be created empty");
    }
    Ok(())
}
