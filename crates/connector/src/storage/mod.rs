//! File-backed storage.
//!
//! `dotenv_file` reads and rewrites the `KEY=VALUE` backing file; `synced_store`
//! wraps a map so every operation goes through it.

pub mod dotenv_file;
pub mod synced_store;
