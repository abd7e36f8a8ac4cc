//! Pieces shared by the `master` and `minion` binaries: logging setup, runtime
//! checks, and the counter/status signalling protocol built on `connector`.

pub mod types;
pub mod utils;
pub mod env;
pub mod signal;
