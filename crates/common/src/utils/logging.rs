use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize a compact tracing subscriber on stdout.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info,connector=info`
pub fn init_logging_default() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,connector=info"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize a JSON tracing subscriber on stdout.
/// - Respects `RUST_LOG` if set; store refresh/flush events show up with
///   `RUST_LOG=info,connector=trace`
pub fn init_logging_json() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,connector=debug"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

/// Pick the subscriber from a `json` flag (see `configs::LoggingConfig`).
pub fn init_logging(json: bool) {
    if json {
        init_logging_json();
    } else {
        init_logging_default();
    }
}
