use common::env::ensure_env;
use common::signal::run_minion;
use configs::{AppConfig, SignalConfig};
use connector::SyncedStore;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::{error, info};
use uuid::Uuid;

fn init_logging(json: bool) {
    common::utils::logging::init_logging(json);
    info!(service = "minion", event = "logger_init", "tracing subscriber initialized");
}

async fn run(cfg: &SignalConfig) -> anyhow::Result<u64> {
    ensure_env(&cfg.store_path)?;
    let store = SyncedStore::new(&cfg.store_path)?;
    info!(service = "minion", event = "store_open", path = %store.path().display(), "store opened");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(service = "minion", event = "shutdown_signal", "process interrupted"),
            Err(e) => error!(service = "minion", event = "signal_error", error = %e, "cannot listen for Ctrl+C"),
        }
    };
    run_minion(&store, std::process::id(), cfg.tick_interval(), shutdown).await
}

fn main() -> ExitCode {
    // .env may carry RUST_LOG, CONFIG_PATH or DOTENV_SYNC_STORE
    dotenv().ok();
    let config = AppConfig::load_or_default();
    init_logging(config.as_ref().map(|c| c.logging.json).unwrap_or(false));

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "minion",
            event = "panic",
            %service_id,
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    let config = match config {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(service = "minion", event = "config_invalid", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "minion", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        service = "minion",
        event = "start",
        %service_id,
        pid,
        version,
        store_path = %config.signal.store_path,
        "minion starting"
    );

    match rt.block_on(run(&config.signal)) {
        Ok(ticks) => {
            info!(service = "minion", event = "stop", %service_id, pid, ticks, "minion stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(service = "minion", event = "run_failed", error = %e, "minion failed");
            ExitCode::FAILURE
        }
    }
}
