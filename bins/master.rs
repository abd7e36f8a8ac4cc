use common::env::ensure_env;
use common::signal::{stop_minion, wait_for_threshold};
use configs::{AppConfig, SignalConfig};
use connector::SyncedStore;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing::{error, info};
use uuid::Uuid;

fn init_logging(json: bool) {
    common::utils::logging::init_logging(json);
    info!(service = "master", event = "logger_init", "tracing subscriber initialized");
}

async fn run(cfg: &SignalConfig) -> anyhow::Result<()> {
    ensure_env(&cfg.store_path)?;
    let store = SyncedStore::new(&cfg.store_path)?;
    info!(
        service = "master",
        event = "store_open",
        path = %store.path().display(),
        threshold = cfg.threshold,
        "waiting for the minion"
    );

    wait_for_threshold(&store, cfg.threshold, cfg.poll_interval()).await?;
    if let Some(pid) = stop_minion(&store)? {
        info!(service = "master", event = "minion_interrupted", minion_pid = pid, "sent SIGINT to the minion");
    }
    Ok(())
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
            service = "master",
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
            error!(service = "master", event = "config_invalid", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "master", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        service = "master",
        event = "start",
        %service_id,
        pid,
        version,
        store_path = %config.signal.store_path,
        "master starting"
    );

    rt.block_on(async {
        tokio::select! {
            res = run(&config.signal) => match res {
                Ok(()) => {
                    info!(service = "master", event = "stop", %service_id, pid, "master finished");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(service = "master", event = "run_failed", error = %e, "master failed");
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(service = "master", event = "shutdown_signal", %service_id, pid, "received Ctrl+C, stopping");
                ExitCode::SUCCESS
            }
        }
    })
}
