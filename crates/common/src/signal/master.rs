use std::time::Duration;

use anyhow::{anyhow, Context};
use connector::KvStore;
use tracing::{debug, info};

use crate::types::{Status, COUNTER_KEY, PID_KEY, STATUS_KEY};

pub fn read_counter<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<u64> {
    let raw = store.get_item(COUNTER_KEY)?;
    raw.trim()
        .parse()
        .with_context(|| format!("{COUNTER_KEY} is not a number: {raw:?}"))
}

/// Initialize the counter to `0` when it is absent and return its value.
pub fn ensure_counter<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<u64> {
    if !store.contains(COUNTER_KEY)? {
        store.set(COUNTER_KEY, "0")?;
    }
    read_counter(store)
}

/// Poll every `poll` until the counter reaches `threshold`.
pub async fn wait_for_threshold<S: KvStore + ?Sized>(
    store: &S,
    threshold: u64,
    poll: Duration,
) -> anyhow::Result<u64> {
    let mut counter = ensure_counter(store)?;
    while counter < threshold {
        debug!(event = "waiting", threshold, counter, "waiting for the counter to reach the threshold");
        tokio::time::sleep(poll).await;
        counter = read_counter(store)?;
    }
    info!(event = "threshold_reached", threshold, counter, "counter reached the threshold");
    Ok(counter)
}

/// Pid of the minion if it reports `running`.
pub fn running_minion<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<Option<u32>> {
    let running = match store.get(STATUS_KEY)? {
        Some(status) => status.parse::<Status>().ok() == Some(Status::Running),
        None => false,
    };
    if !running {
        return Ok(None);
    }
    let raw = store.get_item(PID_KEY)?;
    let pid = raw
        .trim()
        .parse::<u32>()
        .with_context(|| format!("{PID_KEY} is not a process id: {raw:?}"))?;
    Ok(Some(pid))
}

/// Interrupt the minion if it is running; returns the pid that was signalled.
pub fn stop_minion<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<Option<u32>> {
    match running_minion(store)? {
        Some(pid) => {
            info!(event = "interrupt", pid, "interrupting the minion");
            interrupt(pid)?;
            Ok(Some(pid))
        }
        None => {
            info!(event = "no_minion", "minion is not running");
            Ok(None)
        }
    }
}

/// Deliver SIGINT to `pid`, the same signal as Ctrl+C.
#[cfg(unix)]
pub fn interrupt(pid: u32) -> anyhow::Result<()> {
    if pid == 0 {
        return Err(anyhow!("refusing to signal pid 0"));
    }
    let target = libc::pid_t::try_from(pid).with_context(|| format!("pid {pid} out of range"))?;
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::kill(target, libc::SIGINT) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).with_context(|| format!("failed to signal pid {pid}"));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn interrupt(pid: u32) -> anyhow::Result<()> {
    Err(anyhow!("interrupting pid {pid} is only supported on unix"))
}
