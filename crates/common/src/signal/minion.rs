use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use connector::KvStore;
use tracing::info;

use crate::types::{Status, COUNTER_KEY, PID_KEY, STATUS_KEY};

/// Publish `pid`, reset the counter and mark the minion running, then increment
/// the counter every `tick` until `shutdown` resolves.
///
/// Returns the number of increments. The counter is removed and the status set
/// to `finished` on the way out, also when a tick fails.
pub async fn run_minion<S, F>(store: &S, pid: u32, tick: Duration, shutdown: F) -> anyhow::Result<u64>
where
    S: KvStore + ?Sized,
    F: Future<Output = ()>,
{
    store.set(PID_KEY, &pid.to_string())?;
    store.set(COUNTER_KEY, "0")?;
    store.set(STATUS_KEY, Status::Running.as_str())?;
    info!(event = "minion_start", pid, "minion registered");

    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(tick);
    // The first tick fires immediately.
    interval.tick().await;

    let mut ticks = 0u64;
    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            _ = interval.tick() => {
                match increment_counter(store) {
                    Ok(previous) => {
                        ticks += 1;
                        info!(event = "tick", counter = previous, "counter value");
                    }
                    Err(e) => break Err(e),
                }
            }
        }
    };

    finish(store)?;
    outcome.map(|()| ticks)
}

/// Add one to the stored counter; returns the value before the increment.
pub fn increment_counter<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<u64> {
    let current = store.get_item(COUNTER_KEY)?;
    let value: u64 = current
        .trim()
        .parse()
        .with_context(|| format!("{COUNTER_KEY} is not a number: {current:?}"))?;
    store.set(COUNTER_KEY, &(value + 1).to_string())?;
    Ok(value)
}

/// Drop the counter and mark the minion finished.
pub fn finish<S: KvStore + ?Sized>(store: &S) -> anyhow::Result<()> {
    store.pop_or(COUNTER_KEY, "")?;
    store.set(STATUS_KEY, Status::Finished.as_str())?;
    info!(event = "minion_finish", "minion finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector::SyncedStore;

    #[tokio::test]
    async fn stops_on_shutdown_and_cleans_up() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SyncedStore::new(dir.path().join(".my_variables"))?;

        let ticks = run_minion(
            &store,
            7,
            Duration::from_millis(2),
            tokio::time::sleep(Duration::from_millis(40)),
        )
        .await?;

        assert!(ticks > 0);
        assert!(!store.contains(COUNTER_KEY)?);
        assert_eq!(store.get_item(STATUS_KEY)?, "finished");
        assert_eq!(store.get_item(PID_KEY)?, "7");
        Ok(())
    }

    #[test]
    fn increment_returns_previous_value() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SyncedStore::new(dir.path().join(".my_variables"))?;
        store.set(COUNTER_KEY, "41")?;
        assert_eq!(increment_counter(&store)?, 41);
        assert_eq!(store.get_item(COUNTER_KEY)?, "42");
        Ok(())
    }

    #[test]
    fn increment_rejects_garbage_and_missing_counter() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SyncedStore::new(dir.path().join(".my_variables"))?;
        assert!(increment_counter(&store).is_err());

        store.set(COUNTER_KEY, "abc")?;
        assert!(increment_counter(&store).is_err());
        assert_eq!(store.get_item(COUNTER_KEY)?, "abc");

        finish(&store)?;
        assert!(!store.contains(COUNTER_KEY)?);
        Ok(())
    }
}
