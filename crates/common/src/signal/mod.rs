//! Counter/status signalling between a minion and a master process that share
//! one store file.
//!
//! The minion publishes its pid, bumps `counter` on every tick, and marks itself
//! `finished` on shutdown. The master polls `counter` until it reaches a
//! threshold and then interrupts the minion if it still reports `running`.
//! Both sides only talk through the file; there is no other channel.

pub mod master;
pub mod minion;

pub use master::{ensure_counter, interrupt, read_counter, running_minion, stop_minion, wait_for_threshold};
pub use minion::{finish, increment_counter, run_minion};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Status, COUNTER_KEY, PID_KEY, STATUS_KEY};
    use connector::SyncedStore;
    use std::time::Duration;

    #[tokio::test]
    async fn master_sees_minion_reach_threshold() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".my_variables");
        let minion_store = SyncedStore::new(&path)?;
        let master_store = SyncedStore::new(&path)?;
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let minion = run_minion(&minion_store, 4242, Duration::from_millis(2), async move {
            let _ = stop_rx.await;
        });
        let master = async move {
            // Give the minion a moment to publish its pid and reset the counter.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let reached = wait_for_threshold(&master_store, 3, Duration::from_millis(1)).await?;
            let pid = running_minion(&master_store)?;
            let _ = stop_tx.send(());
            anyhow::Ok((reached, pid))
        };

        let (ticks, master_result) = tokio::join!(minion, master);
        let (reached, pid) = master_result?;
        assert!(reached >= 3);
        assert!(ticks? >= 3);
        assert_eq!(pid, Some(4242));

        let after = SyncedStore::new(&path)?;
        assert!(!after.contains(COUNTER_KEY)?);
        assert_eq!(after.get_item(STATUS_KEY)?, Status::Finished.as_str());
        assert_eq!(after.get_item(PID_KEY)?, "4242");
        assert_eq!(running_minion(&after)?, None);
        Ok(())
    }
}
