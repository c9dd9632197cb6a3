//! Expiry Sweep Task
//!
//! Periodically removes entries past their store's maximum age. Lazy expiry
//! on access stays authoritative; the sweep only reclaims space held by
//! entries nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::manager::CacheManager;

/// Spawns a task sweeping every store each `interval_secs` seconds.
///
/// Returns the handle so the host can abort the task on shutdown.
pub fn spawn_sweep_task(manager: Arc<CacheManager>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting expiry sweep task with interval of {}s", interval.as_secs());

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = manager.sweep_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} entries", removed);
            } else {
                debug!("Expiry sweep: nothing expired");
            }
        }
    })
}
