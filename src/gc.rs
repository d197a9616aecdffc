//! Expired-lease reclamation.
//!
//! Runs out-of-band from the workers: a sweep must keep working when every
//! worker has crashed, which is exactly when it matters. Stateless and
//! idempotent; correctness rests entirely on the queue's atomic sweep
//! contract.

use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::queue::LeaseQueue;
use crate::store::StoreError;

pub struct GarbageCollector {
    queue: LeaseQueue,
}

impl GarbageCollector {
    pub fn new(queue: LeaseQueue) -> Self {
        Self { queue }
    }

    /// One sweep: requeue every expired lease and report the count.
    pub async fn sweep_once(&self) -> Result<u64, StoreError> {
        let reclaimed = self.queue.sweep_expired().await?;
        if reclaimed > 0 {
            info!("sweep reclaimed {reclaimed} expired leases");
        } else {
            debug!("sweep found no expired leases");
        }
        Ok(reclaimed)
    }

    /// Sweep on a fixed interval until the process is stopped.
    ///
    /// A failed sweep is logged and retried on the next tick; transient
    /// store outages must not kill the daemon.
    pub async fn run(&self, every: Duration) {
        let mut ticker = interval(every);
        info!("lease sweeper started, interval: {every:?}");
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                warn!("sweep failed: {e}");
            }
        }
    }
}
