use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use idemgate_common::time::now_ms;

use super::inflight::InFlightRegistry;
use crate::metrics::CoordinatorMetrics;
use crate::store::{FingerprintStore, StoreError};

/// Purges expired records, skipping keys that still have blocked waiters.
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn FingerprintStore>,
    inflight: InFlightRegistry,
    metrics: Arc<CoordinatorMetrics>,
}

pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        inflight: InFlightRegistry,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            store,
            inflight,
            metrics,
        }
    }

    pub async fn run_once(&self) -> Result<u64, StoreError> {
        let keep = self.inflight.watched_keys();
        let purged = self.store.sweep_expired(now_ms(), &keep).await?;
        self.metrics.add_records_swept(purged);
        if purged > 0 {
            tracing::info!(purged, kept = keep.len(), "expired idempotency records swept");
        }
        Ok(purged)
    }

    pub fn spawn(self, every: Duration) -> SweeperHandle {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::warn!(error = %e, "expiry sweep failed");
                }
            }
        });
        SweeperHandle { handle }
    }
}
