//! Synchronization of the local store against the remote catalog API.

pub mod reconciler;

pub use reconciler::Reconciler;

use crate::api::SnapshotSource;
use crate::storage::{DeviceStore, OpResult};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Fetches snapshots from a [`SnapshotSource`] and reconciles them into the
/// store.
///
/// The fetch phase runs on the async runtime and may be cancelled; the
/// replace phase runs on a blocking task and, once inside the transaction,
/// either commits or rolls back in full.
pub struct SyncService<S> {
    source: S,
    store: Arc<DeviceStore>,
    interval: Duration,
}

impl<S: SnapshotSource + 'static> SyncService<S> {
    pub fn new(source: S, store: Arc<DeviceStore>, interval: Duration) -> Self {
        Self {
            source,
            store,
            interval,
        }
    }

    /// Run one fetch-and-replace pass, propagating any failure.
    ///
    /// A fetch failure leaves the store untouched; a replace failure rolls
    /// back to the pre-call contents.
    pub async fn sync_once(&self) -> Result<Vec<OpResult>> {
        let snapshot = self.source.fetch_manufacturers_and_devices().await?;

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || Reconciler::new(&store).replace_all(&snapshot))
            .await
            .map_err(|e| Error::SyncTask(e.to_string()))?
    }

    /// Periodically sync until the surrounding task is cancelled.
    ///
    /// Failures are logged and the loop continues; callers wanting to act on
    /// a failure use [`SyncService::sync_once`] instead.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.sync_once().await {
                Ok(results) => {
                    tracing::info!(operations = results.len(), "sync pass applied");
                }
                Err(e) => {
                    tracing::error!("could not perform sync: {}", e);
                }
            }
        }
    }
}
