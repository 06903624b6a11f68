//! Periodic update loop with cooperative shutdown.

use crate::core::error::Result;
use crate::core::updater::{RatesUpdater, UpdateSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    // Also resolves once the sender is gone.
    let _ = stop_rx.wait_for(|stopped| *stopped).await;
}

pub struct Scheduler {
    updater: Arc<RatesUpdater>,
    stop_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(updater: Arc<RatesUpdater>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self { updater, stop_tx }
    }

    pub fn is_running(&self) -> bool {
        !*self.stop_tx.borrow()
    }

    /// Asks a running loop to exit. Takes effect during the current wait,
    /// or right after the in-flight update finishes.
    pub fn stop(&self) {
        info!("Stopping rates scheduler");
        self.stop_tx.send_replace(true);
    }

    /// Runs an update immediately, then every `interval` until [`Self::stop`] is called.
    /// Returns at once if the scheduler was already stopped.
    ///
    /// Source failures are logged and the loop continues; storage errors end it.
    pub async fn run_forever(&self, interval: Duration) -> Result<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            info!("Rates scheduler stopped before start");
            return Ok(());
        }
        info!(interval_secs = interval.as_secs(), "Rates scheduler started");

        loop {
            let summary = self.updater.run_update(None).await?;
            for error in &summary.errors {
                warn!("{}", error);
            }
            debug!(updated = summary.updated_count, "Scheduled update finished");

            if *stop_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop_requested(&mut stop_rx) => break,
            }
        }

        info!("Rates scheduler stopped");
        Ok(())
    }

    /// Waits `delay`, then runs a single update. Returns `None` if stopped while waiting.
    pub async fn run_once_after_delay(&self, delay: Duration) -> Result<Option<UpdateSummary>> {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            return Ok(None);
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_requested(&mut stop_rx) => return Ok(None),
        }
        self.updater.run_update(None).await.map(Some)
    }
}
