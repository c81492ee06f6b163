//! Async task: periodically drops expired recordings from the RecordingStore.
//!
//! Runs alongside the HTTP server or dashboard until the process exits.

use crate::ports::RecordingStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct RecordingJanitor {
    store: Arc<dyn RecordingStore>,
    interval: Duration,
}

impl RecordingJanitor {
    pub fn new(store: Arc<dyn RecordingStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one sweep. Returns how many recordings were freed; store errors are logged as 0.
    pub async fn sweep_once(&self) -> usize {
        match self.store.purge_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "purged expired recordings");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "recording sweep failed");
                0
            }
        }
    }

    /// Sweep every `interval`, forever.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "recording janitor started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }
}
