//! Pending-scan lookup for circulation stations

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::ScannerConfig,
    error::AppResult,
    models::ScanEvent,
    repository::ScanSource,
};

/// Polls a station for the next barcode/RFID scan with a bounded number of attempts
#[derive(Clone)]
pub struct ScanPoller {
    source: Arc<dyn ScanSource>,
    max_attempts: u32,
    interval: Duration,
    timeout: Duration,
}

impl ScanPoller {
    pub fn new(source: Arc<dyn ScanSource>, config: &ScannerConfig) -> Self {
        Self {
            source,
            max_attempts: config.max_attempts.max(1),
            interval: Duration::from_millis(config.interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Wait for a scan at `station`; `None` once attempts or time run out
    pub async fn poll(&self, station: &str) -> AppResult<Option<ScanEvent>> {
        match tokio::time::timeout(self.timeout, self.poll_attempts(station)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("No scan at station {} within {:?}", station, self.timeout);
                Ok(None)
            }
        }
    }

    async fn poll_attempts(&self, station: &str) -> AppResult<Option<ScanEvent>> {
        for attempt in 1..=self.max_attempts {
            match self.source.take_pending_scan(station).await {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    tracing::debug!("Scan lookup attempt {} at {} failed: {}", attempt, station, e);
                }
                Err(e) => return Err(e),
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        tracing::debug!(
            "No scan at station {} after {} attempts",
            station,
            self.max_attempts
        );
        Ok(None)
    }
}
