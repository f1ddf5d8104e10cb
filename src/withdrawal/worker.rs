//! Settlement Worker
//!
//! Background loop that runs a settlement batch on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::coordinator::{SettlementOrchestrator, SettlementReport};
use crate::error::WalletError;

/// Configuration for the settlement worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause between two batches
    pub scan_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(300),
        }
    }
}

pub struct SettlementWorker {
    orchestrator: Arc<SettlementOrchestrator>,
    config: WorkerConfig,
}

impl SettlementWorker {
    pub fn new(orchestrator: Arc<SettlementOrchestrator>, config: WorkerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Run the settlement loop
    ///
    /// This method runs forever. A failed batch is logged and retried on the
    /// next tick.
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            "Starting settlement worker"
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Settlement batch failed");
            }

            tokio::time::sleep(self.config.scan_interval).await;
        }
    }

    /// Run a single batch
    pub async fn run_once(&self) -> Result<SettlementReport, WalletError> {
        self.orchestrator.process_pending_withdrawals().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(300));
    }
}
