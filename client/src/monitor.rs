//! Transaction monitoring and status tracking.
//!
//! This module polls a [`TransactionWatcher`] until a submitted transaction
//! is mined, reverts, or the configured timeout elapses.

use crate::chain::TransactionWatcher;
use crate::config::VotingConfig;
use crate::error::{Result, VotingError};
use crate::types::{TransactionStatus, TxHash};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Transaction monitor for tracking transaction status
#[derive(Clone)]
pub struct TransactionMonitor {
    watcher: Arc<dyn TransactionWatcher>,
    options: MonitorOptions,
}

/// Monitoring options
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Poll interval (in milliseconds)
    pub poll_interval_ms: u64,
    /// Timeout (in seconds)
    pub timeout_secs: u64,
}

impl MonitorOptions {
    /// Create from client config
    pub fn from_config(config: &VotingConfig) -> Self {
        Self {
            poll_interval_ms: config.tx_poll_interval_ms,
            timeout_secs: config.tx_timeout_secs,
        }
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Transaction monitoring result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorResult {
    /// Mined successfully
    Confirmed(TxHash),
    /// Mined and reverted
    Reverted(Option<String>),
    /// No receipt before the timeout
    Timeout,
}

impl TransactionMonitor {
    /// Create a new transaction monitor
    pub fn new(watcher: Arc<dyn TransactionWatcher>, options: MonitorOptions) -> Self {
        Self { watcher, options }
    }

    /// Options in use
    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Poll until the transaction completes or times out
    pub async fn monitor(&self, tx_hash: TxHash) -> MonitorResult {
        info!(
            "Monitoring transaction: {:?} (timeout: {}s)",
            tx_hash, self.options.timeout_secs
        );

        let start = Instant::now();
        let timeout = Duration::from_secs(self.options.timeout_secs);
        let poll_interval = Duration::from_millis(self.options.poll_interval_ms);

        loop {
            match self.watcher.transaction_status(tx_hash).await {
                Ok(TransactionStatus::Confirmed) => {
                    info!("Transaction confirmed: {:?}", tx_hash);
                    return MonitorResult::Confirmed(tx_hash);
                }
                Ok(TransactionStatus::Reverted(reason)) => {
                    warn!("Transaction reverted: {:?} ({:?})", tx_hash, reason);
                    return MonitorResult::Reverted(reason);
                }
                Ok(TransactionStatus::Pending) => {
                    debug!("Transaction still pending: {:?}", tx_hash);
                }
                Ok(TransactionStatus::NotFound) => {
                    debug!("Transaction not yet known to the node: {:?}", tx_hash);
                }
                Err(e) => {
                    debug!("Error fetching receipt: {:?}", e);
                }
            }

            if start.elapsed() + poll_interval > timeout {
                warn!("Transaction monitoring timed out: {:?}", tx_hash);
                return MonitorResult::Timeout;
            }

            sleep(poll_interval).await;
        }
    }

    /// Wait for a transaction to be confirmed.
    ///
    /// A revert becomes `Reverted` with the decoded reason (or an empty one),
    /// a timeout becomes `TransactionTimeout`.
    pub async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxHash> {
        match self.monitor(tx_hash).await {
            MonitorResult::Confirmed(hash) => Ok(hash),
            MonitorResult::Reverted(reason) => {
                Err(VotingError::Reverted(reason.unwrap_or_default()))
            }
            MonitorResult::Timeout => Err(VotingError::TransactionTimeout(self.options.timeout_secs)),
        }
    }

    /// Get current transaction status (single check, no monitoring)
    pub async fn get_status(&self, tx_hash: TxHash) -> Result<TransactionStatus> {
        self.watcher.transaction_status(tx_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockTransactionWatcher;
    use assert_matches::assert_matches;
    use mockall::Sequence;

    fn fast_options() -> MonitorOptions {
        MonitorOptions::from_config(&VotingConfig::sepolia())
            .with_poll_interval(5)
            .with_timeout(1)
    }

    #[test]
    fn test_monitor_options_from_config() {
        let config = VotingConfig::sepolia();
        let options = MonitorOptions::from_config(&config);
        assert_eq!(options.poll_interval_ms, config.tx_poll_interval_ms);
        assert_eq!(options.timeout_secs, config.tx_timeout_secs);
    }

    #[test]
    fn test_monitor_options_builder() {
        let options = MonitorOptions::from_config(&VotingConfig::sepolia())
            .with_poll_interval(500)
            .with_timeout(120);

        assert_eq!(options.poll_interval_ms, 500);
        assert_eq!(options.timeout_secs, 120);
    }

    #[tokio::test]
    async fn test_confirmed_after_pending() {
        let mut watcher = MockTransactionWatcher::new();
        let mut seq = Sequence::new();
        watcher
            .expect_transaction_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransactionStatus::NotFound));
        watcher
            .expect_transaction_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransactionStatus::Pending));
        watcher
            .expect_transaction_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransactionStatus::Confirmed));

        let monitor = TransactionMonitor::new(Arc::new(watcher), fast_options());
        let hash = TxHash::repeat_byte(9);
        assert_eq!(monitor.monitor(hash).await, MonitorResult::Confirmed(hash));
    }

    #[tokio::test]
    async fn test_lookup_errors_keep_polling() {
        let mut watcher = MockTransactionWatcher::new();
        let mut seq = Sequence::new();
        watcher
            .expect_transaction_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(VotingError::NetworkError("blip".to_string())));
        watcher
            .expect_transaction_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TransactionStatus::Confirmed));

        let monitor = TransactionMonitor::new(Arc::new(watcher), fast_options());
        assert!(monitor.wait_for_confirmation(TxHash::zero()).await.is_ok());
    }

    #[tokio::test]
    async fn test_revert_maps_to_error() {
        let mut watcher = MockTransactionWatcher::new();
        watcher
            .expect_transaction_status()
            .returning(|_| Ok(TransactionStatus::Reverted(Some("Already voted".to_string()))));

        let monitor = TransactionMonitor::new(Arc::new(watcher), fast_options());
        let err = monitor.wait_for_confirmation(TxHash::zero()).await.unwrap_err();
        assert_matches!(err, VotingError::Reverted(reason) if reason == "Already voted");
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut watcher = MockTransactionWatcher::new();
        watcher
            .expect_transaction_status()
            .returning(|_| Ok(TransactionStatus::Pending));

        let options = fast_options().with_poll_interval(300).with_timeout(1);
        let monitor = TransactionMonitor::new(Arc::new(watcher), options);
        let err = monitor.wait_for_confirmation(TxHash::zero()).await.unwrap_err();
        assert_matches!(err, VotingError::TransactionTimeout(1));
    }
}
