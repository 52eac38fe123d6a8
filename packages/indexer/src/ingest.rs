//! Ingest Loop
//!
//! Consumes transaction results in chain order from a channel and feeds them
//! through the router one at a time. Messages of a transaction are never
//! reordered; what happens after a failed transaction is decided by the
//! configured [`FailurePolicy`].

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{FailurePolicy, IndexerConfig};
use crate::decoder::{format_hash, ResultTx};
use crate::handler::MessageHandlers;
use crate::router::{Router, RouterError, TxReport};
use crate::store::CollectionStore;

/// Errors that stop the ingest loop
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Halted at transaction {tx_hash}: {source}")]
    Halted {
        tx_hash: String,
        #[source]
        source: RouterError,
    },
}

/// Running counters of the ingest loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    /// Transactions fully processed
    pub transactions: u64,
    /// Transactions that failed to decode or dispatch
    pub failed_transactions: u64,
    pub messages_handled: u64,
    pub messages_skipped: u64,
}

/// Create the channel the chain client pushes transaction results into
pub fn channel(config: &IndexerConfig) -> (mpsc::Sender<ResultTx>, mpsc::Receiver<ResultTx>) {
    mpsc::channel(config.channel_capacity.max(1))
}

/// Sequential transaction processor
pub struct Indexer {
    router: Router,
    policy: FailurePolicy,
    stats: IndexerStats,
}

impl Indexer {
    pub fn new(router: Router, policy: FailurePolicy) -> Self {
        Self {
            router,
            policy,
            stats: IndexerStats::default(),
        }
    }

    /// Build a router from `config` and wrap it
    pub fn from_config(
        config: &IndexerConfig,
        store: Arc<dyn CollectionStore>,
        handlers: Arc<dyn MessageHandlers>,
    ) -> Self {
        let router = Router::new(config.contracts.clone(), store, handlers);
        Self::new(router, config.failure_policy)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn stats(&self) -> IndexerStats {
        self.stats
    }

    /// Process a single transaction result and update the counters
    pub async fn process(&mut self, tx: &ResultTx) -> Result<TxReport, RouterError> {
        match self.router.handle_result_tx(tx).await {
            Ok(report) => {
                self.stats.transactions += 1;
                self.stats.messages_handled += report.handled_count() as u64;
                self.stats.messages_skipped += report.skipped_count() as u64;
                Ok(report)
            }
            Err(err) => {
                self.stats.failed_transactions += 1;
                Err(err)
            }
        }
    }

    /// Drain `rx` until it closes.
    ///
    /// With [`FailurePolicy::Halt`] the first failed transaction ends the loop
    /// with an error; with [`FailurePolicy::Skip`] it is logged and dropped.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<ResultTx>) -> Result<IndexerStats, IndexerError> {
        info!("Ingest loop started with {:?} failure policy", self.policy);

        while let Some(tx) = rx.recv().await {
            match self.process(&tx).await {
                Ok(report) => {
                    debug!(
                        tx_hash = %report.tx_hash,
                        height = tx.height,
                        handled = report.handled_count(),
                        skipped = report.skipped_count(),
                        "processed transaction"
                    );
                }
                Err(err) => {
                    let tx_hash = format_hash(&tx.hash);
                    match self.policy {
                        FailurePolicy::Halt => {
                            error!(tx_hash = %tx_hash, height = tx.height, error = %err, "halting on failed transaction");
                            return Err(IndexerError::Halted { tx_hash, source: err });
                        }
                        FailurePolicy::Skip => {
                            warn!(tx_hash = %tx_hash, height = tx.height, error = %err, "skipping failed transaction");
                        }
                    }
                }
            }
        }

        info!(
            "Ingest loop finished: {} transactions, {} failed",
            self.stats.transactions, self.stats.failed_transactions
        );
        Ok(self.stats)
    }
}
