//! Worker lifecycle: startup, steady state, and graceful shutdown

use std::future::Future;
use std::sync::Arc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broker::Connect;
use crate::config::WorkerConfig;
use crate::consumer::{ConsumerGroupHandler, RebalanceLoop};
use crate::error::Result;
use crate::processor::{PriceProcessor, ProcessedCount};
use crate::storage::RentalStore;

/// Outcome reported when the worker stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Processed messages, including the configured starting count
    pub processed: u64,
}

/// Top-level lifecycle driver
///
/// Owns the shared shutdown token, the processed counter and every task it
/// starts; nothing is left running once [`Worker::run`] returns.
///
/// # Example
///
/// ```no_run
/// use rental_worker::broker::BrokerConnector;
/// use rental_worker::config::WorkerConfig;
/// use rental_worker::storage::{DatabaseConfig, PgRentalStore};
/// use rental_worker::worker::Worker;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = WorkerConfig::default();
///     let store = PgRentalStore::new(DatabaseConfig::default()).await?;
///     let connector = BrokerConnector::new(config.broker_config());
///
///     let worker = Worker::new(config, Arc::new(store), Arc::new(connector));
///     let summary = worker.run(async {
///         let _ = tokio::signal::ctrl_c().await;
///     }).await?;
///
///     println!("Processed {} messages", summary.processed);
///     Ok(())
/// }
/// ```
pub struct Worker {
    config: WorkerConfig,
    store: Arc<dyn RentalStore>,
    connector: Arc<dyn Connect>,
}

impl Worker {
    pub fn new(config: WorkerConfig, store: Arc<dyn RentalStore>, connector: Arc<dyn Connect>) -> Self {
        Self {
            config,
            store,
            connector,
        }
    }

    /// Run until `shutdown` resolves, then drain and report
    ///
    /// Startup failures (storage, schema, broker) are returned as errors
    /// before any task is started.
    pub async fn run<F>(self, shutdown: F) -> Result<Summary>
    where
        F: Future<Output = ()>,
    {
        self.store.ping().await?;
        self.store.reset_schema().await?;

        let client = self.connector.connect().await?;

        let processed = Arc::new(ProcessedCount::new(self.config.message_count_start));
        let processor = PriceProcessor::new(Arc::clone(&self.store), Arc::clone(&processed));
        let handler = Arc::new(ConsumerGroupHandler::new(Arc::new(processor)));
        let cancel = CancellationToken::new();

        // Runs until the client closes its error channel
        let error_logger = client.take_errors().map(|mut errors| {
            tokio::spawn(async move {
                while let Some(err) = errors.recv().await {
                    warn!(error = %err, "Consumer group error");
                }
            })
        });

        let ready = handler.arm_ready();
        let rebalance = RebalanceLoop::new(Arc::clone(&client), self.config.topics(), handler);
        let consuming = tokio::spawn(rebalance.run(cancel.clone()));

        match time::timeout(self.config.ready_timeout, ready).await {
            Ok(Ok(generation)) => info!(generation, "Consumer is ready"),
            Ok(Err(_)) => warn!("Consumer stopped before becoming ready"),
            Err(_) => warn!("Timeout waiting for consumer to be ready, but continuing anyway"),
        }

        info!(topic = %self.config.topic, "Worker started. Press Ctrl+C to exit...");
        shutdown.await;
        info!("Interrupt is detected, shutting down...");

        cancel.cancel();

        match consuming.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "Consumer group loop failed"),
            Err(err) => error!(error = %err, "Consumer group loop aborted"),
        }

        if let Err(err) = client.close().await {
            warn!(error = %err, "Error closing consumer group");
        }

        if let Some(logger) = error_logger {
            if let Err(err) = logger.await {
                error!(error = %err, "Error logger aborted");
            }
        }

        let summary = Summary {
            processed: processed.get(),
        };
        info!("Processed {} messages", summary.processed);
        Ok(summary)
    }
}
