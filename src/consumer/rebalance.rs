use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broker::{GroupClient, GroupHandler};
use crate::consumer::handler::ConsumerGroupHandler;
use crate::error::Result;

/// Keeps the worker in the consumer group across rebalances
///
/// Each `consume` call spans one generation. Returning without cancellation
/// means the group rebalanced, so the loop rejoins right away.
pub struct RebalanceLoop {
    client: Arc<dyn GroupClient>,
    topics: Vec<String>,
    handler: Arc<ConsumerGroupHandler>,
    error_backoff: Duration,
}

impl RebalanceLoop {
    pub fn new(
        client: Arc<dyn GroupClient>,
        topics: Vec<String>,
        handler: Arc<ConsumerGroupHandler>,
    ) -> Self {
        Self {
            client,
            topics,
            handler,
            error_backoff: Duration::from_secs(1),
        }
    }

    /// Set the pause after a failed generation (builder pattern)
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Consume generations until `cancel` fires
    ///
    /// Errors from a generation are logged and the loop rejoins; only
    /// cancellation ends it.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let handler: Arc<dyn GroupHandler> = self.handler.clone();
        let mut joins: u64 = 0;

        loop {
            joins += 1;
            if let Err(err) = self
                .client
                .consume(&cancel, &self.topics, Arc::clone(&handler))
                .await
            {
                warn!(join = joins, error = %err, "Error from consumer group");
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = time::sleep(self.error_backoff) => {}
                }
            }

            if cancel.is_cancelled() {
                info!(joins, "Context cancelled, stopping consumer");
                return Ok(());
            }

            // Only the first generation is awaited; re-arming gives the next
            // setup a fresh sender, and its receiver is not needed here
            let _ = self.handler.rearm();
        }
    }
}
