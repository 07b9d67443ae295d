use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::broker::{Claim, GroupHandler, GroupSession};
use crate::error::Result;
use crate::processor::Processor;

/// Consumer group handler: readiness signalling and per-partition claim loops
///
/// # Example
///
/// ```no_run
/// use rental_worker::consumer::ConsumerGroupHandler;
/// use rental_worker::processor::{PriceProcessor, ProcessedCount};
/// use rental_worker::storage::{DatabaseConfig, PgRentalStore};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = PgRentalStore::new(DatabaseConfig::default()).await?;
///     let processor = PriceProcessor::new(Arc::new(store), Arc::new(ProcessedCount::new(0)));
///
///     let handler = ConsumerGroupHandler::new(Arc::new(processor));
///     let ready = handler.arm_ready();
///     // hand `handler` to a RebalanceLoop, then await `ready`
///     # drop(ready);
///     Ok(())
/// }
/// ```
pub struct ConsumerGroupHandler {
    processor: Arc<dyn Processor>,
    ready: Mutex<Option<oneshot::Sender<u64>>>,
}

impl ConsumerGroupHandler {
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        Self {
            processor,
            ready: Mutex::new(None),
        }
    }

    /// Arm a fresh readiness signal for the next generation
    ///
    /// The receiver resolves with the generation id once that generation's
    /// claims are handed out. Arming again replaces an unfired signal.
    pub fn arm_ready(&self) -> oneshot::Receiver<u64> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut ready) = self.ready.lock() {
            *ready = Some(tx);
        }
        rx
    }

    /// Arm the signal for the following generation once the current one fired
    ///
    /// Returns `None` while a signal is still armed, so a generation that
    /// failed before becoming ready keeps the first waiter.
    pub fn rearm(&self) -> Option<oneshot::Receiver<u64>> {
        let mut ready = self.ready.lock().ok()?;
        if ready.is_some() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        *ready = Some(tx);
        Some(rx)
    }

    fn signal_ready(&self, generation_id: u64) {
        let armed = self.ready.lock().ok().and_then(|mut ready| ready.take());
        if let Some(tx) = armed {
            // Nobody waiting is fine; only the first generation is awaited at startup
            let _ = tx.send(generation_id);
        }
    }
}

#[async_trait]
impl GroupHandler for ConsumerGroupHandler {
    async fn setup(&self, session: &GroupSession) -> Result<()> {
        info!(
            generation = session.generation_id(),
            partitions = ?session.assignment(),
            "Consumer group generation ready"
        );
        self.signal_ready(session.generation_id());
        Ok(())
    }

    async fn cleanup(&self, session: &GroupSession) -> Result<()> {
        info!(
            generation = session.generation_id(),
            "Consumer group generation ended"
        );
        Ok(())
    }

    async fn consume_claim(&self, session: GroupSession, mut claim: Claim) -> Result<()> {
        loop {
            // Biased so no new message is started once the session is done
            let next = tokio::select! {
                biased;
                _ = session.context().cancelled() => return Ok(()),
                next = claim.next() => next,
            };

            let Some(message) = next else {
                debug!(
                    topic = %claim.partition().topic,
                    partition = claim.partition().partition,
                    "Message channel was closed"
                );
                return Ok(());
            };

            if let Err(err) = self.processor.handle(&message).await {
                warn!(
                    topic = %message.partition.topic,
                    partition = message.partition.partition,
                    offset = message.offset,
                    error = %err,
                    "Message processing failed; acknowledging anyway"
                );
            }

            // Acknowledge regardless of the outcome: no automatic retry
            session.mark_message(&message);

            debug!(
                value = %message.value_lossy(),
                timestamp = ?message.timestamp,
                topic = %message.partition.topic,
                partition = message.partition.partition,
                offset = message.offset,
                key = %message.key_str(),
                "Message claimed"
            );
        }
    }
}
