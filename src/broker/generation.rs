use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broker::session::{Claim, GroupHandler, GroupSession};
use crate::broker::types::{Message, PartitionRef};
use crate::error::Result;

/// Running generation: one claim task per assigned partition
///
/// Group clients create a generation when partitions are assigned, route
/// polled messages into it with [`Generation::dispatch`], and call
/// [`Generation::finish`] when the assignment is revoked or the worker stops.
pub struct Generation {
    session: GroupSession,
    handler: Arc<dyn GroupHandler>,
    senders: HashMap<PartitionRef, mpsc::Sender<Message>>,
    claims: JoinSet<()>,
}

impl Generation {
    /// Run the handler's setup and spawn a claim task per assigned partition
    ///
    /// `buffer` bounds the messages queued per claim; when a claim falls
    /// behind, dispatching waits instead of buffering without limit.
    pub async fn start(
        session: GroupSession,
        handler: Arc<dyn GroupHandler>,
        buffer: usize,
    ) -> Result<Self> {
        handler.setup(&session).await?;

        let mut senders = HashMap::new();
        let mut claims = JoinSet::new();

        for partition in session.assignment() {
            let (tx, rx) = mpsc::channel(buffer.max(1));
            senders.insert(partition.clone(), tx);

            let claim = Claim::new(partition.clone(), rx);
            let claim_session = session.clone();
            let claim_handler = Arc::clone(&handler);
            claims.spawn(async move {
                let partition = claim.partition().clone();
                if let Err(err) = claim_handler.consume_claim(claim_session, claim).await {
                    error!(
                        topic = %partition.topic,
                        partition = partition.partition,
                        error = %err,
                        "Claim consumer failed"
                    );
                }
            });
        }

        info!(
            generation = session.generation_id(),
            partitions = session.assignment().len(),
            "Consumer group generation started"
        );

        Ok(Self {
            session,
            handler,
            senders,
            claims,
        })
    }

    pub fn session(&self) -> &GroupSession {
        &self.session
    }

    /// Hand a message to the claim owning its partition
    ///
    /// Returns false when the message was not delivered: the partition is not
    /// part of this generation, or the generation ended while waiting.
    pub async fn dispatch(&self, message: Message) -> bool {
        let Some(tx) = self.senders.get(&message.partition) else {
            warn!(
                generation = self.session.generation_id(),
                topic = %message.partition.topic,
                partition = message.partition.partition,
                offset = message.offset,
                "Dropping message for a partition outside the current generation"
            );
            return false;
        };

        tokio::select! {
            sent = tx.send(message) => sent.is_ok(),
            _ = self.session.context().cancelled() => false,
        }
    }

    /// End the generation and wait for every claim to drain
    ///
    /// Claims finish the message they are processing before observing the
    /// cancellation; messages still queued are left unacknowledged.
    pub async fn finish(mut self) -> Result<()> {
        self.session.context().cancel();
        self.senders.clear();

        while let Some(joined) = self.claims.join_next().await {
            if let Err(err) = joined {
                error!(
                    generation = self.session.generation_id(),
                    error = %err,
                    "Claim task aborted"
                );
            }
        }

        debug!(
            generation = self.session.generation_id(),
            "All claims drained"
        );

        self.handler.cleanup(&self.session).await
    }
}
