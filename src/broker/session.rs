use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::broker::types::{BrokerError, Message, PartitionRef};
use crate::error::Result;

/// Stores the next offset to resume from for a partition
///
/// Marked offsets are committed to the broker by the client (periodically
/// and once more when the client closes).
pub trait OffsetMarker: Send + Sync {
    fn mark_offset(&self, partition: &PartitionRef, next_offset: i64) -> Result<()>;
}

/// One generation of consumer group membership
///
/// Cloned into every claim of the generation. The session token is a child
/// of the worker's shutdown token, so it is cancelled both when the
/// generation is revoked and when the worker shuts down.
#[derive(Clone)]
pub struct GroupSession {
    generation_id: u64,
    assignment: Arc<Vec<PartitionRef>>,
    token: CancellationToken,
    marker: Arc<dyn OffsetMarker>,
}

impl GroupSession {
    pub fn new(
        generation_id: u64,
        assignment: Vec<PartitionRef>,
        token: CancellationToken,
        marker: Arc<dyn OffsetMarker>,
    ) -> Self {
        Self {
            generation_id,
            assignment: Arc::new(assignment),
            token,
            marker,
        }
    }

    pub fn generation_id(&self) -> u64 {
        self.generation_id
    }

    /// Partitions claimed by this member for the generation
    pub fn assignment(&self) -> &[PartitionRef] {
        &self.assignment
    }

    /// Token cancelled when the generation ends
    pub fn context(&self) -> &CancellationToken {
        &self.token
    }

    /// Acknowledge a message, advancing its partition's commit cursor
    ///
    /// Failures (e.g. the partition was revoked meanwhile) are logged; the
    /// message is then redelivered to whichever member owns the partition next.
    pub fn mark_message(&self, message: &Message) {
        if let Err(err) = self
            .marker
            .mark_offset(&message.partition, message.next_offset())
        {
            warn!(
                topic = %message.partition.topic,
                partition = message.partition.partition,
                offset = message.offset,
                error = %err,
                "Failed to mark message offset"
            );
        }
    }
}

/// A single partition's message sequence for one generation
pub struct Claim {
    partition: PartitionRef,
    messages: mpsc::Receiver<Message>,
}

impl Claim {
    pub fn new(partition: PartitionRef, messages: mpsc::Receiver<Message>) -> Self {
        Self {
            partition,
            messages,
        }
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    /// Next message in offset order; `None` once the generation closes the claim
    pub async fn next(&mut self) -> Option<Message> {
        self.messages.recv().await
    }
}

/// Callbacks driven by a group client for every generation
#[async_trait]
pub trait GroupHandler: Send + Sync {
    /// Run at the beginning of a generation, before any claim is consumed
    async fn setup(&self, session: &GroupSession) -> Result<()>;

    /// Run at the end of a generation, once every claim has returned
    async fn cleanup(&self, session: &GroupSession) -> Result<()>;

    /// Consume one claim until it closes or the session is cancelled
    ///
    /// Called on a task the client owns; implementations must run their loop
    /// inline and not detach it onto another task.
    async fn consume_claim(&self, session: GroupSession, claim: Claim) -> Result<()>;
}

/// Consumer group membership, as seen by the rebalance loop
#[async_trait]
pub trait GroupClient: Send + Sync {
    /// Join the group and consume one generation
    ///
    /// Returns when the generation ends (rebalance) or `cancel` fires.
    async fn consume(
        &self,
        cancel: &CancellationToken,
        topics: &[String],
        handler: Arc<dyn GroupHandler>,
    ) -> Result<()>;

    /// Take the asynchronous error channel; `None` once taken
    ///
    /// The channel closes when the client is closed.
    fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<BrokerError>>;

    /// Commit marked offsets and leave the group
    async fn close(&self) -> Result<()>;
}
