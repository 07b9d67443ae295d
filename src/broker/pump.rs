use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::generation::Generation;
use crate::broker::session::{GroupHandler, GroupSession, OffsetMarker};
use crate::broker::types::{BrokerError, Message, PartitionRef};
use crate::error::{Error, Result};

/// Rebalance callback, forwarded from the group member to the pump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceEvent {
    Assigned(Vec<PartitionRef>),
    Revoked(Vec<PartitionRef>),
    Failed(String),
}

/// Subscription and message polling of one group member
///
/// Rebalance callbacks run while `poll` is pending and publish
/// [`RebalanceEvent`]s on their own channel; a rebalance does not make
/// `poll` return.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    fn subscribe(&self, topics: &[String]) -> Result<()>;

    fn unsubscribe(&self);

    /// Next message from any assigned partition
    async fn poll(&self) -> std::result::Result<Message, BrokerError>;

    /// Forward a poll error to the asynchronous error channel
    fn report(&self, error: BrokerError);
}

/// Token of the generation currently consuming
///
/// Shared with the rebalance callback so a revoke stops the claims before
/// the partitions move to another member.
#[derive(Debug, Default)]
pub struct ActiveGeneration {
    token: Mutex<Option<CancellationToken>>,
}

impl ActiveGeneration {
    pub fn set(&self, token: CancellationToken) {
        if let Ok(mut active) = self.token.lock() {
            *active = Some(token);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut active) = self.token.lock() {
            active.take();
        }
    }

    /// Cancel the active generation's claims; false when none is active
    pub fn revoke(&self) -> bool {
        let token = self.token.lock().ok().and_then(|mut active| active.take());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// State carried between `consume` calls
///
/// A single poll can serve a revoke, the following assignment and the first
/// message of that assignment. Whatever belongs to the next generation is
/// kept here for the next call.
struct PumpState {
    events: mpsc::UnboundedReceiver<RebalanceEvent>,
    deferred: VecDeque<RebalanceEvent>,
    pending_message: Option<Message>,
    subscribed: bool,
}

impl PumpState {
    fn next_event(&mut self) -> Option<RebalanceEvent> {
        self.deferred
            .pop_front()
            .or_else(|| self.events.try_recv().ok())
    }
}

enum Polled {
    Cancelled,
    Event(RebalanceEvent),
    Message(std::result::Result<Message, BrokerError>),
}

/// Turns rebalance events and polled messages into generations
///
/// Events are always applied before a message polled after them, so a
/// message is dispatched to the generation that owns its partition.
pub struct GroupPump<S> {
    source: Arc<S>,
    active: Arc<ActiveGeneration>,
    marker: Arc<dyn OffsetMarker>,
    state: tokio::sync::Mutex<PumpState>,
    generations: AtomicU64,
    claim_buffer: usize,
}

impl<S: PartitionSource> GroupPump<S> {
    pub fn new(
        source: Arc<S>,
        events: mpsc::UnboundedReceiver<RebalanceEvent>,
        active: Arc<ActiveGeneration>,
        marker: Arc<dyn OffsetMarker>,
        claim_buffer: usize,
    ) -> Self {
        Self {
            source,
            active,
            marker,
            state: tokio::sync::Mutex::new(PumpState {
                events,
                deferred: VecDeque::new(),
                pending_message: None,
                subscribed: false,
            }),
            generations: AtomicU64::new(0),
            claim_buffer,
        }
    }

    fn subscribe(&self, state: &mut PumpState, topics: &[String]) -> Result<()> {
        if state.subscribed {
            return Ok(());
        }

        self.source.subscribe(topics)?;
        state.subscribed = true;
        info!(topics = ?topics, "Subscribed to topics");
        Ok(())
    }

    /// Leave the group so the next `consume` starts a fresh assignment
    ///
    /// Used when a generation could not be set up: messages fetched for an
    /// assignment nobody consumes must not have later offsets committed past them.
    fn resubscribe_later(&self, state: &mut PumpState) {
        self.source.unsubscribe();
        state.subscribed = false;
        state.deferred.clear();
        state.pending_message = None;
    }

    async fn start_generation(
        &self,
        partitions: Vec<PartitionRef>,
        cancel: &CancellationToken,
        handler: &Arc<dyn GroupHandler>,
    ) -> Result<Generation> {
        let generation_id = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let session = GroupSession::new(
            generation_id,
            partitions,
            cancel.child_token(),
            Arc::clone(&self.marker),
        );
        let generation = Generation::start(session, Arc::clone(handler), self.claim_buffer).await?;
        self.active.set(generation.session().context().clone());
        Ok(generation)
    }

    async fn finish(&self, generation: Option<Generation>) -> Result<()> {
        match generation {
            Some(generation) => {
                self.active.clear();
                generation.finish().await
            }
            None => Ok(()),
        }
    }

    /// Consume one generation; see [`GroupClient::consume`](crate::broker::GroupClient::consume)
    pub async fn consume(
        &self,
        cancel: &CancellationToken,
        topics: &[String],
        handler: Arc<dyn GroupHandler>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        self.subscribe(&mut state, topics)?;

        let mut generation: Option<Generation> = None;

        loop {
            if let Some(event) = state.next_event() {
                match event {
                    RebalanceEvent::Assigned(partitions) => {
                        if generation.is_some() {
                            state.deferred.push_front(RebalanceEvent::Assigned(partitions));
                            return self.finish(generation).await;
                        }

                        match self.start_generation(partitions, cancel, &handler).await {
                            Ok(started) => generation = Some(started),
                            Err(err) => {
                                self.resubscribe_later(&mut state);
                                return Err(err);
                            }
                        }
                    }
                    RebalanceEvent::Revoked(partitions) => {
                        if generation.is_none() {
                            debug!(partitions = partitions.len(), "Revoke outside of a generation");
                            continue;
                        }
                        info!(partitions = partitions.len(), "Partitions revoked");
                        return self.finish(generation).await;
                    }
                    RebalanceEvent::Failed(cause) => {
                        let finished = self.finish(generation).await;
                        self.resubscribe_later(&mut state);
                        finished?;
                        return Err(Error::BrokerError(format!("Rebalance failed: {}", cause)));
                    }
                }
                continue;
            }

            if let Some(message) = state.pending_message.take() {
                match &generation {
                    Some(current) => {
                        current.dispatch(message).await;
                    }
                    None => warn!(
                        topic = %message.partition.topic,
                        partition = message.partition.partition,
                        offset = message.offset,
                        "Message received before partitions were assigned"
                    ),
                }
                continue;
            }

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => Polled::Cancelled,
                Some(event) = state.events.recv() => Polled::Event(event),
                polled = self.source.poll() => Polled::Message(polled),
            };

            match polled {
                Polled::Cancelled => return self.finish(generation).await,
                Polled::Event(event) => state.deferred.push_back(event),
                // Events from the same poll are applied first
                Polled::Message(Ok(message)) => state.pending_message = Some(message),
                Polled::Message(Err(err)) => self.source.report(err),
            }
        }
    }
}
