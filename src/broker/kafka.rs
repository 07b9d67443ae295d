use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rdkafka::client::ClientContext;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Message as _};
use rdkafka::TopicPartitionList;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::config::BrokerConfig;
use crate::broker::pump::{ActiveGeneration, GroupPump, PartitionSource, RebalanceEvent};
use crate::broker::session::{GroupClient, GroupHandler, OffsetMarker};
use crate::broker::types::{BrokerError, Message, PartitionRef};
use crate::error::{Error, Result};

/// Client context shared with librdkafka
///
/// Rebalance callbacks run inside `StreamConsumer::recv`, on the task that is
/// pumping the consumer, so they only cancel the active generation and
/// enqueue events.
pub struct GroupContext {
    events: mpsc::UnboundedSender<RebalanceEvent>,
    errors: Mutex<Option<mpsc::UnboundedSender<BrokerError>>>,
    active: Arc<ActiveGeneration>,
}

impl GroupContext {
    fn report(&self, err: BrokerError) {
        let sent = match self.errors.lock() {
            Ok(errors) => errors.as_ref().map(|tx| tx.send(err.clone()).is_ok()),
            Err(_) => None,
        };

        if sent != Some(true) {
            error!(error = %err, "Consumer group error");
        }
    }

    fn close_errors(&self) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.take();
        }
    }
}

impl ClientContext for GroupContext {
    fn error(&self, error: KafkaError, reason: &str) {
        self.report(BrokerError::new(format!("{}: {}", error, reason)));
    }
}

impl ConsumerContext for GroupContext {
    fn pre_rebalance(&self, _consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        let event = match rebalance {
            Rebalance::Revoke(tpl) => {
                // Claims stop before the partitions are unassigned
                if self.active.revoke() {
                    debug!("Active generation cancelled on revoke");
                }
                RebalanceEvent::Revoked(partitions_of(tpl))
            }
            Rebalance::Error(err) => RebalanceEvent::Failed(err.to_string()),
            Rebalance::Assign(_) => return,
        };
        let _ = self.events.send(event);
    }

    fn post_rebalance(&self, _consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        if let Rebalance::Assign(tpl) = rebalance {
            let _ = self.events.send(RebalanceEvent::Assigned(partitions_of(tpl)));
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!("Offsets committed"),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {}
            Err(err) => warn!(error = %err, "Offset commit failed"),
        }
    }
}

fn partitions_of(tpl: &TopicPartitionList) -> Vec<PartitionRef> {
    tpl.elements()
        .iter()
        .map(|elem| PartitionRef::new(elem.topic(), elem.partition()))
        .collect()
}

fn owned_message(borrowed: &BorrowedMessage<'_>) -> Message {
    Message {
        partition: PartitionRef::new(borrowed.topic(), borrowed.partition()),
        offset: borrowed.offset(),
        key: borrowed.key().map(<[u8]>::to_vec),
        value: borrowed.payload().map(<[u8]>::to_vec),
        timestamp: borrowed
            .timestamp()
            .to_millis()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
    }
}

type GroupConsumer = StreamConsumer<GroupContext>;

/// Polls the consumer and stores marked offsets in librdkafka for the next auto-commit
struct KafkaSource {
    consumer: Arc<GroupConsumer>,
}

#[async_trait]
impl PartitionSource for KafkaSource {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)?;
        Ok(())
    }

    fn unsubscribe(&self) {
        self.consumer.unsubscribe();
    }

    async fn poll(&self) -> std::result::Result<Message, BrokerError> {
        match self.consumer.recv().await {
            Ok(borrowed) => Ok(owned_message(&borrowed)),
            Err(err) => Err(BrokerError::new(err.to_string())),
        }
    }

    fn report(&self, error: BrokerError) {
        self.consumer.context().report(error);
    }
}

impl OffsetMarker for KafkaSource {
    fn mark_offset(&self, partition: &PartitionRef, next_offset: i64) -> Result<()> {
        self.consumer
            .store_offset(&partition.topic, partition.partition, next_offset)
            .map_err(Error::from)
    }
}

/// Kafka consumer group member backed by librdkafka
pub struct KafkaGroupClient {
    consumer: Arc<GroupConsumer>,
    pump: GroupPump<KafkaSource>,
    errors: Mutex<Option<mpsc::UnboundedReceiver<BrokerError>>>,
}

impl KafkaGroupClient {
    /// Create the client; no network traffic happens until [`verify`](Self::verify)
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let active = Arc::new(ActiveGeneration::default());

        let context = GroupContext {
            events: events_tx,
            errors: Mutex::new(Some(errors_tx)),
            active: Arc::clone(&active),
        };

        let consumer: GroupConsumer = config.client_config().create_with_context(context)?;
        let consumer = Arc::new(consumer);

        let source = Arc::new(KafkaSource {
            consumer: Arc::clone(&consumer),
        });
        let marker: Arc<dyn OffsetMarker> = source.clone();

        Ok(Self {
            pump: GroupPump::new(source, events_rx, active, marker, config.claim_buffer),
            consumer,
            errors: Mutex::new(Some(errors_rx)),
        })
    }

    /// Fetch cluster metadata to prove at least one broker answers
    pub async fn verify(&self, timeout: Duration) -> Result<()> {
        let consumer = Arc::clone(&self.consumer);
        let metadata = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|err| Error::BrokerError(err.to_string()))??;

        debug!(brokers = metadata, "Kafka cluster metadata fetched");
        Ok(())
    }
}

#[async_trait]
impl GroupClient for KafkaGroupClient {
    async fn consume(
        &self,
        cancel: &CancellationToken,
        topics: &[String],
        handler: Arc<dyn GroupHandler>,
    ) -> Result<()> {
        self.pump.consume(cancel, topics, handler).await
    }

    fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<BrokerError>> {
        self.errors.lock().ok().and_then(|mut errors| errors.take())
    }

    async fn close(&self) -> Result<()> {
        let consumer = Arc::clone(&self.consumer);
        let committed = tokio::task::spawn_blocking(move || {
            let committed = match consumer.commit_consumer_state(CommitMode::Sync) {
                Ok(()) | Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
                Err(err) => Err(Error::from(err)),
            };
            consumer.unsubscribe();
            committed
        })
        .await
        .map_err(|err| Error::BrokerError(err.to_string()));

        self.consumer.context().close_errors();
        info!("Kafka consumer group closed");
        committed?
    }
}
