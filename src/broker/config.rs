use rdkafka::ClientConfig;
use std::time::Duration;

use crate::broker::types::GroupIdentity;

/// Configuration for joining the Kafka consumer group
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Bootstrap brokers (host:port)
    pub brokers: Vec<String>,

    /// Group ID and subscribed topics
    pub group: GroupIdentity,

    /// Interval between automatic commits of marked offsets
    pub auto_commit_interval: Duration,

    /// How long the group coordinator keeps committed offsets of an idle group
    ///
    /// Enforced broker-side (`offsets.retention.minutes`); kept here so the
    /// deployment value is visible next to the client settings.
    pub offset_retention: Duration,

    /// Upper bound for the metadata request that verifies each connection attempt
    pub metadata_timeout: Duration,

    /// Connection attempts before giving up
    pub max_connect_attempts: u32,

    /// Fixed wait after each failed connection attempt
    pub retry_backoff: Duration,

    /// Messages buffered per claim
    pub claim_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["kafka:9092".to_string()],
            group: GroupIdentity::new("worker-group", vec!["rentals".to_string()]),
            auto_commit_interval: Duration::from_secs(1),
            offset_retention: Duration::from_secs(60 * 60),
            metadata_timeout: Duration::from_secs(5),
            max_connect_attempts: 10,
            retry_backoff: Duration::from_secs(1),
            claim_buffer: 256,
        }
    }
}

impl BrokerConfig {
    /// Create a configuration for the given brokers and group
    ///
    /// # Example
    ///
    /// ```
    /// use rental_worker::broker::{BrokerConfig, GroupIdentity};
    ///
    /// let config = BrokerConfig::new(
    ///     vec!["localhost:9092".to_string()],
    ///     GroupIdentity::new("worker-group", vec!["rentals".to_string()]),
    /// )
    /// .with_max_connect_attempts(3);
    ///
    /// assert_eq!(config.max_connect_attempts, 3);
    /// ```
    pub fn new(brokers: Vec<String>, group: GroupIdentity) -> Self {
        Self {
            brokers,
            group,
            ..Default::default()
        }
    }

    /// Set the maximum number of connection attempts (builder pattern)
    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    /// Set the backoff between connection attempts (builder pattern)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the metadata timeout used to verify a connection (builder pattern)
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Set the auto-commit interval (builder pattern)
    pub fn with_auto_commit_interval(mut self, interval: Duration) -> Self {
        self.auto_commit_interval = interval;
        self
    }

    /// Set the per-claim buffer size (builder pattern)
    pub fn with_claim_buffer(mut self, buffer: usize) -> Self {
        self.claim_buffer = buffer;
        self
    }

    /// Build the librdkafka client configuration
    ///
    /// - a group without committed offsets starts from the oldest retained message
    /// - offsets are stored only when a message is marked, and auto-committed
    /// - partitions are assigned with the range strategy
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("group.id", &self.group.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                self.auto_commit_interval.as_millis().to_string(),
            )
            .set("enable.auto.offset.store", "false")
            .set("partition.assignment.strategy", "range")
            .set("enable.partition.eof", "false");
        config
    }
}
