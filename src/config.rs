//! Process configuration

use clap::Parser;
use std::time::Duration;

use crate::broker::{BrokerConfig, GroupIdentity};
use crate::storage::DEFAULT_DATABASE_URL;

/// Command line flags of the worker binary
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Consumes rental prices from Kafka into PostgreSQL", long_about = None)]
pub struct WorkerArgs {
    /// Topic name
    #[arg(long, default_value = "rentals")]
    pub topic: String,

    /// Brokers to connect to (repeatable or comma separated)
    #[arg(long, alias = "brokerList", default_value = "kafka:9092", value_delimiter = ',')]
    pub broker_list: Vec<String>,

    /// Consumer group ID
    #[arg(long, alias = "groupID", default_value = "worker-group")]
    pub group_id: String,

    /// Message counter start from
    #[arg(long, alias = "messageCountStart", default_value = "0")]
    pub message_count_start: u64,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    #[arg(long, default_value = "10")]
    pub max_connect_attempts: u32,

    /// Seconds to wait for the first partition assignment
    #[arg(long, default_value = "10")]
    pub ready_timeout_secs: u64,
}

/// Runtime configuration of the worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub topic: String,
    pub brokers: Vec<String>,
    pub group_id: String,
    pub message_count_start: u64,
    pub max_connect_attempts: u32,
    pub ready_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            topic: "rentals".to_string(),
            brokers: vec!["kafka:9092".to_string()],
            group_id: "worker-group".to_string(),
            message_count_start: 0,
            max_connect_attempts: 10,
            ready_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Set the topic (builder pattern)
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the brokers (builder pattern)
    pub fn with_brokers(mut self, brokers: Vec<String>) -> Self {
        self.brokers = brokers;
        self
    }

    /// Set the consumer group ID (builder pattern)
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    /// Set the initial processed count (builder pattern)
    pub fn with_message_count_start(mut self, start: u64) -> Self {
        self.message_count_start = start;
        self
    }

    /// Set the maximum connection attempts (builder pattern)
    pub fn with_max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    /// Set the readiness timeout (builder pattern)
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn topics(&self) -> Vec<String> {
        vec![self.topic.clone()]
    }

    /// Broker settings for this worker's group
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::new(
            self.brokers.clone(),
            GroupIdentity::new(&self.group_id, self.topics()),
        )
        .with_max_connect_attempts(self.max_connect_attempts)
    }
}

impl From<&WorkerArgs> for WorkerConfig {
    fn from(args: &WorkerArgs) -> Self {
        Self {
            topic: args.topic.clone(),
            brokers: args.broker_list.clone(),
            group_id: args.group_id.clone(),
            message_count_start: args.message_count_start,
            max_connect_attempts: args.max_connect_attempts,
            ready_timeout: Duration::from_secs(args.ready_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = WorkerArgs::try_parse_from(["rental-worker"]).unwrap();
        let config = WorkerConfig::from(&args);

        assert_eq!(config.topic, "rentals");
        assert_eq!(config.brokers, vec!["kafka:9092".to_string()]);
        assert_eq!(config.group_id, "worker-group");
        assert_eq!(config.message_count_start, 0);
        assert_eq!(config.max_connect_attempts, 10);
        assert_eq!(config.ready_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_args_camel_case_aliases() {
        let args = WorkerArgs::try_parse_from([
            "rental-worker",
            "--brokerList",
            "kafka-1:9092",
            "--brokerList",
            "kafka-2:9092",
            "--groupID",
            "pricing",
            "--messageCountStart",
            "42",
        ])
        .unwrap();

        assert_eq!(args.broker_list, vec!["kafka-1:9092", "kafka-2:9092"]);
        assert_eq!(args.group_id, "pricing");
        assert_eq!(args.message_count_start, 42);
    }

    #[test]
    fn test_args_comma_separated_brokers() {
        let args =
            WorkerArgs::try_parse_from(["rental-worker", "--broker-list", "a:9092,b:9092"]).unwrap();
        assert_eq!(args.broker_list, vec!["a:9092", "b:9092"]);
    }

    #[test]
    fn test_broker_config() {
        let config = WorkerConfig::default()
            .with_topic("prices")
            .with_brokers(vec!["localhost:9092".to_string()])
            .with_group_id("pricing")
            .with_max_connect_attempts(3);
        let broker = config.broker_config();

        assert_eq!(broker.brokers, vec!["localhost:9092".to_string()]);
        assert_eq!(broker.group.group_id, "pricing");
        assert_eq!(broker.group.topics, vec!["prices".to_string()]);
        assert_eq!(broker.max_connect_attempts, 3);
    }
}
