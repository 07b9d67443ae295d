//! Kafka consumer group plumbing
//!
//! This module provides:
//! - `BrokerConnector`: bounded-retry connection to the cluster
//! - `KafkaGroupClient`: librdkafka-backed group membership
//! - `GroupSession` / `Claim`: one generation and its per-partition sequences
//! - `Generation`: claim task management shared by group client implementations
//! - `GroupPump`: applies rebalance events and polled messages in order, for any `PartitionSource`
//!
//! # Generations
//!
//! Each call to [`GroupClient::consume`] spans one generation of the group:
//!
//! 1. **Join**: wait for the coordinator to assign partitions
//! 2. **Setup**: the handler is told the generation is ready
//! 3. **Consume**: one claim task per assigned partition
//! 4. **Revoke**: claims drain, the handler cleans up, `consume` returns
//!
//! Callers loop over `consume` until their shutdown token is cancelled.

pub mod config;
pub mod connector;
pub mod generation;
pub mod kafka;
pub mod pump;
pub mod session;
pub mod types;

pub use config::BrokerConfig;
pub use connector::{retry_connect, BrokerConnector, Connect};
pub use generation::Generation;
pub use kafka::KafkaGroupClient;
pub use pump::{ActiveGeneration, GroupPump, PartitionSource, RebalanceEvent};
pub use session::{Claim, GroupClient, GroupHandler, GroupSession, OffsetMarker};
pub use types::{BrokerError, GroupIdentity, Message, PartitionRef};
