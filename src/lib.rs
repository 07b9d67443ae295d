//! Rental price worker
//!
//! Joins a Kafka consumer group, upserts the rental price carried by each
//! message into PostgreSQL, and drains in-flight work on shutdown.
//!
//! # Quick Start
//!
//! ```no_run
//! use rental_worker::broker::BrokerConnector;
//! use rental_worker::config::WorkerConfig;
//! use rental_worker::storage::{DatabaseConfig, PgRentalStore};
//! use rental_worker::worker::Worker;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::default().with_brokers(vec!["localhost:9092".to_string()]);
//!     let store = PgRentalStore::new(DatabaseConfig::default()).await?;
//!     let connector = BrokerConnector::new(config.broker_config());
//!
//!     Worker::new(config, Arc::new(store), Arc::new(connector))
//!         .run(async { let _ = tokio::signal::ctrl_c().await; })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod processor;
pub mod storage;
pub mod worker;

// Re-export main types for convenience
pub use config::{WorkerArgs, WorkerConfig};
pub use error::{Error, Result};
pub use worker::{Summary, Worker};
