//! Consumer group handling for the worker
//!
//! - `ConsumerGroupHandler`: readiness per generation and the claim loop
//! - `RebalanceLoop`: rejoins the group after every generation until shutdown

pub mod handler;
pub mod rebalance;

pub use handler::ConsumerGroupHandler;
pub use rebalance::RebalanceLoop;
