//! Storage for derived rental prices
//!
//! The worker only needs three operations from its store: a liveness check,
//! the startup schema reset, and an idempotent upsert keyed by rental id.

use async_trait::async_trait;

use crate::error::Result;

pub mod connection;
pub mod postgres;

pub use connection::{DatabaseConfig, DEFAULT_DATABASE_URL};
pub use postgres::PgRentalStore;

/// Rental price store shared by every claim
#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Drop and recreate the rentals table
    async fn reset_schema(&self) -> Result<()>;

    /// Insert a rental, or overwrite its price when the id exists
    ///
    /// Replaying the same message yields the same row.
    async fn upsert(&self, id: &str, price: &str) -> Result<()>;
}
