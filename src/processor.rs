//! Message processing: price parsing and storage upserts

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::broker::Message;
use crate::error::{Error, Result};
use crate::storage::RentalStore;

/// Handles one message of a claim
///
/// Claims acknowledge every message after `handle` returns, whatever the
/// outcome, so implementations log their own failures.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<()>;
}

/// Process-wide count of successfully parsed messages
#[derive(Debug, Default)]
pub struct ProcessedCount(AtomicU64);

impl ProcessedCount {
    /// Start counting from `start` (carried over from a previous run)
    pub fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    /// Increment and return the new count
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parse a message value as a decimal price
///
/// # Example
///
/// ```
/// use rental_worker::processor::parse_price;
///
/// assert_eq!(parse_price(Some(b"12.990000".as_slice())).unwrap(), 12.99);
/// assert!(parse_price(Some(b"abc".as_slice())).is_err());
/// assert!(parse_price(None).is_err());
/// ```
pub fn parse_price(value: Option<&[u8]>) -> Result<f64> {
    let value = value.ok_or_else(|| Error::ParseError("message has no value".to_string()))?;

    let text = std::str::from_utf8(value)
        .map_err(|err| Error::ParseError(format!("value is not UTF-8: {}", err)))?;

    let price = text
        .parse::<f64>()
        .map_err(|err| Error::ParseError(format!("invalid price '{}': {}", text, err)))?;

    if !price.is_finite() {
        return Err(Error::ParseError(format!("invalid price '{}': not finite", text)));
    }

    Ok(price)
}

/// Format a price the way it is stored: six decimal places
pub fn format_price(price: f64) -> String {
    format!("{:.6}", price)
}

/// Upserts rental prices keyed by message key
pub struct PriceProcessor {
    store: Arc<dyn RentalStore>,
    processed: Arc<ProcessedCount>,
}

impl PriceProcessor {
    pub fn new(store: Arc<dyn RentalStore>, processed: Arc<ProcessedCount>) -> Self {
        Self { store, processed }
    }
}

#[async_trait]
impl Processor for PriceProcessor {
    async fn handle(&self, message: &Message) -> Result<()> {
        let id = message.key_str();

        let price = match parse_price(message.value.as_deref()) {
            Ok(price) => price,
            Err(err) => {
                warn!(
                    topic = %message.partition.topic,
                    partition = message.partition.partition,
                    offset = message.offset,
                    key = %id,
                    error = %err,
                    "Error parsing price value"
                );
                return Ok(());
            }
        };

        self.processed.increment();
        let price = format_price(price);

        match self.store.upsert(&id, &price).await {
            Ok(()) => {
                info!(
                    topic = %message.partition.topic,
                    partition = message.partition.partition,
                    offset = message.offset,
                    "Successfully inserted/updated rental: id={}, price={}",
                    id,
                    price
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    topic = %message.partition.topic,
                    partition = message.partition.partition,
                    offset = message.offset,
                    key = %id,
                    error = %err,
                    "Error inserting into database"
                );
                Err(err)
            }
        }
    }
}
