use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

use crate::broker::config::BrokerConfig;
use crate::broker::kafka::KafkaGroupClient;
use crate::broker::session::GroupClient;
use crate::error::{Error, Result};

/// Produces a connected group client for the worker
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn GroupClient>>;
}

/// Run `attempt` until it succeeds or `max_attempts` attempts have failed
///
/// Every failure is logged and followed by `backoff`, including the last one,
/// so exhausting `n` attempts takes at least `n * backoff`. A `max_attempts`
/// of zero is treated as one.
pub async fn retry_connect<T, F, Fut>(max_attempts: u32, backoff: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = max_attempts.max(1);
    let mut last_cause = String::new();

    for number in 1..=attempts {
        match attempt(number).await {
            Ok(connected) => return Ok(connected),
            Err(err) => {
                warn!(
                    attempt = number,
                    max_attempts = attempts,
                    error = %err,
                    "Failed to connect to Kafka consumer group. Retrying in {:?}...",
                    backoff
                );
                last_cause = err.to_string();
                time::sleep(backoff).await;
            }
        }
    }

    Err(Error::ConnectionError {
        attempts,
        cause: last_cause,
    })
}

/// Connects to the Kafka cluster with a bounded number of attempts
pub struct BrokerConnector {
    config: BrokerConfig,
}

impl BrokerConnector {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    /// Create a group client and verify the cluster answers
    pub async fn connect_kafka(&self) -> Result<KafkaGroupClient> {
        info!(
            group_id = %self.config.group.group_id,
            brokers = ?self.config.brokers,
            "Waiting for kafka consumer group..."
        );

        let config = &self.config;
        let client = retry_connect(config.max_connect_attempts, config.retry_backoff, |_| async move {
            let client = KafkaGroupClient::new(config)?;
            client.verify(config.metadata_timeout).await?;
            Ok(client)
        })
        .await?;

        info!("Kafka consumer group connected!");
        Ok(client)
    }
}

#[async_trait]
impl Connect for BrokerConnector {
    async fn connect(&self) -> Result<Arc<dyn GroupClient>> {
        let client = self.connect_kafka().await?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = time::Instant::now();

        let result: Result<()> = retry_connect(2, Duration::from_secs(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::BrokerError("Broker transport failure".to_string())) }
        })
        .await;

        let elapsed = started.elapsed();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));

        match result {
            Err(Error::ConnectionError { attempts, cause }) => {
                assert_eq!(attempts, 2);
                assert!(cause.contains("Broker transport failure"));
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_first_success() {
        let started = time::Instant::now();

        let result = retry_connect(10, Duration::from_secs(1), |attempt| async move {
            if attempt < 3 {
                Err(Error::BrokerError("not yet".to_string()))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_tries_once() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_connect(0, Duration::from_secs(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::BrokerError("down".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::ConnectionError { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails() {
        let config = BrokerConfig::default()
            .with_max_connect_attempts(2)
            .with_retry_backoff(Duration::from_millis(100))
            .with_metadata_timeout(Duration::from_millis(500));
        let config = BrokerConfig {
            brokers: vec!["127.0.0.1:1".to_string()],
            ..config
        };

        let started = std::time::Instant::now();
        let result = BrokerConnector::new(config).connect_kafka().await;

        assert!(matches!(result, Err(Error::ConnectionError { attempts: 2, .. })));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
