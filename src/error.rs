//! Error types for the rental worker

use thiserror::Error;

/// Result type for worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the worker
#[derive(Debug, Error)]
pub enum Error {
    /// Broker unreachable after every connection attempt
    #[error("Connection error after {attempts} attempt(s): {cause}")]
    ConnectionError { attempts: u32, cause: String },

    /// Kafka client failures during steady-state consumption
    #[error("Broker error: {0}")]
    BrokerError(String),

    /// Configuration values that cannot be used
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Message value that does not hold a price
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Database error - SQL errors, constraint violations
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Pool error - connection pool issues
    #[error("Pool error: {0}")]
    PoolError(String),
}

/// Convert tokio-postgres errors to worker errors
impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_error) = err.as_db_error() {
            return Error::DatabaseError(format!(
                "{}: {}",
                db_error.code().code(),
                db_error.message()
            ));
        }

        // Non-database errors (I/O, closed connection) carry their detail in Debug
        Error::DatabaseError(format!("{:?}", err))
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Error::PoolError(err.to_string())
    }
}

impl From<deadpool_postgres::BuildError> for Error {
    fn from(err: deadpool_postgres::BuildError) -> Self {
        Error::PoolError(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for Error {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Error::BrokerError(err.to_string())
    }
}
