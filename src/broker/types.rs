use chrono::{DateTime, Utc};
use std::fmt;

/// One ordered message sequence within a topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionRef {
    pub topic: String,
    pub partition: i32,
}

impl PartitionRef {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for PartitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Which partition assignments this process may receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIdentity {
    /// Consumer group ID
    pub group_id: String,

    /// Topics the group subscribes to
    pub topics: Vec<String>,
}

impl GroupIdentity {
    pub fn new(group_id: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            group_id: group_id.into(),
            topics,
        }
    }
}

/// Message read from a claimed partition
///
/// Owned copy of the broker record. The consumer never retains it beyond the
/// processing call.
#[derive(Debug, Clone)]
pub struct Message {
    /// Partition the message was read from
    pub partition: PartitionRef,

    /// Offset within the partition
    pub offset: i64,

    /// Opaque record key
    pub key: Option<Vec<u8>>,

    /// Record payload
    pub value: Option<Vec<u8>>,

    /// Producer or log-append timestamp, when the broker reports one
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message with the given key and value (builder entry point)
    ///
    /// # Example
    ///
    /// ```
    /// use rental_worker::broker::{Message, PartitionRef};
    ///
    /// let msg = Message::new(PartitionRef::new("rentals", 0), 42)
    ///     .with_key("7")
    ///     .with_value("12.990000");
    ///
    /// assert_eq!(msg.key_str(), "7");
    /// assert_eq!(msg.next_offset(), 43);
    /// ```
    pub fn new(partition: PartitionRef, offset: i64) -> Self {
        Self {
            partition,
            offset,
            key: None,
            value: None,
            timestamp: None,
        }
    }

    /// Set the key (builder pattern)
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the value (builder pattern)
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Key as a string identifier; empty when the record has no key
    pub fn key_str(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }

    /// Value as a lossy string, for logging
    pub fn value_lossy(&self) -> String {
        self.value
            .as_deref()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default()
    }

    /// Offset a consumer resumes from once this message is acknowledged
    pub fn next_offset(&self) -> i64 {
        self.offset + 1
    }
}

/// Asynchronous error reported by the group client outside of `consume`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerError {
    pub message: String,
}

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
