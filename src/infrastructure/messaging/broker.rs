//! Message broker trait and error types.

use async_trait::async_trait;

/// Errors raised by broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Broker operation error: {0}")]
    Operation(String),
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// A message handed to a consumer.
///
/// The delivery stays owned by the broker until it is acknowledged or
/// dead-lettered; a consumer that dies before either leaves it recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: String,
}

/// Name of the list holding messages that exhausted their retries.
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{}:dead", topic)
}

/// At-least-once message channel between the creation path and the workers.
///
/// Payloads are UTF-8 text. A consumer [`receive`](Self::receive)s a delivery,
/// processes it and then either [`ack`](Self::ack)s it or moves it to the dead
/// letter list. Retries are expressed by publishing a follow-up message before
/// acknowledging the current one, so a crash in between duplicates a message
/// rather than losing it.
///
/// # Implementations
///
/// - [`crate::infrastructure::messaging::RedisBroker`] - Redis lists (reliable queue)
/// - [`crate::infrastructure::messaging::MemoryBroker`] - In-process queues
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Enqueues `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: &str) -> BrokerResult<()>;

    /// Takes the next message, waiting at most one poll interval.
    ///
    /// Returns `Ok(None)` when the topic stayed empty.
    async fn receive(&self, topic: &str) -> BrokerResult<Option<Delivery>>;

    /// Marks a delivery as fully processed.
    async fn ack(&self, delivery: &Delivery) -> BrokerResult<()>;

    /// Moves a delivery to the topic's dead letter list.
    async fn dead_letter(&self, delivery: &Delivery) -> BrokerResult<()>;

    /// Returns dead-lettered payloads without removing them.
    async fn dead_letters(&self, topic: &str) -> BrokerResult<Vec<String>>;

    /// Removes and returns all dead-lettered payloads.
    async fn take_dead_letters(&self, topic: &str) -> BrokerResult<Vec<String>>;

    /// Returns deliveries abandoned by crashed consumers to the queue.
    ///
    /// Returns the number of recovered messages.
    async fn recover_in_flight(&self, topic: &str) -> BrokerResult<usize>;

    /// Checks if the broker backend is reachable.
    async fn health_check(&self) -> bool;
}
