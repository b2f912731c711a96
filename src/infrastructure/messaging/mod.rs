//! Message transport for verification requests.
//!
//! - [`RedisBroker`] - Reliable queue on Redis lists
//! - [`MemoryBroker`] - In-process queues

mod broker;
mod memory_broker;
mod redis_broker;

pub use broker::{BrokerError, BrokerResult, Delivery, MessageBroker, dead_letter_topic};
pub use memory_broker::MemoryBroker;
pub use redis_broker::RedisBroker;
