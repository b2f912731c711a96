//! Redis-backed reliable queue.

use super::broker::{BrokerError, BrokerResult, Delivery, MessageBroker, dead_letter_topic};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Direction, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Broker built on Redis lists.
///
/// Each topic uses three lists under the `queue:` prefix:
/// `queue:{topic}` (ready), `queue:{topic}:processing` (received, not yet
/// acknowledged) and `queue:{topic}:dead`. Receiving atomically moves a payload
/// from ready to processing with `LMOVE`, so a consumer crash never loses it.
///
/// Blocking commands are avoided because the `ConnectionManager` connection is
/// shared; an empty queue is polled at `poll_interval` instead.
pub struct RedisBroker {
    client: ConnectionManager,
    key_prefix: String,
    poll_interval: Duration,
}

impl RedisBroker {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connection`] if the URL is invalid or Redis is unreachable.
    pub async fn connect(redis_url: &str, poll_interval: Duration) -> BrokerResult<Self> {
        info!("Connecting message broker to Redis");

        let client = Client::open(redis_url)
            .map_err(|e| BrokerError::Connection(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| BrokerError::Connection(format!("Redis PING failed: {}", e)))?;

        info!("✓ Message broker connected to Redis");

        Ok(Self {
            client: manager,
            key_prefix: "queue:".to_string(),
            poll_interval,
        })
    }

    fn ready_key(&self, topic: &str) -> String {
        format!("{}{}", self.key_prefix, topic)
    }

    fn processing_key(&self, topic: &str) -> String {
        format!("{}{}:processing", self.key_prefix, topic)
    }

    fn dead_key(&self, topic: &str) -> String {
        format!("{}{}", self.key_prefix, dead_letter_topic(topic))
    }

    async fn try_move(&self, topic: &str) -> BrokerResult<Option<String>> {
        let mut conn = self.client.clone();
        conn.lmove::<_, _, Option<String>>(
            self.ready_key(topic),
            self.processing_key(topic),
            Direction::Right,
            Direction::Left,
        )
        .await
        .map_err(op_error)
    }
}

fn op_error(e: redis::RedisError) -> BrokerError {
    BrokerError::Operation(e.to_string())
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, topic: &str, payload: &str) -> BrokerResult<()> {
        let mut conn = self.client.clone();
        conn.lpush::<_, _, ()>(self.ready_key(topic), payload)
            .await
            .map_err(op_error)?;
        debug!(topic, "Published message");
        Ok(())
    }

    async fn receive(&self, topic: &str) -> BrokerResult<Option<Delivery>> {
        let payload = match self.try_move(topic).await? {
            Some(payload) => Some(payload),
            None => {
                tokio::time::sleep(self.poll_interval).await;
                self.try_move(topic).await?
            }
        };

        Ok(payload.map(|payload| Delivery {
            topic: topic.to_string(),
            payload,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> BrokerResult<()> {
        let mut conn = self.client.clone();
        let removed: i64 = conn
            .lrem(self.processing_key(&delivery.topic), 1, &delivery.payload)
            .await
            .map_err(op_error)?;

        if removed == 0 {
            warn!(topic = %delivery.topic, "Acknowledged delivery was not in the processing list");
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery) -> BrokerResult<()> {
        let mut conn = self.client.clone();
        conn.lpush::<_, _, ()>(self.dead_key(&delivery.topic), &delivery.payload)
            .await
            .map_err(op_error)?;
        conn.lrem::<_, _, i64>(self.processing_key(&delivery.topic), 1, &delivery.payload)
            .await
            .map_err(op_error)?;
        Ok(())
    }

    async fn dead_letters(&self, topic: &str) -> BrokerResult<Vec<String>> {
        let mut conn = self.client.clone();
        let mut payloads: Vec<String> = conn
            .lrange(self.dead_key(topic), 0, -1)
            .await
            .map_err(op_error)?;
        // LPUSH stores newest first
        payloads.reverse();
        Ok(payloads)
    }

    async fn take_dead_letters(&self, topic: &str) -> BrokerResult<Vec<String>> {
        let key = self.dead_key(topic);
        let mut conn = self.client.clone();
        let mut taken = Vec::new();

        while let Some(payload) = conn
            .rpop::<_, Option<String>>(&key, None)
            .await
            .map_err(op_error)?
        {
            taken.push(payload);
        }

        Ok(taken)
    }

    async fn recover_in_flight(&self, topic: &str) -> BrokerResult<usize> {
        let mut conn = self.client.clone();
        let mut recovered = 0;

        while conn
            .lmove::<_, _, Option<String>>(
                self.processing_key(topic),
                self.ready_key(topic),
                Direction::Right,
                Direction::Right,
            )
            .await
            .map_err(op_error)?
            .is_some()
        {
            recovered += 1;
        }

        if recovered > 0 {
            info!(topic, recovered, "Recovered in-flight messages");
        }
        Ok(recovered)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
