//! In-process broker used when Redis is not configured, and in tests.

use super::broker::{BrokerResult, Delivery, MessageBroker};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

#[derive(Debug, Default)]
struct TopicState {
    ready: VecDeque<String>,
    in_flight: Vec<String>,
    dead: Vec<String>,
}

#[derive(Debug, Default)]
struct Topic {
    state: Mutex<TopicState>,
    notify: Notify,
}

/// Broker keeping per-topic queues in memory.
///
/// Mirrors the Redis reliable-queue semantics (ready, in-flight and dead lists)
/// so that consumers behave identically against both backends. Messages do not
/// survive a restart.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    topics: Arc<DashMap<String, Arc<Topic>>>,
    poll_interval: Duration,
}

impl MemoryBroker {
    pub fn new(poll_interval: Duration) -> Self {
        debug!("Using in-memory message broker");
        Self {
            topics: Arc::new(DashMap::new()),
            poll_interval,
        }
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics.entry(name.to_string()).or_default().clone()
    }

    /// Number of messages waiting to be received on `topic`.
    pub async fn ready_len(&self, topic: &str) -> usize {
        self.topic(topic).state.lock().await.ready.len()
    }

    /// Number of received but unacknowledged messages on `topic`.
    pub async fn in_flight_len(&self, topic: &str) -> usize {
        self.topic(topic).state.lock().await.in_flight.len()
    }

    async fn pop_ready(topic: &Topic) -> Option<String> {
        let mut state = topic.state.lock().await;
        let payload = state.ready.pop_front()?;
        state.in_flight.push(payload.clone());
        Some(payload)
    }
}

fn remove_first(list: &mut Vec<String>, payload: &str) -> bool {
    match list.iter().position(|p| p == payload) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> BrokerResult<()> {
        let queue = self.topic(topic);
        queue.state.lock().await.ready.push_back(payload.to_string());
        queue.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, topic: &str) -> BrokerResult<Option<Delivery>> {
        let queue = self.topic(topic);

        let payload = match Self::pop_ready(&queue).await {
            Some(payload) => Some(payload),
            None => {
                let _ = tokio::time::timeout(self.poll_interval, queue.notify.notified()).await;
                Self::pop_ready(&queue).await
            }
        };

        Ok(payload.map(|payload| Delivery {
            topic: topic.to_string(),
            payload,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> BrokerResult<()> {
        let queue = self.topic(&delivery.topic);
        remove_first(&mut queue.state.lock().await.in_flight, &delivery.payload);
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery) -> BrokerResult<()> {
        let queue = self.topic(&delivery.topic);
        let mut state = queue.state.lock().await;
        remove_first(&mut state.in_flight, &delivery.payload);
        state.dead.push(delivery.payload.clone());
        Ok(())
    }

    async fn dead_letters(&self, topic: &str) -> BrokerResult<Vec<String>> {
        Ok(self.topic(topic).state.lock().await.dead.clone())
    }

    async fn take_dead_letters(&self, topic: &str) -> BrokerResult<Vec<String>> {
        Ok(std::mem::take(&mut self.topic(topic).state.lock().await.dead))
    }

    async fn recover_in_flight(&self, topic: &str) -> BrokerResult<usize> {
        let queue = self.topic(topic);
        let mut state = queue.state.lock().await;
        let recovered = std::mem::take(&mut state.in_flight);
        let count = recovered.len();
        for payload in recovered.into_iter().rev() {
            state.ready.push_front(payload);
        }
        drop(state);

        if count > 0 {
            queue.notify.notify_waiters();
        }
        Ok(count)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
