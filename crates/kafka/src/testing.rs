//! In-memory broker for tests.
//!
//! [`MemoryBroker`] implements [`ProducerTransport`] and [`TopicAdmin`];
//! [`MemoryConsumer`] implements [`ConsumerTransport`] on top of it. Every topic
//! has a single partition (0). Committed positions are tracked per consumer
//! group, and a consumer subscribing to a topic resumes after its group's last
//! committed message.

use crate::error::{Error, Result};
use crate::message::{DeliveryReport, DeliveryResult, Message, OutboundRecord};
use crate::transport::{ConsumerTransport, ProducerTransport, TopicAdmin, TopicOutcome, TopicSpec};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

const PARTITION: i32 = 0;

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Message>>,
    /// Offset of the last committed message per (group, topic)
    committed: HashMap<(String, String), i64>,
    commit_calls: usize,
    failing_commits: usize,
    failing_creates: usize,
    read_errors: VecDeque<String>,
}

#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
}

/// Kafka's rules for topic names.
pub fn is_valid_topic_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 249
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create `topic` directly, bypassing [`TopicAdmin`].
    pub fn add_topic(&self, topic: &str) {
        self.lock().topics.entry(topic.to_string()).or_default();
    }

    /// Append a raw record, e.g. one with a payload no deserializer accepts.
    pub fn append(&self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<i64> {
        let mut state = self.lock();
        let log = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| Error::Delivery {
                topic: topic.to_string(),
                message: "Broker: Unknown topic or partition".to_string(),
            })?;
        let offset = log.len() as i64;
        log.push(Message {
            topic: topic.to_string(),
            key: key.map(|k| k.to_vec()),
            payload: payload.to_vec(),
            partition: PARTITION,
            offset,
            timestamp: None,
        });
        Ok(offset)
    }

    /// Everything stored on `topic`, in offset order.
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        self.lock().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Offset of the last message `group_id` committed on `topic`.
    pub fn last_committed(&self, group_id: &str, topic: &str) -> Option<i64> {
        self.lock()
            .committed
            .get(&(group_id.to_string(), topic.to_string()))
            .copied()
    }

    /// Number of commit requests received, failed ones included.
    pub fn commit_calls(&self) -> usize {
        self.lock().commit_calls
    }

    /// Make the next `count` commits fail.
    pub fn fail_next_commits(&self, count: usize) {
        self.lock().failing_commits = count;
    }

    /// Make the next `count` topic creations fail.
    pub fn fail_next_creates(&self, count: usize) {
        self.lock().failing_creates = count;
    }

    /// Make the next poll of any consumer return a read error.
    pub fn inject_read_error(&self, message: &str) {
        self.lock().read_errors.push_back(message.to_string());
    }
}

impl ProducerTransport for MemoryBroker {
    fn enqueue(&self, record: OutboundRecord, ack: oneshot::Sender<DeliveryResult>) -> Result<()> {
        let outcome = self
            .append(&record.topic, record.key.as_deref(), &record.payload)
            .map(|offset| DeliveryReport {
                topic: record.topic.clone(),
                partition: PARTITION,
                offset,
            })
            .map_err(|e| match e {
                Error::Delivery { message, .. } => message,
                other => other.to_string(),
            });
        let _ = ack.send(outcome);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TopicAdmin for MemoryBroker {
    async fn topic_exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock().topics.contains_key(name))
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicOutcome> {
        let mut state = self.lock();
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(Error::TopicCreation {
                topic: spec.name.clone(),
                message: "Broker: injected failure".to_string(),
            });
        }
        if !is_valid_topic_name(&spec.name) || spec.partitions < 1 || spec.replication_factor < 1 {
            return Err(Error::TopicCreation {
                topic: spec.name.clone(),
                message: "Broker: Invalid topic".to_string(),
            });
        }
        if state.topics.contains_key(&spec.name) {
            return Ok(TopicOutcome::AlreadyExists);
        }
        state.topics.insert(spec.name.clone(), Vec::new());
        Ok(TopicOutcome::Created)
    }
}

/// A consumer group member reading from a [`MemoryBroker`].
pub struct MemoryConsumer {
    broker: Arc<MemoryBroker>,
    group_id: String,
    topic: Mutex<Option<String>>,
    position: AtomicUsize,
}

impl MemoryConsumer {
    pub fn new(broker: Arc<MemoryBroker>, group_id: &str) -> Self {
        Self {
            broker,
            group_id: group_id.to_string(),
            topic: Mutex::new(None),
            position: AtomicUsize::new(0),
        }
    }

    /// Offset of the next message this consumer will fetch.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    fn subscribed_topic(&self) -> Option<String> {
        self.topic
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn fetch(&self) -> Result<Option<Message>> {
        let mut state = self.broker.lock();
        if let Some(message) = state.read_errors.pop_front() {
            return Err(Error::Read(message));
        }
        let Some(topic) = self.subscribed_topic() else {
            return Ok(None);
        };
        let position = self.position.load(Ordering::SeqCst);
        let next = state
            .topics
            .get(&topic)
            .and_then(|log| log.get(position))
            .cloned();
        if next.is_some() {
            self.position.store(position + 1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

#[async_trait::async_trait]
impl ConsumerTransport for MemoryConsumer {
    fn subscribe(&self, topic: &str) -> Result<()> {
        if !is_valid_topic_name(topic) {
            return Err(Error::Subscription {
                topic: topic.to_string(),
                message: "Broker: Invalid topic".to_string(),
            });
        }
        let resume = self
            .broker
            .last_committed(&self.group_id, topic)
            .map(|offset| offset as usize + 1)
            .unwrap_or(0);
        self.position.store(resume, Ordering::SeqCst);
        *self
            .topic
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(topic.to_string());
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Message>> {
        match self.fetch()? {
            Some(message) => Ok(Some(message)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    fn commit(&self, message: &Message) -> Result<()> {
        let mut state = self.broker.lock();
        state.commit_calls += 1;
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(Error::Commit {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                message: "Broker: injected failure".to_string(),
            });
        }
        state.committed.insert(
            (self.group_id.clone(), message.topic.clone()),
            message.offset,
        );
        Ok(())
    }
}
