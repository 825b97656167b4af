//! Manual-commit subscriber.
//!
//! [`Subscriber::consume_messages`] runs one background loop that talks to the
//! caller over three channels in strict alternation:
//!
//! ```text
//!   loop                                   caller
//!   ----                                   ------
//!   poll broker (timeout = poll interval)
//!   deserialize into M
//!   messages.send(Delivered<M>)  ───────▶  messages.recv()
//!                                          ...process...
//!   commits.recv()               ◀───────  commits.send(true | false)
//!   commit offset if true
//!   (repeat)
//! ```
//!
//! Read, deserialization and commit failures go to the `errors` channel and the
//! loop carries on. A message that fails to deserialize is skipped and never
//! committed. Offsets only advance for messages the caller answered `true` for,
//! which gives at-least-once delivery when the caller commits after processing.
//!
//! A delivery completes only when the caller has taken the message off the
//! channel. Cancelling the token stops the loop at whichever wait it is in;
//! from then on the caller's [`Inbox`]es yield nothing, even a message that was
//! already queued. Dropping the [`Subscription`] stops the loop as well.

use crate::consumer::KafkaConsumer;
use crate::error::{Error, Result};
use crate::message::{ConsumerMessage, Delivered, Message};
use crate::transport::ConsumerTransport;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_schema_registry::{AvroDeserializer, DeserializerConfig, SchemaRegistryClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time a single broker poll waits before the loop checks again.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a [`Subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Created,
    Subscribed,
    Consuming,
    Stopped,
}

/// Reads one topic and hands decoded events to the caller, committing only on request.
pub struct Subscriber<C = KafkaConsumer> {
    consumer: Arc<C>,
    deserializer: AvroDeserializer,
    poll_interval: Duration,
    state: Arc<Mutex<SubscriberState>>,
}

impl<C: ConsumerTransport> Subscriber<C> {
    /// The topic is the one the deserializer was built for.
    pub fn new(consumer: Arc<C>, deserializer: AvroDeserializer) -> Self {
        Self {
            consumer,
            deserializer,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: Arc::new(Mutex::new(SubscriberState::Created)),
        }
    }

    /// Build a subscriber decoding with each payload's writer schema.
    pub async fn with_registry(
        consumer: Arc<C>,
        registry: &SchemaRegistryClient,
        topic: &str,
    ) -> Result<Self> {
        let deserializer = registry
            .build_deserializer(topic, &DeserializerConfig::default())
            .await?;
        Ok(Self::new(consumer, deserializer))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn topic(&self) -> &str {
        self.deserializer.topic()
    }

    pub fn state(&self) -> SubscriberState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SubscriberState) {
        set_state(&self.state, state);
    }

    /// Join the consumer group for this subscriber's topic.
    pub fn subscribe_to_topic(&self) -> Result<()> {
        self.consumer.subscribe(self.topic())?;
        self.set_state(SubscriberState::Subscribed);
        info!(topic = %self.topic(), "Subscribed to topic");
        Ok(())
    }

    /// Start the background consume loop and return the caller's ends of its channels.
    ///
    /// Call this once per subscriber: two loops would race on the same
    /// consumer. Must be called from within a tokio runtime.
    pub fn consume_messages<M: ConsumerMessage>(
        &self,
        cancel: CancellationToken,
    ) -> Subscription<M> {
        match self.state() {
            SubscriberState::Created => {
                warn!(topic = %self.topic(), "Consuming before subscribe_to_topic was called")
            }
            SubscriberState::Consuming => {
                warn!(topic = %self.topic(), "A consume loop is already running")
            }
            _ => {}
        }

        let (messages_tx, messages_rx) = mpsc::channel(1);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let (commits_tx, commits_rx) = mpsc::channel(1);

        let consume_loop = ConsumeLoop {
            consumer: Arc::clone(&self.consumer),
            deserializer: self.deserializer.clone(),
            poll_interval: self.poll_interval,
            cancel: cancel.clone(),
            messages: messages_tx,
            errors: errors_tx,
            commits: commits_rx,
            state: Arc::clone(&self.state),
        };
        self.set_state(SubscriberState::Consuming);
        let worker = tokio::spawn(consume_loop.run());

        Subscription {
            messages: Inbox::new(messages_rx, cancel.clone()),
            errors: Inbox::new(errors_rx, cancel.clone()),
            commits: commits_tx,
            cancel,
            worker,
        }
    }
}

fn set_state(state: &Mutex<SubscriberState>, next: SubscriberState) {
    *state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
}

/// Receiving end of a consume loop channel.
///
/// Yields nothing once the cancellation token fires, even when a value is
/// still queued.
pub struct Inbox<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> Inbox<T> {
    fn new(rx: mpsc::Receiver<T>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Next value, or `None` once the loop has stopped or was cancelled.
    pub async fn recv(&mut self) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            value = self.rx.recv() => value,
        }
    }
}

/// Caller side of a running consume loop.
///
/// After every message received from `messages`, send exactly one decision on
/// `commits` before expecting the next message. Keep draining `errors` too
/// (e.g. in a `tokio::select!`); the loop waits while an error is unread.
/// Dropping the subscription stops the loop.
pub struct Subscription<M> {
    /// Decoded events, in broker order per partition
    pub messages: Inbox<Delivered<M>>,
    /// Non-fatal failures: read, deserialization and commit errors
    pub errors: Inbox<Error>,
    /// Commit decision for the most recently received message
    pub commits: mpsc::Sender<bool>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl<M> Subscription<M> {
    /// Answer the pending message: `true` commits its offset, `false` leaves it uncommitted.
    pub async fn commit(&self, decision: bool) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::SubscriptionClosed);
        }
        self.commits
            .send(decision)
            .await
            .map_err(|_| Error::SubscriptionClosed)
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the consume loop to exit.
    pub async fn stopped(self) {
        if let Err(e) = self.worker.await {
            warn!("Consume loop ended abnormally: {e}");
        }
    }
}

struct ConsumeLoop<C, M> {
    consumer: Arc<C>,
    deserializer: AvroDeserializer,
    poll_interval: Duration,
    cancel: CancellationToken,
    messages: mpsc::Sender<Delivered<M>>,
    errors: mpsc::Sender<Error>,
    commits: mpsc::Receiver<bool>,
    state: Arc<Mutex<SubscriberState>>,
}

impl<C: ConsumerTransport, M: ConsumerMessage> ConsumeLoop<C, M> {
    async fn run(mut self) {
        let topic = self.deserializer.topic().to_string();
        info!(topic = %topic, "Consume loop started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.messages.closed() => break,
                polled = self.consumer.poll(self.poll_interval) => polled,
            };

            let message = match polled {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => {
                    warn!(topic = %topic, "{err}");
                    if !self.report(err).await {
                        break;
                    }
                    continue;
                }
            };

            let decoded = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.messages.closed() => break,
                decoded = self.deserializer.deserialize::<M>(&message.payload) => decoded,
            };
            let event = match decoded {
                Ok(event) => event,
                Err(source) => {
                    let err = Error::Deserialization {
                        topic: message.topic.clone(),
                        partition: message.partition,
                        offset: message.offset,
                        source,
                    };
                    warn!(topic = %topic, "{err}");
                    if !self.report(err).await {
                        break;
                    }
                    continue;
                }
            };

            debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                event = event.event_name(),
                "Delivering message"
            );
            let delivered = Delivered {
                event,
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                key: message.key.clone(),
            };

            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                sent = self.messages.send(delivered) => sent,
            };
            if sent.is_err() {
                debug!(topic = %topic, "Message receiver dropped");
                break;
            }
            // The slot frees up only once the caller has taken the message
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = self.messages.reserve() => permit.is_ok(),
            };
            if !received {
                debug!(topic = %topic, "Message receiver dropped");
                break;
            }

            let decision = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.messages.closed() => None,
                decision = self.commits.recv() => decision,
            };
            match decision {
                Some(true) => self.commit(&message).await,
                Some(false) => debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Commit skipped"
                ),
                None => {
                    debug!(topic = %topic, "Subscription dropped");
                    break;
                }
            }
        }

        set_state(&self.state, SubscriberState::Stopped);
        info!(topic = %topic, "Consume loop stopped");
    }

    async fn commit(&self, message: &Message) {
        match self.consumer.commit(message) {
            Ok(()) => debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Committed offset"
            ),
            Err(err) => {
                warn!("{err}");
                self.report(err).await;
            }
        }
    }

    /// Push `err` to the caller. Returns false when the loop should stop instead.
    async fn report(&self, err: Error) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.messages.closed() => false,
            sent = self.errors.send(err) => {
                if sent.is_err() {
                    debug!("Error receiver dropped; error discarded");
                }
                true
            }
        }
    }
}
