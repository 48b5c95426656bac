//! In-process broker with consumer-group semantics.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Notify, RwLock, mpsc};

use crate::bus::{MessageHandler, Publisher, Subscriber};
use crate::codec;
use crate::error::{BusError, Result};

type Payload = Arc<[u8]>;

/// Members of one consumer group on one subject.
struct ConsumerGroup {
    name: String,
    members: Vec<mpsc::UnboundedSender<Payload>>,
    cursor: AtomicUsize,
}

impl ConsumerGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Hands `payload` to the next live member (round-robin). Returns false
    /// when every member has gone away.
    fn deliver(&self, payload: &Payload) -> bool {
        let members = self.members.len();
        (0..members).any(|_| {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % members;
            self.members[index].send(payload.clone()).is_ok()
        })
    }
}

#[derive(Default)]
struct BrokerInner {
    subjects: RwLock<HashMap<String, Vec<ConsumerGroup>>>,
    /// Deliveries queued or being handled.
    in_flight: AtomicUsize,
    idle: Notify,
}

impl BrokerInner {
    fn delivery_finished(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// In-memory broker used for standalone deployments and tests.
///
/// Every consumer group subscribed to a subject receives each published
/// message; inside a group the message goes to exactly one member. Messages
/// published to a subject with no subscribers are dropped, like core NATS.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Creates a broker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a publisher bound to `subject`.
    pub fn publisher<M>(&self, subject: impl Into<String>) -> InMemoryPublisher<M> {
        InMemoryPublisher {
            broker: self.clone(),
            subject: subject.into(),
            _message: PhantomData,
        }
    }

    /// Returns a subscriber joining `group` on `subject`.
    pub fn subscriber(
        &self,
        subject: impl Into<String>,
        group: impl Into<String>,
    ) -> InMemorySubscriber {
        InMemorySubscriber {
            broker: self.clone(),
            subject: subject.into(),
            group: group.into(),
        }
    }

    /// Number of deliveries that are queued or currently being handled.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Waits until every published message has been fully handled.
    ///
    /// Messages published by a handler are counted before the handler's own
    /// delivery completes, so a chain of commands and replies is only idle
    /// once the whole chain has run out.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    #[tracing::instrument(name = "bus.publish", skip(self, payload), fields(bytes = payload.len()))]
    async fn publish_raw(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        let payload: Payload = payload.into();
        let subjects = self.inner.subjects.read().await;

        let Some(groups) = subjects.get(subject) else {
            tracing::debug!("no subscribers, message dropped");
            return Ok(());
        };

        // A closed group must not keep the message from the other groups.
        let mut closed = Vec::new();
        for group in groups.iter().filter(|g| !g.members.is_empty()) {
            self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
            if !group.deliver(&payload) {
                self.inner.delivery_finished();
                closed.push(group.name.as_str());
            }
        }
        if !closed.is_empty() {
            return Err(BusError::Publish {
                subject: subject.to_string(),
                reason: format!("consumer group '{}' is closed", closed.join("', '")),
            });
        }

        metrics::counter!("bus_messages_published_total", "subject" => subject.to_string())
            .increment(1);
        Ok(())
    }

    async fn add_member(&self, subject: &str, group: &str) -> mpsc::UnboundedReceiver<Payload> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subjects = self.inner.subjects.write().await;
        let groups = subjects.entry(subject.to_string()).or_default();

        match groups.iter_mut().find(|g| g.name == group) {
            Some(existing) => existing.members.push(tx),
            None => {
                let mut created = ConsumerGroup::new(group);
                created.members.push(tx);
                groups.push(created);
            }
        }
        rx
    }
}

/// Publisher bound to one subject of an [`InMemoryBroker`].
pub struct InMemoryPublisher<M> {
    broker: InMemoryBroker,
    subject: String,
    _message: PhantomData<fn(&M)>,
}

impl<M> InMemoryPublisher<M> {
    /// The subject this publisher writes to.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl<M> Publisher<M> for InMemoryPublisher<M>
where
    M: Serialize + Sync,
{
    async fn publish(&self, message: &M) -> Result<()> {
        let payload = codec::encode(message)?;
        self.broker.publish_raw(&self.subject, payload).await
    }
}

/// Subscriber joining one consumer group of an [`InMemoryBroker`].
#[derive(Clone)]
pub struct InMemorySubscriber {
    broker: InMemoryBroker,
    subject: String,
    group: String,
}

#[async_trait]
impl Subscriber for InMemorySubscriber {
    async fn subscribe<H: MessageHandler>(&self, handler: Arc<H>) -> Result<()> {
        let mut deliveries = self.broker.add_member(&self.subject, &self.group).await;
        let inner = self.broker.inner.clone();
        let subject = self.subject.clone();
        let group = self.group.clone();

        tokio::spawn(async move {
            while let Some(payload) = deliveries.recv().await {
                match codec::decode::<H::Message>(&payload) {
                    Ok(message) => {
                        // A panicking handler loses its message, not the member.
                        let handler = handler.clone();
                        let handled =
                            tokio::spawn(async move { handler.handle(message).await }).await;
                        if let Err(error) = handled {
                            tracing::error!(%subject, %group, %error, "message handler panicked");
                            metrics::counter!("bus_handler_panics_total", "subject" => subject.clone())
                                .increment(1);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%subject, %group, %error, "dropping undecodable message");
                        metrics::counter!("bus_decode_failures_total", "subject" => subject.clone())
                            .increment(1);
                    }
                }
                inner.delivery_finished();
            }
        });

        tracing::info!(subject = %self.subject, group = %self.group, "consumer group member started");
        Ok(())
    }
}
