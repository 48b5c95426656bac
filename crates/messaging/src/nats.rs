//! NATS backend: subjects map to NATS subjects, consumer groups to queue groups.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;

use crate::bus::{MessageHandler, Publisher, Subscriber};
use crate::codec;
use crate::error::{BusError, Result};

/// Connection to a NATS server shared by publishers and subscribers.
#[derive(Clone)]
pub struct NatsBroker {
    client: async_nats::Client,
}

impl NatsBroker {
    /// Connects to the NATS server at `url` (e.g. `nats://localhost:4222`).
    #[tracing::instrument]
    pub async fn connect(url: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        tracing::info!("connected to NATS");
        Ok(Self { client })
    }

    /// Returns a publisher bound to `subject`.
    pub fn publisher<M>(&self, subject: impl Into<String>) -> NatsPublisher<M> {
        NatsPublisher {
            client: self.client.clone(),
            subject: subject.into(),
            _message: PhantomData,
        }
    }

    /// Returns a subscriber joining queue group `group` on `subject`.
    pub fn subscriber(&self, subject: impl Into<String>, group: impl Into<String>) -> NatsSubscriber {
        NatsSubscriber {
            client: self.client.clone(),
            subject: subject.into(),
            group: group.into(),
        }
    }
}

/// Publisher bound to one NATS subject.
pub struct NatsPublisher<M> {
    client: async_nats::Client,
    subject: String,
    _message: PhantomData<fn(&M)>,
}

#[async_trait]
impl<M> Publisher<M> for NatsPublisher<M>
where
    M: Serialize + Sync,
{
    async fn publish(&self, message: &M) -> Result<()> {
        let payload = codec::encode(message)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| BusError::Publish {
                subject: self.subject.clone(),
                reason: e.to_string(),
            })?;
        metrics::counter!("bus_messages_published_total", "subject" => self.subject.clone())
            .increment(1);
        Ok(())
    }
}

/// Queue-group subscriber on one NATS subject.
#[derive(Clone)]
pub struct NatsSubscriber {
    client: async_nats::Client,
    subject: String,
    group: String,
}

#[async_trait]
impl Subscriber for NatsSubscriber {
    async fn subscribe<H: MessageHandler>(&self, handler: Arc<H>) -> Result<()> {
        let mut messages = self
            .client
            .queue_subscribe(self.subject.clone(), self.group.clone())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: self.subject.clone(),
                reason: e.to_string(),
            })?;
        let subject = self.subject.clone();
        let group = self.group.clone();

        tokio::spawn(async move {
            while let Some(message) = messages.next().await {
                match codec::decode::<H::Message>(&message.payload) {
                    Ok(decoded) => {
                        let handler = handler.clone();
                        let handled =
                            tokio::spawn(async move { handler.handle(decoded).await }).await;
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
            }
            tracing::info!(%subject, %group, "NATS subscription closed");
        });

        tracing::info!(subject = %self.subject, group = %self.group, "queue subscription started");
        Ok(())
    }
}
