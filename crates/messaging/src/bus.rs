//! Transport-agnostic publish/subscribe contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Publishes messages of type `M` to one fixed subject.
#[async_trait]
pub trait Publisher<M>: Send + Sync {
    /// Publishes a message. Returns once the broker has accepted it.
    async fn publish(&self, message: &M) -> Result<()>;
}

/// Consumes decoded messages delivered from a subject.
///
/// Handlers never fail across the message boundary: anything that goes wrong
/// is turned into a reply or logged by the handler itself.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// The message type this handler decodes from the wire.
    type Message: DeserializeOwned + Send + 'static;

    /// Handles a single delivered message.
    async fn handle(&self, message: Self::Message);
}

/// Attaches handlers to one subject as members of one consumer group.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Adds `handler` as one more member of this subscriber's consumer group.
    ///
    /// Calling this several times with the same handler builds a pool of
    /// competing consumers.
    async fn subscribe<H: MessageHandler>(&self, handler: Arc<H>) -> Result<()>;
}
