//! Message transport for the purchase saga.
//!
//! The saga only relies on an at-least-once publish/subscribe contract with
//! named subjects and consumer groups:
//! - every consumer group subscribed to a subject sees every message
//! - within a group, each message is handled by exactly one member
//!
//! [`InMemoryBroker`] implements that contract inside one process. With the
//! `nats` feature, `NatsBroker` maps it onto NATS queue groups.

pub mod bus;
pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;
pub mod recording;

pub use bus::{MessageHandler, Publisher, Subscriber};
pub use config::SagaSubjects;
pub use error::{BusError, Result};
pub use memory::{InMemoryBroker, InMemoryPublisher, InMemorySubscriber};
#[cfg(feature = "nats")]
pub use nats::{NatsBroker, NatsPublisher, NatsSubscriber};
pub use recording::RecordingPublisher;
