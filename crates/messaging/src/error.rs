use thiserror::Error;

/// Errors raised by the message transport.
#[derive(Debug, Error)]
pub enum BusError {
    /// A message could not be serialized for the wire.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload received from the wire is not a valid message.
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// The broker refused or lost a published message.
    #[error("Publish to '{subject}' failed: {reason}")]
    Publish { subject: String, reason: String },

    /// A subscription could not be established.
    #[error("Subscribe to '{subject}' failed: {reason}")]
    Subscribe { subject: String, reason: String },

    /// The broker connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, BusError>;
