//! Saga error types.

use messaging::BusError;
use thiserror::Error;

/// Errors that can occur while driving a saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A purchase with no line items cannot start a saga.
    #[error("Purchase {0} has no items")]
    EmptyPurchase(String),

    /// The next command could not be handed to the transport.
    #[error("Message bus error: {0}")]
    Bus(#[from] BusError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
