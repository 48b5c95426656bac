use common::{TourId, TouristId};
use saga::SagaError;
use thiserror::Error;

/// Errors from carts, tokens and checkout.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// Checkout was requested with no cart or no items in it.
    #[error("shopping cart is empty for tourist {0}")]
    EmptyCart(TouristId),

    /// The tour is already a line item of the cart.
    #[error("tour {0} already exists in cart")]
    TourAlreadyInCart(TourId),

    /// No line item with this id in the tourist's cart.
    #[error("cart item {0} not found")]
    ItemNotFound(i64),

    #[error("invalid cart item: {0}")]
    InvalidItem(String),

    /// A storage backend rejected the operation.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("saga error: {0}")]
    Saga(#[from] SagaError),
}

pub type Result<T> = std::result::Result<T, PurchaseError>;
