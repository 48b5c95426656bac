//! Purchase service: carts, purchase tokens, checkout and the purchase side
//! of the tour purchase saga.

pub mod checkout;
pub mod error;
pub mod handler;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use checkout::CheckoutService;
pub use error::{PurchaseError, Result};
pub use handler::PurchaseCommandHandler;
pub use memory::{InMemoryCartRepository, InMemoryTokenRepository};
pub use models::{
    AddToCart, NewPurchaseToken, OrderItem, PurchaseHistory, ShoppingCart, TourPurchaseToken,
};
pub use postgres::{PostgresCartRepository, PostgresTokenRepository, run_migrations};
pub use repository::{CartRepository, TokenRepository};
