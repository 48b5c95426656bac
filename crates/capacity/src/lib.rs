//! Tour seat capacity.
//!
//! Holds the per-tour seat counters and the saga participant that reserves
//! and releases seats on behalf of purchases.

pub mod error;
pub mod handler;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{CapacityError, Result};
pub use handler::CapacityCommandHandler;
pub use memory::InMemoryCapacityStore;
pub use postgres::PostgresCapacityStore;
pub use store::{CapacityStore, TourCapacity};
