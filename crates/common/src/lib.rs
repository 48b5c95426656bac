//! Identifiers shared by every service taking part in a tour purchase.

pub mod types;

pub use types::{CartId, PurchaseId, TourId, TouristId};
