//! HTTP route handlers.

pub mod capacity;
pub mod cart;
pub mod checkout;
pub mod system;
pub mod tourist;
