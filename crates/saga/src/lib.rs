//! Tour purchase saga.
//!
//! A checkout reserves seats in the tours service, issues purchase tokens in
//! the purchase service and clears the cart. The steps live in different
//! services, so they are coordinated with commands and replies instead of a
//! local transaction:
//!
//! 1. `ReserveCapacity` → `CapacityReserved` / `CapacityNotReserved`
//! 2. `IssueTokens` → `TokensIssued` / `TokensNotIssued`
//! 3. `CompletePurchase` → `PurchaseCompleted`
//!
//! A failed token issue is compensated with `ReleaseCapacity`; every failure
//! path ends in `AbortPurchase`.

pub mod error;
pub mod messages;
pub mod orchestrator;
pub mod outcome;

pub use error::SagaError;
pub use messages::{Command, CommandType, Purchase, PurchaseItem, Reply, ReplyType};
pub use orchestrator::{PurchaseOrchestrator, Transition, next_command};
pub use outcome::SagaOutcome;
