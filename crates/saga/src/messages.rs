//! Command and reply envelopes exchanged by the purchase saga.
//!
//! `type` travels as the enum ordinal, so the numeric value of every variant
//! is part of the wire contract. New variants must be appended, never
//! inserted.

use std::collections::BTreeMap;

use common::{CartId, PurchaseId, TourId, TouristId};
use serde::{Deserialize, Serialize};

/// One purchased line: a tour and how many seats of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub tour_id: TourId,
    pub quantity: i64,
}

impl PurchaseItem {
    /// Creates a purchase line.
    pub fn new(tour_id: TourId, quantity: i64) -> Self {
        Self { tour_id, quantity }
    }
}

/// One checkout attempt, carried unchanged through every command and reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub purchase_id: PurchaseId,
    pub cart_id: CartId,
    pub tourist_id: TouristId,
    pub items: Vec<PurchaseItem>,
}

impl Purchase {
    /// Creates a purchase for a cart's line items.
    pub fn new(
        purchase_id: PurchaseId,
        cart_id: CartId,
        tourist_id: TouristId,
        items: Vec<PurchaseItem>,
    ) -> Self {
        Self {
            purchase_id,
            cart_id,
            tourist_id,
            items,
        }
    }

    /// Sums quantities per tour; a purchase may list the same tour twice.
    ///
    /// Sums saturate at `i64::MAX`, which no store can satisfy.
    pub fn quantities_by_tour(&self) -> BTreeMap<TourId, i64> {
        let mut folded = BTreeMap::new();
        for item in &self.items {
            let total = folded.entry(item.tour_id).or_insert(0i64);
            *total = total.saturating_add(item.quantity);
        }
        folded
    }
}

/// Instructions sent by the orchestrator to the participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum CommandType {
    ReserveCapacity,
    ReleaseCapacity,
    IssueTokens,
    CompletePurchase,
    AbortPurchase,
    /// "Send nothing." Never published.
    UnknownCommand,
}

impl CommandType {
    /// Returns the command name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::ReserveCapacity => "ReserveCapacity",
            CommandType::ReleaseCapacity => "ReleaseCapacity",
            CommandType::IssueTokens => "IssueTokens",
            CommandType::CompletePurchase => "CompletePurchase",
            CommandType::AbortPurchase => "AbortPurchase",
            CommandType::UnknownCommand => "UnknownCommand",
        }
    }
}

impl From<CommandType> for i64 {
    fn from(kind: CommandType) -> Self {
        match kind {
            CommandType::ReserveCapacity => 0,
            CommandType::ReleaseCapacity => 1,
            CommandType::IssueTokens => 2,
            CommandType::CompletePurchase => 3,
            CommandType::AbortPurchase => 4,
            CommandType::UnknownCommand => 5,
        }
    }
}

impl From<i64> for CommandType {
    fn from(code: i64) -> Self {
        match code {
            0 => CommandType::ReserveCapacity,
            1 => CommandType::ReleaseCapacity,
            2 => CommandType::IssueTokens,
            3 => CommandType::CompletePurchase,
            4 => CommandType::AbortPurchase,
            _ => CommandType::UnknownCommand,
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcomes reported by the participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum ReplyType {
    CapacityReserved,
    CapacityNotReserved,
    CapacityReleased,
    CapacityReleaseFailed,
    TokensIssued,
    TokensNotIssued,
    PurchaseCompleted,
    PurchaseAborted,
    /// "Not mine." Handlers never publish it.
    UnknownReply,
}

impl ReplyType {
    /// Returns the reply name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyType::CapacityReserved => "CapacityReserved",
            ReplyType::CapacityNotReserved => "CapacityNotReserved",
            ReplyType::CapacityReleased => "CapacityReleased",
            ReplyType::CapacityReleaseFailed => "CapacityReleaseFailed",
            ReplyType::TokensIssued => "TokensIssued",
            ReplyType::TokensNotIssued => "TokensNotIssued",
            ReplyType::PurchaseCompleted => "PurchaseCompleted",
            ReplyType::PurchaseAborted => "PurchaseAborted",
            ReplyType::UnknownReply => "UnknownReply",
        }
    }
}

impl From<ReplyType> for i64 {
    fn from(kind: ReplyType) -> Self {
        match kind {
            ReplyType::CapacityReserved => 0,
            ReplyType::CapacityNotReserved => 1,
            ReplyType::CapacityReleased => 2,
            ReplyType::CapacityReleaseFailed => 3,
            ReplyType::TokensIssued => 4,
            ReplyType::TokensNotIssued => 5,
            ReplyType::PurchaseCompleted => 6,
            ReplyType::PurchaseAborted => 7,
            ReplyType::UnknownReply => 8,
        }
    }
}

impl From<i64> for ReplyType {
    fn from(code: i64) -> Self {
        match code {
            0 => ReplyType::CapacityReserved,
            1 => ReplyType::CapacityNotReserved,
            2 => ReplyType::CapacityReleased,
            3 => ReplyType::CapacityReleaseFailed,
            4 => ReplyType::TokensIssued,
            5 => ReplyType::TokensNotIssued,
            6 => ReplyType::PurchaseCompleted,
            7 => ReplyType::PurchaseAborted,
            _ => ReplyType::UnknownReply,
        }
    }
}

impl std::fmt::Display for ReplyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A command addressed to whichever participant owns its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub purchase: Purchase,
    #[serde(rename = "type")]
    pub kind: CommandType,
}

impl Command {
    /// Creates a command carrying `purchase`.
    pub fn new(kind: CommandType, purchase: Purchase) -> Self {
        Self { purchase, kind }
    }
}

/// A participant's answer to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub purchase: Purchase,
    #[serde(rename = "type")]
    pub kind: ReplyType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_tour_ids: Vec<TourId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    /// Creates a reply for `purchase` with no failure details.
    pub fn new(kind: ReplyType, purchase: Purchase) -> Self {
        Self {
            purchase,
            kind,
            failed_tour_ids: Vec::new(),
            message: None,
        }
    }

    /// Attaches a human-readable failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches the tours that caused the failure.
    pub fn with_failed_tours(mut self, tour_ids: impl IntoIterator<Item = TourId>) -> Self {
        self.failed_tour_ids = tour_ids.into_iter().collect();
        self
    }
}
