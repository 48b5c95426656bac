//! Where a saga stands after a given reply.

use serde::{Deserialize, Serialize};

/// The saga's position, inferred from the reply just received.
///
/// ```text
/// CapacityReserved ─► TokensIssued ─► PurchaseCompleted      (Completed)
///        │                 │
///        │                 └─► TokensNotIssued ─► CapacityReleased ──┐
///        │                                    └─► CapacityReleaseFailed (Aborting, leaked)
///        └─► CapacityNotReserved ─────────────────────────────────────┴─► (Aborting)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaOutcome {
    /// More steps follow on the happy path or its compensation.
    InProgress,

    /// Heading to abort; `AbortPurchase` is being sent.
    Aborting {
        /// Reserved seats could not be released and stay unavailable.
        capacity_leaked: bool,
    },

    /// The purchase finished successfully (terminal).
    Completed,

    /// The purchase was aborted (terminal).
    Aborted,

    /// The reply type is not part of this saga; nothing happens (terminal).
    Unrecognized,
}

impl SagaOutcome {
    /// Returns true if no further command follows.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaOutcome::Completed | SagaOutcome::Aborted | SagaOutcome::Unrecognized
        )
    }

    /// Returns the outcome name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaOutcome::InProgress => "InProgress",
            SagaOutcome::Aborting { .. } => "Aborting",
            SagaOutcome::Completed => "Completed",
            SagaOutcome::Aborted => "Aborted",
            SagaOutcome::Unrecognized => "Unrecognized",
        }
    }
}

impl std::fmt::Display for SagaOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
