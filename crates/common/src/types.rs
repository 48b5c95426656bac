use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation key of one checkout attempt.
///
/// Opaque on the wire: any string a peer sends is accepted as-is. Locally
/// generated IDs are random UUIDs, so an ID is never reused across checkouts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(String);

impl PurchaseId {
    /// Generates a fresh, never-reused purchase ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing purchase ID received from a peer.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the purchase ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PurchaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PurchaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PurchaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Integer keys owned by other services (tours, users, carts). They travel as
// bare integers so the wire format stays compatible with every peer.
macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw integer key.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw integer key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id!(
    /// Identifier of a tour (owned by the tours service).
    TourId
);
integer_id!(
    /// Identifier of a buyer.
    TouristId
);
integer_id!(
    /// Identifier of a shopping cart.
    CartId
);
