//! Cart and token records.

use chrono::{DateTime, Utc};
use common::{CartId, TourId, TouristId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PurchaseError, Result};

/// Proof that a tourist owns one seat on a tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourPurchaseToken {
    pub id: i64,
    pub tourist_id: TouristId,
    pub tour_id: TourId,
    pub token: String,
    pub purchased_at: DateTime<Utc>,
}

/// A token that has been minted but not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseToken {
    pub tourist_id: TouristId,
    pub tour_id: TourId,
    pub token: String,
}

impl NewPurchaseToken {
    /// Mints a token with a fresh random value.
    pub fn mint(tourist_id: TouristId, tour_id: TourId) -> Self {
        Self {
            tourist_id,
            tour_id,
            token: Uuid::new_v4().to_string(),
        }
    }
}

/// One tour in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub cart_id: CartId,
    pub tour_id: TourId,
    pub tour_name: String,
    pub price: f64,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

/// Request to put a tour into a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddToCart {
    pub tour_id: TourId,
    #[serde(default)]
    pub tour_name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

impl AddToCart {
    pub fn new(tour_id: TourId, quantity: i64) -> Self {
        Self {
            tour_id,
            tour_name: String::new(),
            price: 0.0,
            quantity,
        }
    }

    pub fn with_name(mut self, tour_name: impl Into<String>) -> Self {
        self.tour_name = tour_name.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Rejects quantities below one and negative or non-finite prices.
    pub fn validate(&self) -> Result<()> {
        if self.quantity < 1 {
            return Err(PurchaseError::InvalidItem(format!(
                "quantity must be at least 1, got {}",
                self.quantity
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(PurchaseError::InvalidItem(format!(
                "price must be zero or more, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// A tourist's cart with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub id: CartId,
    pub tourist_id: TouristId,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShoppingCart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of price times quantity over every line item.
    pub fn total_price(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum()
    }
}

/// Every token a tourist holds, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseHistory {
    pub tourist_id: TouristId,
    pub purchases: Vec<TourPurchaseToken>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: i64) -> OrderItem {
        OrderItem {
            id: 1,
            cart_id: CartId::new(1),
            tour_id: TourId::new(1),
            tour_name: "Old Town".to_string(),
            price,
            quantity,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_minted_tokens_are_unique() {
        let a = NewPurchaseToken::mint(TouristId::new(1), TourId::new(2));
        let b = NewPurchaseToken::mint(TouristId::new(1), TourId::new(2));
        assert_ne!(a.token, b.token);
        assert!(Uuid::parse_str(&a.token).is_ok());
    }

    #[test]
    fn test_total_price() {
        let cart = ShoppingCart {
            id: CartId::new(1),
            tourist_id: TouristId::new(1),
            items: vec![item(10.0, 2), item(5.5, 1)],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(cart.total_price(), 25.5);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_add_to_cart_validation() {
        assert!(AddToCart::new(TourId::new(1), 1).validate().is_ok());
        assert!(AddToCart::new(TourId::new(1), 0).validate().is_err());
        assert!(
            AddToCart::new(TourId::new(1), 1)
                .with_price(-1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_add_to_cart_defaults() {
        let request: AddToCart = serde_json::from_str(r#"{"tour_id": 4}"#).unwrap();
        assert_eq!(request.tour_id, TourId::new(4));
        assert_eq!(request.quantity, 1);
        assert_eq!(request.tour_name, "");
    }
}
