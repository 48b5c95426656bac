//! Checkout entrypoint and purchase queries.

use std::sync::Arc;

use common::{PurchaseId, TourId, TouristId};
use saga::{Purchase, PurchaseItem, PurchaseOrchestrator};

use crate::error::{PurchaseError, Result};
use crate::models::{AddToCart, OrderItem, PurchaseHistory, ShoppingCart};
use crate::repository::{CartRepository, TokenRepository};

/// Buyer-facing operations: cart management, checkout and token lookups.
pub struct CheckoutService<T, C> {
    tokens: T,
    carts: C,
    orchestrator: Arc<PurchaseOrchestrator>,
}

impl<T: TokenRepository, C: CartRepository> CheckoutService<T, C> {
    pub fn new(tokens: T, carts: C, orchestrator: Arc<PurchaseOrchestrator>) -> Self {
        Self {
            tokens,
            carts,
            orchestrator,
        }
    }

    pub async fn cart(&self, tourist_id: TouristId) -> Result<ShoppingCart> {
        self.carts.cart_for_tourist(tourist_id).await
    }

    pub async fn add_to_cart(&self, tourist_id: TouristId, request: AddToCart) -> Result<OrderItem> {
        self.carts.add_item(tourist_id, request).await
    }

    pub async fn remove_from_cart(&self, tourist_id: TouristId, item_id: i64) -> Result<()> {
        self.carts.remove_item(tourist_id, item_id).await
    }

    /// Starts a purchase saga for the tourist's cart.
    ///
    /// Returns as soon as the first command is published; the outcome shows
    /// up later in the purchase history and capacity levels.
    #[tracing::instrument(skip(self), fields(tourist_id = %tourist_id))]
    pub async fn checkout(&self, tourist_id: TouristId) -> Result<PurchaseId> {
        let cart = self.carts.cart_for_tourist(tourist_id).await?;
        if cart.is_empty() {
            return Err(PurchaseError::EmptyCart(tourist_id));
        }

        let purchase_id = PurchaseId::generate();
        let items = cart
            .items
            .iter()
            .map(|item| PurchaseItem::new(item.tour_id, item.quantity))
            .collect();
        let purchase = Purchase::new(purchase_id.clone(), cart.id, tourist_id, items);

        self.orchestrator.start(purchase).await?;
        tracing::info!(%purchase_id, "checkout initiated");
        Ok(purchase_id)
    }

    pub async fn purchase_history(&self, tourist_id: TouristId) -> Result<PurchaseHistory> {
        Ok(PurchaseHistory {
            tourist_id,
            purchases: self.tokens.tokens_for_tourist(tourist_id).await?,
        })
    }

    pub async fn validate_token(&self, token: &str, tour_id: TourId) -> Result<bool> {
        self.tokens.validate_token(token, tour_id).await
    }

    pub async fn is_purchased(&self, tourist_id: TouristId, tour_id: TourId) -> Result<bool> {
        self.tokens.is_purchased(tourist_id, tour_id).await
    }
}
