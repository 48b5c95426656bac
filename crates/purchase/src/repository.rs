//! Storage contracts for tokens and carts.

use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, TourId, TouristId};

use crate::error::Result;
use crate::models::{AddToCart, NewPurchaseToken, OrderItem, ShoppingCart, TourPurchaseToken};

/// Stores purchase tokens. Tokens are never deleted.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn create_token(&self, token: NewPurchaseToken) -> Result<TourPurchaseToken>;

    /// Every token of a tourist, newest first.
    async fn tokens_for_tourist(&self, tourist_id: TouristId) -> Result<Vec<TourPurchaseToken>>;

    async fn token_by_value(&self, token: &str) -> Result<Option<TourPurchaseToken>>;

    /// Returns true if `token` exists and was issued for `tour_id`.
    async fn validate_token(&self, token: &str, tour_id: TourId) -> Result<bool>;

    /// Returns true if the tourist holds at least one token for the tour.
    async fn is_purchased(&self, tourist_id: TouristId, tour_id: TourId) -> Result<bool>;
}

/// Stores one cart per tourist and its line items.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Returns the tourist's cart, creating an empty one on first use.
    async fn cart_for_tourist(&self, tourist_id: TouristId) -> Result<ShoppingCart>;

    /// Adds a tour to the tourist's cart. A tour can appear only once.
    async fn add_item(&self, tourist_id: TouristId, request: AddToCart) -> Result<OrderItem>;

    /// Removes a line item from the tourist's cart.
    async fn remove_item(&self, tourist_id: TouristId, item_id: i64) -> Result<()>;

    /// Deletes every line item of the cart. Clearing an empty or unknown
    /// cart succeeds.
    async fn clear_cart(&self, cart_id: CartId) -> Result<()>;
}

#[async_trait]
impl<R: TokenRepository + ?Sized> TokenRepository for Arc<R> {
    async fn create_token(&self, token: NewPurchaseToken) -> Result<TourPurchaseToken> {
        (**self).create_token(token).await
    }

    async fn tokens_for_tourist(&self, tourist_id: TouristId) -> Result<Vec<TourPurchaseToken>> {
        (**self).tokens_for_tourist(tourist_id).await
    }

    async fn token_by_value(&self, token: &str) -> Result<Option<TourPurchaseToken>> {
        (**self).token_by_value(token).await
    }

    async fn validate_token(&self, token: &str, tour_id: TourId) -> Result<bool> {
        (**self).validate_token(token, tour_id).await
    }

    async fn is_purchased(&self, tourist_id: TouristId, tour_id: TourId) -> Result<bool> {
        (**self).is_purchased(tourist_id, tour_id).await
    }
}

#[async_trait]
impl<R: CartRepository + ?Sized> CartRepository for Arc<R> {
    async fn cart_for_tourist(&self, tourist_id: TouristId) -> Result<ShoppingCart> {
        (**self).cart_for_tourist(tourist_id).await
    }

    async fn add_item(&self, tourist_id: TouristId, request: AddToCart) -> Result<OrderItem> {
        (**self).add_item(tourist_id, request).await
    }

    async fn remove_item(&self, tourist_id: TouristId, item_id: i64) -> Result<()> {
        (**self).remove_item(tourist_id, item_id).await
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        (**self).clear_cart(cart_id).await
    }
}
