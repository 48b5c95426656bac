//! In-memory token and cart repositories.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, TourId, TouristId};

use crate::error::{PurchaseError, Result};
use crate::models::{AddToCart, NewPurchaseToken, OrderItem, ShoppingCart, TourPurchaseToken};
use crate::repository::{CartRepository, TokenRepository};

#[derive(Debug, Default)]
struct InMemoryTokenState {
    tokens: Vec<TourPurchaseToken>,
    next_id: i64,
    /// Number of creates to allow before failing; `None` never fails.
    fail_after: Option<usize>,
}

/// In-memory token repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenRepository {
    state: Arc<RwLock<InMemoryTokenState>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create_token` call fail while set.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_after = fail.then_some(0);
    }

    /// Lets `successes` more tokens through, then fails every create.
    pub fn fail_after(&self, successes: usize) {
        self.state.write().unwrap().fail_after = Some(successes);
    }

    /// Returns the number of stored tokens.
    pub fn token_count(&self) -> usize {
        self.state.read().unwrap().tokens.len()
    }

    /// Returns a copy of every stored token in insertion order.
    pub fn tokens(&self) -> Vec<TourPurchaseToken> {
        self.state.read().unwrap().tokens.clone()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn create_token(&self, token: NewPurchaseToken) -> Result<TourPurchaseToken> {
        let mut state = self.state.write().unwrap();

        match state.fail_after {
            Some(0) => {
                return Err(PurchaseError::Storage(
                    "token storage unavailable".to_string(),
                ));
            }
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }

        if state.tokens.iter().any(|t| t.token == token.token) {
            return Err(PurchaseError::Storage(format!(
                "duplicate token {}",
                token.token
            )));
        }

        state.next_id += 1;
        let stored = TourPurchaseToken {
            id: state.next_id,
            tourist_id: token.tourist_id,
            tour_id: token.tour_id,
            token: token.token,
            purchased_at: Utc::now(),
        };
        state.tokens.push(stored.clone());
        Ok(stored)
    }

    async fn tokens_for_tourist(&self, tourist_id: TouristId) -> Result<Vec<TourPurchaseToken>> {
        let state = self.state.read().unwrap();
        // Later inserts are newer; ids break timestamp ties.
        let mut tokens: Vec<_> = state
            .tokens
            .iter()
            .filter(|t| t.tourist_id == tourist_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| (b.purchased_at, b.id).cmp(&(a.purchased_at, a.id)));
        Ok(tokens)
    }

    async fn token_by_value(&self, token: &str) -> Result<Option<TourPurchaseToken>> {
        let state = self.state.read().unwrap();
        Ok(state.tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn validate_token(&self, token: &str, tour_id: TourId) -> Result<bool> {
        let state = self.state.read().unwrap();
        Ok(state
            .tokens
            .iter()
            .any(|t| t.token == token && t.tour_id == tour_id))
    }

    async fn is_purchased(&self, tourist_id: TouristId, tour_id: TourId) -> Result<bool> {
        let state = self.state.read().unwrap();
        Ok(state
            .tokens
            .iter()
            .any(|t| t.tourist_id == tourist_id && t.tour_id == tour_id))
    }
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<CartId, ShoppingCart>,
    by_tourist: HashMap<TouristId, CartId>,
    next_cart_id: i64,
    next_item_id: i64,
    fail_on_clear: bool,
}

impl InMemoryCartState {
    fn cart_mut(&mut self, tourist_id: TouristId) -> &mut ShoppingCart {
        let next_cart_id = &mut self.next_cart_id;
        let cart_id = *self.by_tourist.entry(tourist_id).or_insert_with(|| {
            *next_cart_id += 1;
            CartId::new(*next_cart_id)
        });
        self.carts.entry(cart_id).or_insert_with(|| {
            let now = Utc::now();
            ShoppingCart {
                id: cart_id,
                tourist_id,
                items: Vec::new(),
                created_at: now,
                updated_at: now,
            }
        })
    }
}

/// In-memory cart repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartRepository {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `clear_cart` to fail.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Returns the number of items in a cart, zero for unknown carts.
    pub fn item_count(&self, cart_id: CartId) -> usize {
        self.state
            .read()
            .unwrap()
            .carts
            .get(&cart_id)
            .map_or(0, |cart| cart.items.len())
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn cart_for_tourist(&self, tourist_id: TouristId) -> Result<ShoppingCart> {
        let mut state = self.state.write().unwrap();
        Ok(state.cart_mut(tourist_id).clone())
    }

    async fn add_item(&self, tourist_id: TouristId, request: AddToCart) -> Result<OrderItem> {
        request.validate()?;
        let mut state = self.state.write().unwrap();
        state.next_item_id += 1;
        let item_id = state.next_item_id;

        let cart = state.cart_mut(tourist_id);
        if cart.items.iter().any(|i| i.tour_id == request.tour_id) {
            return Err(PurchaseError::TourAlreadyInCart(request.tour_id));
        }

        let item = OrderItem {
            id: item_id,
            cart_id: cart.id,
            tour_id: request.tour_id,
            tour_name: request.tour_name,
            price: request.price,
            quantity: request.quantity,
            added_at: Utc::now(),
        };
        cart.items.push(item.clone());
        cart.updated_at = item.added_at;
        Ok(item)
    }

    async fn remove_item(&self, tourist_id: TouristId, item_id: i64) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let cart = state.cart_mut(tourist_id);

        let before = cart.items.len();
        cart.items.retain(|item| item.id != item_id);
        if cart.items.len() == before {
            return Err(PurchaseError::ItemNotFound(item_id));
        }
        cart.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_clear {
            return Err(PurchaseError::Storage("cart storage unavailable".to_string()));
        }
        if let Some(cart) = state.carts.get_mut(&cart_id) {
            cart.items.clear();
            cart.updated_at = Utc::now();
        }
        Ok(())
    }
}
