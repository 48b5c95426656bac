//! Shopping cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use purchase::{AddToCart, OrderItem, ShoppingCart};
use serde::Serialize;

use super::tourist::Tourist;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: ShoppingCart,
    pub total_price: f64,
}

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.checkout.cart(tourist_id).await?;
    Ok(Json(CartResponse {
        total_price: cart.total_price(),
        cart,
    }))
}

/// POST /cart/items
#[tracing::instrument(skip(state, req))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
    Json(req): Json<AddToCart>,
) -> Result<(StatusCode, Json<OrderItem>), ApiError> {
    let item = state.checkout.add_to_cart(tourist_id, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /cart/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
    Path(item_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.checkout.remove_from_cart(tourist_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
