//! Checkout and purchase lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{PurchaseId, TourId, TouristId};
use purchase::PurchaseHistory;
use serde::{Deserialize, Serialize};

use super::tourist::Tourist;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub message: String,
    pub purchase_id: PurchaseId,
}

#[derive(Deserialize)]
pub struct ValidateTokenParams {
    pub tour_id: Option<String>,
    pub token: Option<String>,
}

#[derive(Serialize)]
pub struct TokenValidity {
    pub valid: bool,
    pub tour_id: TourId,
    pub tourist_id: TouristId,
}

#[derive(Serialize)]
pub struct PurchaseStatus {
    pub purchased: bool,
    pub tour_id: TourId,
    pub tourist_id: TouristId,
}

/// POST /checkout — starts the purchase saga and returns without waiting
/// for its outcome.
#[tracing::instrument(skip(state))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let purchase_id = state.checkout.checkout(tourist_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CheckoutResponse {
            message: "Checkout process has been initiated.".to_string(),
            purchase_id,
        }),
    ))
}

/// GET /purchases
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
) -> Result<Json<PurchaseHistory>, ApiError> {
    Ok(Json(state.checkout.purchase_history(tourist_id).await?))
}

/// GET /validate-token?tour_id=&token=
#[tracing::instrument(skip(state, params))]
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
    Query(params): Query<ValidateTokenParams>,
) -> Result<Json<TokenValidity>, ApiError> {
    let (Some(tour_id), Some(token)) = (params.tour_id, params.token) else {
        return Err(ApiError::BadRequest(
            "Missing tour_id or token parameter".to_string(),
        ));
    };
    if token.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing tour_id or token parameter".to_string(),
        ));
    }
    let tour_id = parse_tour_id(&tour_id)?;

    let valid = state.checkout.validate_token(&token, tour_id).await?;
    Ok(Json(TokenValidity {
        valid,
        tour_id,
        tourist_id,
    }))
}

/// GET /check-is-purchased/{tour_id}
#[tracing::instrument(skip(state))]
pub async fn is_purchased(
    State(state): State<Arc<AppState>>,
    Tourist(tourist_id): Tourist,
    Path(tour_id): Path<String>,
) -> Result<Json<PurchaseStatus>, ApiError> {
    let tour_id = parse_tour_id(&tour_id)?;
    let purchased = state.checkout.is_purchased(tourist_id, tour_id).await?;
    Ok(Json(PurchaseStatus {
        purchased,
        tour_id,
        tourist_id,
    }))
}

fn parse_tour_id(raw: &str) -> Result<TourId, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map(TourId::new)
        .map_err(|_| ApiError::BadRequest(format!("Invalid tour_id: {raw}")))
}
