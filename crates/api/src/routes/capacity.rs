//! Administrative capacity endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use capacity::TourCapacity;
use common::TourId;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SetCapacityRequest {
    pub capacity: i64,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub qty: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityResponse {
    pub tour_id: TourId,
    pub capacity: i64,
    pub available_seats: i64,
}

impl From<TourCapacity> for CapacityResponse {
    fn from(row: TourCapacity) -> Self {
        Self {
            tour_id: row.tour_id,
            capacity: row.capacity,
            available_seats: row.available_seats,
        }
    }
}

/// GET /capacity/{tour_id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<i64>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let row = state.capacity.get(TourId::new(tour_id)).await?;
    Ok(Json(row.into()))
}

/// PUT /capacity/{tour_id} — create or resize a tour's capacity.
#[tracing::instrument(skip(state, req))]
pub async fn set(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<i64>,
    Json(req): Json<SetCapacityRequest>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let row = state
        .capacity
        .init_or_update(TourId::new(tour_id), req.capacity)
        .await?;
    Ok(Json(row.into()))
}

/// POST /capacity/{tour_id}/consume
#[tracing::instrument(skip(state, req))]
pub async fn consume(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<i64>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let row = state.capacity.consume(TourId::new(tour_id), req.qty).await?;
    Ok(Json(row.into()))
}

/// POST /capacity/{tour_id}/release
#[tracing::instrument(skip(state, req))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    Path(tour_id): Path<i64>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let row = state.capacity.release(TourId::new(tour_id), req.qty).await?;
    Ok(Json(row.into()))
}
