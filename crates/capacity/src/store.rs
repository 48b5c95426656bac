//! Capacity store contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TourId;
use serde::{Deserialize, Serialize};

use crate::error::{CapacityError, Result};

/// Seat counters for one tour.
///
/// `0 <= available_seats <= capacity` holds for every value a store returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourCapacity {
    pub tour_id: TourId,
    pub capacity: i64,
    pub available_seats: i64,
    pub updated_at: DateTime<Utc>,
}

impl TourCapacity {
    /// Seats currently held by reservations.
    pub fn reserved_seats(&self) -> i64 {
        self.capacity - self.available_seats
    }
}

/// Storage for per-tour seat counters.
///
/// `consume` and `release` must each be a single atomic conditional update:
/// they are the only thing standing between concurrent purchases and an
/// oversold tour.
#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Creates the row with every seat available, or sets a new capacity on an
    /// existing row, clamping available seats down to it.
    async fn init_or_update(&self, tour_id: TourId, capacity: i64) -> Result<TourCapacity>;

    /// Takes `qty` seats if at least that many are available.
    async fn consume(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity>;

    /// Gives back `qty` seats, never going above capacity.
    async fn release(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity>;

    /// Reads the current counters.
    async fn get(&self, tour_id: TourId) -> Result<TourCapacity>;
}

#[async_trait]
impl<S: CapacityStore + ?Sized> CapacityStore for Arc<S> {
    async fn init_or_update(&self, tour_id: TourId, capacity: i64) -> Result<TourCapacity> {
        (**self).init_or_update(tour_id, capacity).await
    }

    async fn consume(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity> {
        (**self).consume(tour_id, qty).await
    }

    async fn release(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity> {
        (**self).release(tour_id, qty).await
    }

    async fn get(&self, tour_id: TourId) -> Result<TourCapacity> {
        (**self).get(tour_id).await
    }
}

pub(crate) fn validate_capacity(capacity: i64) -> Result<()> {
    if capacity < 0 {
        return Err(CapacityError::InvalidCapacity(capacity));
    }
    Ok(())
}

pub(crate) fn validate_quantity(qty: i64) -> Result<()> {
    if qty <= 0 {
        return Err(CapacityError::InvalidQuantity(qty));
    }
    Ok(())
}
