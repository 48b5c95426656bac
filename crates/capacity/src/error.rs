use common::TourId;
use thiserror::Error;

/// Errors returned by capacity stores.
#[derive(Debug, Error)]
pub enum CapacityError {
    /// No capacity row exists for the tour.
    #[error("capacity not found for tour {0}")]
    CapacityNotFound(TourId),

    /// The tour does not have enough available seats for the request.
    #[error("not enough seats for tour {tour_id}: requested {requested}, available {available}")]
    NotEnoughSeats {
        tour_id: TourId,
        requested: i64,
        available: i64,
    },

    /// Capacity must be zero or more and fit the store's range.
    #[error("invalid capacity {0}")]
    InvalidCapacity(i64),

    /// Consume and release quantities must be positive.
    #[error("invalid quantity {0}, must be greater than zero")]
    InvalidQuantity(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CapacityError {
    /// Returns true for the errors a reservation treats as "seats unavailable".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CapacityError::CapacityNotFound(_) | CapacityError::NotEnoughSeats { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CapacityError>;
