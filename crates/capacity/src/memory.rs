//! In-memory capacity store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TourId;

use crate::error::{CapacityError, Result};
use crate::store::{CapacityStore, TourCapacity, validate_capacity, validate_quantity};

/// Largest capacity a packed counter can hold.
pub const MAX_CAPACITY: i64 = u32::MAX as i64;

/// Capacity (high half) and available seats (low half) in one word, so every
/// mutation is a single compare-and-swap over both values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seats {
    capacity: u32,
    available: u32,
}

impl Seats {
    fn pack(self) -> u64 {
        (u64::from(self.capacity) << 32) | u64::from(self.available)
    }

    fn unpack(word: u64) -> Self {
        Self {
            capacity: (word >> 32) as u32,
            available: word as u32,
        }
    }
}

#[derive(Debug)]
struct CapacityCell {
    seats: AtomicU64,
    updated_at_ms: AtomicI64,
}

impl CapacityCell {
    fn new(capacity: u32) -> Self {
        let seats = Seats {
            capacity,
            available: capacity,
        };
        Self {
            seats: AtomicU64::new(seats.pack()),
            updated_at_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Applies `f` atomically; `f` returning `None` leaves the cell untouched.
    fn update(
        &self,
        mut f: impl FnMut(Seats) -> Option<Seats>,
    ) -> std::result::Result<Seats, Seats> {
        let result = self
            .seats
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                f(Seats::unpack(word)).map(Seats::pack)
            })
            .map(Seats::unpack)
            .map_err(Seats::unpack);

        if result.is_ok() {
            self.updated_at_ms
                .store(Utc::now().timestamp_millis(), Ordering::Release);
        }
        result
    }

    fn snapshot(&self, tour_id: TourId) -> TourCapacity {
        let seats = Seats::unpack(self.seats.load(Ordering::Acquire));
        self.row(tour_id, seats)
    }

    fn row(&self, tour_id: TourId, seats: Seats) -> TourCapacity {
        let millis = self.updated_at_ms.load(Ordering::Acquire);
        TourCapacity {
            tour_id,
            capacity: i64::from(seats.capacity),
            available_seats: i64::from(seats.available),
            updated_at: DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now),
        }
    }
}

/// Lock-free in-memory capacity store.
///
/// The tour map is only written when a tour is first initialised; seat
/// counters are then changed by compare-and-swap alone, so concurrent
/// `consume` calls on the same tour can never oversell it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCapacityStore {
    tours: Arc<RwLock<HashMap<TourId, Arc<CapacityCell>>>>,
}

impl InMemoryCapacityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tours with a capacity row.
    pub fn tour_count(&self) -> usize {
        self.tours.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn cell(&self, tour_id: TourId) -> Result<Arc<CapacityCell>> {
        self.tours
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tour_id)
            .cloned()
            .ok_or(CapacityError::CapacityNotFound(tour_id))
    }
}

#[async_trait]
impl CapacityStore for InMemoryCapacityStore {
    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn init_or_update(&self, tour_id: TourId, capacity: i64) -> Result<TourCapacity> {
        validate_capacity(capacity)?;
        let capacity =
            u32::try_from(capacity).map_err(|_| CapacityError::InvalidCapacity(capacity))?;

        let cell = {
            let mut tours = self.tours.write().unwrap_or_else(|e| e.into_inner());
            match tours.get(&tour_id) {
                Some(existing) => existing.clone(),
                None => {
                    let created = Arc::new(CapacityCell::new(capacity));
                    tours.insert(tour_id, created.clone());
                    return Ok(created.snapshot(tour_id));
                }
            }
        };

        let updated = cell
            .update(|seats| {
                Some(Seats {
                    capacity,
                    available: seats.available.min(capacity),
                })
            })
            .unwrap_or_else(|seats| seats);
        Ok(cell.row(tour_id, updated))
    }

    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn consume(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity> {
        validate_quantity(qty)?;
        let cell = self.cell(tour_id)?;

        let result = cell.update(|seats| {
            let available = i64::from(seats.available);
            if available < qty {
                return None;
            }
            Some(Seats {
                capacity: seats.capacity,
                available: (available - qty) as u32,
            })
        });

        match result {
            Ok(seats) => Ok(cell.row(tour_id, seats)),
            Err(seats) => Err(CapacityError::NotEnoughSeats {
                tour_id,
                requested: qty,
                available: i64::from(seats.available),
            }),
        }
    }

    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn release(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity> {
        validate_quantity(qty)?;
        let cell = self.cell(tour_id)?;

        let updated = cell
            .update(|seats| {
                let restored = i64::from(seats.available)
                    .saturating_add(qty)
                    .min(i64::from(seats.capacity));
                Some(Seats {
                    capacity: seats.capacity,
                    available: restored as u32,
                })
            })
            .unwrap_or_else(|seats| seats);
        Ok(cell.row(tour_id, updated))
    }

    async fn get(&self, tour_id: TourId) -> Result<TourCapacity> {
        Ok(self.cell(tour_id)?.snapshot(tour_id))
    }
}
