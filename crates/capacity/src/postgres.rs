//! PostgreSQL capacity store.

use async_trait::async_trait;
use common::TourId;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{CapacityError, Result};
use crate::store::{CapacityStore, TourCapacity, validate_capacity, validate_quantity};

/// PostgreSQL-backed capacity store.
///
/// Every mutation is one conditional `UPDATE` (or upsert), so row-level
/// atomicity in the database is the only synchronisation needed.
#[derive(Clone)]
pub struct PostgresCapacityStore {
    pool: PgPool,
}

impl PostgresCapacityStore {
    /// Creates a new PostgreSQL capacity store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_capacity(row: PgRow) -> Result<TourCapacity> {
        Ok(TourCapacity {
            tour_id: TourId::new(row.try_get("tour_id")?),
            capacity: row.try_get("capacity")?,
            available_seats: row.try_get("available_seats")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Reads the row after a conditional update matched nothing, telling a
    /// missing tour apart from a failed condition.
    async fn current(&self, tour_id: TourId) -> Result<TourCapacity> {
        let row = sqlx::query(
            r#"
            SELECT tour_id, capacity, available_seats, updated_at
            FROM tour_capacities
            WHERE tour_id = $1
            "#,
        )
        .bind(tour_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_capacity(row),
            None => Err(CapacityError::CapacityNotFound(tour_id)),
        }
    }
}

#[async_trait]
impl CapacityStore for PostgresCapacityStore {
    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn init_or_update(&self, tour_id: TourId, capacity: i64) -> Result<TourCapacity> {
        validate_capacity(capacity)?;

        let row = sqlx::query(
            r#"
            INSERT INTO tour_capacities (tour_id, capacity, available_seats, updated_at)
            VALUES ($1, $2, $2, NOW())
            ON CONFLICT (tour_id) DO UPDATE
            SET capacity = EXCLUDED.capacity,
                available_seats = LEAST(tour_capacities.available_seats, EXCLUDED.capacity),
                updated_at = NOW()
            RETURNING tour_id, capacity, available_seats, updated_at
            "#,
        )
        .bind(tour_id.as_i64())
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_capacity(row)
    }

    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn consume(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity> {
        validate_quantity(qty)?;

        let row = sqlx::query(
            r#"
            UPDATE tour_capacities
            SET available_seats = available_seats - $2, updated_at = NOW()
            WHERE tour_id = $1 AND available_seats >= $2
            RETURNING tour_id, capacity, available_seats, updated_at
            "#,
        )
        .bind(tour_id.as_i64())
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_capacity(row),
            None => {
                let current = self.current(tour_id).await?;
                Err(CapacityError::NotEnoughSeats {
                    tour_id,
                    requested: qty,
                    available: current.available_seats,
                })
            }
        }
    }

    #[tracing::instrument(skip(self), fields(tour_id = %tour_id))]
    async fn release(&self, tour_id: TourId, qty: i64) -> Result<TourCapacity> {
        validate_quantity(qty)?;

        let row = sqlx::query(
            r#"
            UPDATE tour_capacities
            SET available_seats = LEAST(available_seats + LEAST($2, capacity), capacity),
                updated_at = NOW()
            WHERE tour_id = $1
            RETURNING tour_id, capacity, available_seats, updated_at
            "#,
        )
        .bind(tour_id.as_i64())
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_capacity(row),
            None => Err(CapacityError::CapacityNotFound(tour_id)),
        }
    }

    async fn get(&self, tour_id: TourId) -> Result<TourCapacity> {
        self.current(tour_id).await
    }
}
