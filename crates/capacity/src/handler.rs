//! Capacity side of the purchase saga.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::TourId;
use messaging::{MessageHandler, Publisher};
use saga::{Command, CommandType, Purchase, Reply, ReplyType};

use crate::error::CapacityError;
use crate::store::CapacityStore;

/// A reservation or release that stopped at one tour.
#[derive(Debug)]
struct TourFailure {
    tour_id: TourId,
    message: String,
    /// Missing tour or too few seats, as opposed to a store fault.
    unavailable: bool,
}

impl TourFailure {
    fn new(action: &str, tour_id: TourId, error: CapacityError) -> Self {
        Self {
            tour_id,
            message: format!("{action} failed for tour {tour_id}: {error}"),
            unavailable: error.is_unavailable(),
        }
    }
}

/// Answers `ReserveCapacity` and `ReleaseCapacity` commands.
///
/// Reservations are all-or-nothing across tours: the store only offers
/// single-tour atomicity, so seats taken earlier in a failing attempt are
/// handed back before replying.
pub struct CapacityCommandHandler<S> {
    store: S,
    replies: Arc<dyn Publisher<Reply>>,
}

impl<S: CapacityStore> CapacityCommandHandler<S> {
    pub fn new(store: S, replies: Arc<dyn Publisher<Reply>>) -> Self {
        Self { store, replies }
    }

    /// Runs a command against the store and builds the reply.
    ///
    /// Commands this handler does not own produce `UnknownReply`, which is
    /// never published.
    #[tracing::instrument(skip(self, command), fields(purchase_id = %command.purchase.purchase_id, command = %command.kind))]
    pub async fn process(&self, command: Command) -> Reply {
        let Command { purchase, kind } = command;
        match kind {
            CommandType::ReserveCapacity => self.reserve(purchase).await,
            CommandType::ReleaseCapacity => self.release(purchase).await,
            _ => Reply::new(ReplyType::UnknownReply, purchase),
        }
    }

    async fn reserve(&self, purchase: Purchase) -> Reply {
        let started = Instant::now();
        let result = self.reserve_all(&purchase).await;
        metrics::histogram!("capacity_reserve_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::counter!("capacity_reservations_total", "outcome" => "reserved")
                    .increment(1);
                tracing::info!("capacity reserved");
                Reply::new(ReplyType::CapacityReserved, purchase)
            }
            Err(failure) if failure.unavailable => {
                metrics::counter!("capacity_reservations_total", "outcome" => "rejected")
                    .increment(1);
                tracing::warn!(tour_id = %failure.tour_id, error = %failure.message, "capacity not reserved");
                Reply::new(ReplyType::CapacityNotReserved, purchase)
                    .with_failed_tours([failure.tour_id])
                    .with_message(failure.message)
            }
            Err(failure) => {
                metrics::counter!("capacity_reservations_total", "outcome" => "error")
                    .increment(1);
                tracing::error!(tour_id = %failure.tour_id, error = %failure.message, "capacity store failed during reservation");
                Reply::new(ReplyType::CapacityNotReserved, purchase)
                    .with_failed_tours([failure.tour_id])
                    .with_message(failure.message)
            }
        }
    }

    async fn release(&self, purchase: Purchase) -> Reply {
        match self.release_all(&purchase).await {
            Ok(()) => {
                metrics::counter!("capacity_releases_total", "outcome" => "released").increment(1);
                tracing::info!("capacity released");
                Reply::new(ReplyType::CapacityReleased, purchase)
            }
            Err(failure) => {
                metrics::counter!("capacity_releases_total", "outcome" => "failed").increment(1);
                tracing::error!(tour_id = %failure.tour_id, error = %failure.message, "capacity release failed");
                Reply::new(ReplyType::CapacityReleaseFailed, purchase)
                    .with_failed_tours([failure.tour_id])
                    .with_message(failure.message)
            }
        }
    }

    async fn reserve_all(&self, purchase: &Purchase) -> Result<(), TourFailure> {
        let mut consumed = Vec::new();

        for (tour_id, qty) in purchase.quantities_by_tour() {
            if qty <= 0 {
                continue;
            }
            if let Err(error) = self.store.consume(tour_id, qty).await {
                self.compensate(&consumed).await;
                return Err(TourFailure::new("reserve", tour_id, error));
            }
            consumed.push((tour_id, qty));
        }
        Ok(())
    }

    /// Hands back seats taken earlier in a failed reservation attempt.
    async fn compensate(&self, consumed: &[(TourId, i64)]) {
        for &(tour_id, qty) in consumed {
            if let Err(error) = self.store.release(tour_id, qty).await {
                tracing::error!(%tour_id, qty, %error, "failed to hand back reserved seats");
            }
        }
    }

    /// Releases every tour in turn, leaving earlier releases in place if a
    /// later one fails.
    async fn release_all(&self, purchase: &Purchase) -> Result<(), TourFailure> {
        for (tour_id, qty) in purchase.quantities_by_tour() {
            if qty <= 0 {
                continue;
            }
            self.store
                .release(tour_id, qty)
                .await
                .map_err(|error| TourFailure::new("release", tour_id, error))?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: CapacityStore + 'static> MessageHandler for CapacityCommandHandler<S> {
    type Message = Command;

    async fn handle(&self, command: Command) {
        let reply = self.process(command).await;
        if reply.kind == ReplyType::UnknownReply {
            return;
        }
        if let Err(error) = self.replies.publish(&reply).await {
            tracing::error!(purchase_id = %reply.purchase.purchase_id, reply = %reply.kind, %error, "failed to publish reply");
        }
    }
}
