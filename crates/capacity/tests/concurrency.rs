//! Concurrency tests for the in-memory capacity store.

use std::sync::Arc;

use capacity::{CapacityCommandHandler, CapacityError, CapacityStore, InMemoryCapacityStore};
use common::{CartId, PurchaseId, TourId, TouristId};
use messaging::RecordingPublisher;
use saga::{Command, CommandType, Purchase, PurchaseItem, ReplyType};

const TOUR: TourId = TourId::new(1);

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_consumes_never_oversell() {
    let store = InMemoryCapacityStore::new();
    store.init_or_update(TOUR, 100).await.unwrap();

    let tasks: Vec<_> = (0..250)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.consume(TOUR, 1).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(CapacityError::NotEnoughSeats { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 100);
    assert_eq!(rejected, 150);
    assert_eq!(store.get(TOUR).await.unwrap().available_seats, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_consumed_minus_released_never_exceeds_capacity() {
    const CAPACITY: i64 = 20;
    let store = InMemoryCapacityStore::new();
    store.init_or_update(TOUR, CAPACITY).await.unwrap();

    // Every task buys some seats; half of the buyers later hand theirs back.
    let tasks: Vec<_> = (0..400i64)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let qty = (i % 3) + 1;
                let Ok(row) = store.consume(TOUR, qty).await else {
                    return (0, 0);
                };
                assert!((0..=row.capacity).contains(&row.available_seats));
                if i % 2 == 0 {
                    tokio::task::yield_now().await;
                    let row = store.release(TOUR, qty).await.unwrap();
                    assert!((0..=row.capacity).contains(&row.available_seats));
                    return (qty, qty);
                }
                (qty, 0)
            })
        })
        .collect();

    let mut consumed = 0;
    let mut released = 0;
    for task in tasks {
        let (c, r) = task.await.unwrap();
        consumed += c;
        released += r;
    }

    let held = consumed - released;
    assert!(held <= CAPACITY, "{held} seats held out of {CAPACITY}");
    let row = store.get(TOUR).await.unwrap();
    assert_eq!(row.available_seats, CAPACITY - held);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_competing_reservations_fill_tour_exactly() {
    let store = InMemoryCapacityStore::new();
    store.init_or_update(TOUR, 10).await.unwrap();
    store.init_or_update(TourId::new(2), 1000).await.unwrap();
    let replies = RecordingPublisher::new();
    let handler = Arc::new(CapacityCommandHandler::new(
        store.clone(),
        Arc::new(replies.clone()),
    ));

    let tasks: Vec<_> = (0..30)
        .map(|i| {
            let handler = handler.clone();
            tokio::spawn(async move {
                let purchase = Purchase::new(
                    PurchaseId::new(format!("p-{i}")),
                    CartId::new(i),
                    TouristId::new(i),
                    vec![
                        PurchaseItem::new(TourId::new(2), 5),
                        PurchaseItem::new(TOUR, 2),
                    ],
                );
                handler
                    .process(Command::new(CommandType::ReserveCapacity, purchase))
                    .await
                    .kind
            })
        })
        .collect();

    let mut reserved = 0;
    for task in tasks {
        if task.await.unwrap() == ReplyType::CapacityReserved {
            reserved += 1;
        }
    }

    assert_eq!(reserved, 5);
    assert_eq!(store.get(TOUR).await.unwrap().available_seats, 0);
    // Rejected attempts handed their seats on tour 2 back.
    assert_eq!(
        store.get(TourId::new(2)).await.unwrap().available_seats,
        1000 - 5 * 5
    );
}
