//! End-to-end checkout tests: the orchestrator and both participants wired
//! over one in-memory broker.

use std::sync::Arc;

use capacity::{CapacityCommandHandler, CapacityStore, InMemoryCapacityStore};
use common::{TourId, TouristId};
use messaging::{InMemoryBroker, SagaSubjects, Subscriber};
use purchase::{
    AddToCart, CartRepository, CheckoutService, InMemoryCartRepository, InMemoryTokenRepository,
    PurchaseCommandHandler, TokenRepository,
};
use saga::{Command, PurchaseOrchestrator, Reply};

const TOURIST: TouristId = TouristId::new(9);
const TOUR: TourId = TourId::new(3);

struct TestHarness {
    broker: InMemoryBroker,
    capacity: InMemoryCapacityStore,
    tokens: InMemoryTokenRepository,
    carts: InMemoryCartRepository,
    checkout: CheckoutService<InMemoryTokenRepository, InMemoryCartRepository>,
}

impl TestHarness {
    async fn new() -> Self {
        let broker = InMemoryBroker::new();
        let subjects = SagaSubjects::default();
        let capacity = InMemoryCapacityStore::new();
        let tokens = InMemoryTokenRepository::new();
        let carts = InMemoryCartRepository::new();

        let commands = Arc::new(broker.publisher::<Command>(&subjects.commands));
        let replies = Arc::new(broker.publisher::<Reply>(&subjects.replies));

        let orchestrator = Arc::new(PurchaseOrchestrator::new(commands));
        broker
            .subscriber(&subjects.replies, &subjects.orchestrator_group)
            .subscribe(orchestrator.clone())
            .await
            .unwrap();

        let capacity_handler = Arc::new(CapacityCommandHandler::new(
            capacity.clone(),
            replies.clone(),
        ));
        let purchase_handler = Arc::new(PurchaseCommandHandler::new(
            tokens.clone(),
            carts.clone(),
            replies,
        ));
        // Two competing members per participant group.
        for _ in 0..2 {
            broker
                .subscriber(&subjects.commands, &subjects.capacity_group)
                .subscribe(capacity_handler.clone())
                .await
                .unwrap();
            broker
                .subscriber(&subjects.commands, &subjects.purchase_group)
                .subscribe(purchase_handler.clone())
                .await
                .unwrap();
        }

        let checkout = CheckoutService::new(tokens.clone(), carts.clone(), orchestrator);

        Self {
            broker,
            capacity,
            tokens,
            carts,
            checkout,
        }
    }

    async fn available(&self, tour_id: TourId) -> i64 {
        self.capacity.get(tour_id).await.unwrap().available_seats
    }
}

#[tokio::test]
async fn test_checkout_completes_purchase() {
    let harness = TestHarness::new().await;
    harness.capacity.init_or_update(TOUR, 5).await.unwrap();
    harness
        .checkout
        .add_to_cart(TOURIST, AddToCart::new(TOUR, 2))
        .await
        .unwrap();

    harness.checkout.checkout(TOURIST).await.unwrap();
    harness.broker.wait_idle().await;

    assert_eq!(harness.available(TOUR).await, 3);
    let tokens = harness.tokens.tokens_for_tourist(TOURIST).await.unwrap();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().all(|t| t.tour_id == TOUR));
    assert!(harness.carts.cart_for_tourist(TOURIST).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_without_seats_aborts() {
    let harness = TestHarness::new().await;
    harness.capacity.init_or_update(TOUR, 1).await.unwrap();
    harness
        .checkout
        .add_to_cart(TOURIST, AddToCart::new(TOUR, 2))
        .await
        .unwrap();

    harness.checkout.checkout(TOURIST).await.unwrap();
    harness.broker.wait_idle().await;

    assert_eq!(harness.available(TOUR).await, 1);
    assert_eq!(harness.tokens.token_count(), 0);
    assert_eq!(
        harness.carts.cart_for_tourist(TOURIST).await.unwrap().items.len(),
        1
    );
}

#[tokio::test]
async fn test_token_failure_releases_seats() {
    let harness = TestHarness::new().await;
    harness.capacity.init_or_update(TOUR, 5).await.unwrap();
    harness
        .checkout
        .add_to_cart(TOURIST, AddToCart::new(TOUR, 3))
        .await
        .unwrap();
    harness.tokens.fail_after(1);

    harness.checkout.checkout(TOURIST).await.unwrap();
    harness.broker.wait_idle().await;

    assert_eq!(harness.available(TOUR).await, 5);
    // Tokens minted before the failure are not rolled back.
    assert_eq!(harness.tokens.token_count(), 1);
    assert!(!harness.carts.cart_for_tourist(TOURIST).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_multi_tour_shortage_leaves_every_tour_untouched() {
    let harness = TestHarness::new().await;
    let tour_a = TourId::new(10);
    let tour_b = TourId::new(11);
    harness.capacity.init_or_update(tour_a, 5).await.unwrap();
    harness.capacity.init_or_update(tour_b, 1).await.unwrap();
    harness
        .checkout
        .add_to_cart(TOURIST, AddToCart::new(tour_a, 2))
        .await
        .unwrap();
    harness
        .checkout
        .add_to_cart(TOURIST, AddToCart::new(tour_b, 3))
        .await
        .unwrap();

    harness.checkout.checkout(TOURIST).await.unwrap();
    harness.broker.wait_idle().await;

    assert_eq!(harness.available(tour_a).await, 5);
    assert_eq!(harness.available(tour_b).await, 1);
    assert_eq!(harness.tokens.token_count(), 0);
}

#[tokio::test]
async fn test_competing_buyers_never_oversell() {
    let harness = TestHarness::new().await;
    harness.capacity.init_or_update(TOUR, 4).await.unwrap();

    for tourist in 1..=10 {
        let tourist = TouristId::new(tourist);
        harness
            .checkout
            .add_to_cart(tourist, AddToCart::new(TOUR, 1))
            .await
            .unwrap();
        harness.checkout.checkout(tourist).await.unwrap();
    }
    harness.broker.wait_idle().await;

    assert_eq!(harness.available(TOUR).await, 0);
    assert_eq!(harness.tokens.token_count(), 4);
}
