//! HTTP API server and process wiring for the tour purchase saga.
//!
//! One process hosts the capacity side, the purchase side and the saga
//! orchestrator, all talking through a broker exactly as separate services
//! would.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use capacity::{CapacityCommandHandler, CapacityStore, InMemoryCapacityStore, PostgresCapacityStore};
use messaging::{InMemoryBroker, Publisher, SagaSubjects, Subscriber};
use metrics_exporter_prometheus::PrometheusHandle;
use purchase::{
    CartRepository, CheckoutService, InMemoryCartRepository, InMemoryTokenRepository,
    PostgresCartRepository, PostgresTokenRepository, PurchaseCommandHandler, TokenRepository,
};
use saga::{Command, PurchaseOrchestrator, Reply};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Checkout service over type-erased repositories.
pub type Checkout = CheckoutService<Arc<dyn TokenRepository>, Arc<dyn CartRepository>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub capacity: Arc<dyn CapacityStore>,
    pub checkout: Checkout,
}

/// Storage backends for every component.
#[derive(Clone)]
pub struct Stores {
    pub capacity: Arc<dyn CapacityStore>,
    pub tokens: Arc<dyn TokenRepository>,
    pub carts: Arc<dyn CartRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            capacity: Arc::new(InMemoryCapacityStore::new()),
            tokens: Arc::new(InMemoryTokenRepository::new()),
            carts: Arc::new(InMemoryCartRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            capacity: Arc::new(PostgresCapacityStore::new(pool.clone())),
            tokens: Arc::new(PostgresTokenRepository::new(pool.clone())),
            carts: Arc::new(PostgresCartRepository::new(pool)),
        }
    }
}

/// Subscribes the orchestrator and `workers` competing members of each
/// participant, and returns the orchestrator for starting sagas.
///
/// `subscriber` yields a subscriber for a `(subject, group)` pair on the
/// chosen broker.
pub async fn start_saga<S, F>(
    stores: &Stores,
    subjects: &SagaSubjects,
    workers: usize,
    commands: Arc<dyn Publisher<Command>>,
    replies: Arc<dyn Publisher<Reply>>,
    subscriber: F,
) -> messaging::Result<Arc<PurchaseOrchestrator>>
where
    S: Subscriber,
    F: Fn(&str, &str) -> S,
{
    let orchestrator = Arc::new(PurchaseOrchestrator::new(commands));
    subscriber(&subjects.replies, &subjects.orchestrator_group)
        .subscribe(orchestrator.clone())
        .await?;

    let capacity_handler = Arc::new(CapacityCommandHandler::new(
        stores.capacity.clone(),
        replies.clone(),
    ));
    let purchase_handler = Arc::new(PurchaseCommandHandler::new(
        stores.tokens.clone(),
        stores.carts.clone(),
        replies,
    ));

    let capacity_members = subscriber(&subjects.commands, &subjects.capacity_group);
    let purchase_members = subscriber(&subjects.commands, &subjects.purchase_group);
    for _ in 0..workers.max(1) {
        capacity_members.subscribe(capacity_handler.clone()).await?;
        purchase_members.subscribe(purchase_handler.clone()).await?;
    }

    tracing::info!(workers, commands = %subjects.commands, replies = %subjects.replies, "saga handlers subscribed");
    Ok(orchestrator)
}

/// Builds the HTTP state around a running orchestrator.
pub fn create_state(stores: &Stores, orchestrator: Arc<PurchaseOrchestrator>) -> Arc<AppState> {
    Arc::new(AppState {
        capacity: stores.capacity.clone(),
        checkout: CheckoutService::new(stores.tokens.clone(), stores.carts.clone(), orchestrator),
    })
}

/// Wires the saga over an in-memory broker and returns the state with the
/// broker, so callers can wait for sagas to settle.
pub async fn create_default_state(
    stores: Stores,
    workers: usize,
) -> messaging::Result<(Arc<AppState>, InMemoryBroker)> {
    let broker = InMemoryBroker::new();
    let subjects = SagaSubjects::default();

    let orchestrator = start_saga(
        &stores,
        &subjects,
        workers,
        Arc::new(broker.publisher::<Command>(&subjects.commands)),
        Arc::new(broker.publisher::<Reply>(&subjects.replies)),
        |subject, group| broker.subscriber(subject, group),
    )
    .await?;

    Ok((create_state(&stores, orchestrator), broker))
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/capacity/{tour_id}",
            get(routes::capacity::get).put(routes::capacity::set),
        )
        .route("/capacity/{tour_id}/consume", post(routes::capacity::consume))
        .route("/capacity/{tour_id}/release", post(routes::capacity::release))
        .route("/cart", get(routes::cart::get))
        .route("/cart/items", post(routes::cart::add_item))
        .route("/cart/items/{item_id}", delete(routes::cart::remove_item))
        .route("/checkout", post(routes::checkout::checkout))
        .route("/purchases", get(routes::checkout::history))
        .route("/validate-token", get(routes::checkout::validate_token))
        .route(
            "/check-is-purchased/{tour_id}",
            get(routes::checkout::is_purchased),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
