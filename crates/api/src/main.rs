//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::Stores;
use api::config::{Config, LogFormat};
use messaging::InMemoryBroker;
use saga::{Command, PurchaseOrchestrator, Reply};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long in-flight sagas get to settle after the server stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

async fn connect_stores(config: &Config) -> Result<Stores, BoxError> {
    let Some(url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set, using in-memory stores");
        return Ok(Stores::in_memory());
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    purchase::run_migrations(&pool).await?;
    tracing::info!("connected to PostgreSQL, migrations applied");
    Ok(Stores::postgres(pool))
}

/// Running broker, kept so shutdown can drain it.
enum Broker {
    InMemory(InMemoryBroker),
    #[cfg(feature = "nats")]
    Nats,
}

async fn start_broker(
    config: &Config,
    stores: &Stores,
) -> Result<(Arc<PurchaseOrchestrator>, Broker), BoxError> {
    let subjects = &config.subjects;
    let workers = config.handler_workers;

    #[cfg(feature = "nats")]
    if let Some(url) = &config.nats_url {
        let nats = messaging::NatsBroker::connect(url).await?;
        let orchestrator = api::start_saga(
            stores,
            subjects,
            workers,
            Arc::new(nats.publisher::<Command>(&subjects.commands)),
            Arc::new(nats.publisher::<Reply>(&subjects.replies)),
            |subject, group| nats.subscriber(subject, group),
        )
        .await?;
        return Ok((orchestrator, Broker::Nats));
    }

    #[cfg(not(feature = "nats"))]
    if config.nats_url.is_some() {
        tracing::warn!("NATS_URL is set but the nats feature is disabled, using in-memory broker");
    }

    let broker = InMemoryBroker::new();
    let orchestrator = api::start_saga(
        stores,
        subjects,
        workers,
        Arc::new(broker.publisher::<Command>(&subjects.commands)),
        Arc::new(broker.publisher::<Reply>(&subjects.replies)),
        |subject, group| broker.subscriber(subject, group),
    )
    .await?;
    Ok((orchestrator, Broker::InMemory(broker)))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Storage and saga participants
    let stores = connect_stores(&config).await?;
    let (orchestrator, broker) = start_broker(&config, &stores).await?;

    // 4. Build the application
    let state = api::create_state(&stores, orchestrator);
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Let sagas already in flight finish
    match broker {
        Broker::InMemory(broker) => {
            if tokio::time::timeout(DRAIN_TIMEOUT, broker.wait_idle())
                .await
                .is_err()
            {
                tracing::warn!(in_flight = broker.in_flight(), "shutdown with sagas still in flight");
            }
        }
        #[cfg(feature = "nats")]
        Broker::Nats => {}
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
