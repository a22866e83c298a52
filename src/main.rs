use anyhow::Context;
use point_ledger::api::{create_router, AppState};
use point_ledger::config::{Settings, StorageBackend};
use point_ledger::observability::{init_logging, init_metrics, LogConfig};
use point_ledger::repositories::{
    BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore,
    PostgresBalanceStore, PostgresHistoryStore,
};
use point_ledger::services::AccountLedger;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    // Initialize logging
    init_logging(&LogConfig::from_settings(&settings.application));
    info!("Configuration loaded");

    let metrics_handle = init_metrics();

    let (balances, histories): (Arc<dyn BalanceStore>, Arc<dyn HistoryStore>) =
        match settings.storage.backend {
            StorageBackend::Memory => {
                let latency = settings.storage.simulated_latency();
                info!(?latency, "Using in-memory point tables");
                (
                    Arc::new(InMemoryBalanceStore::with_latency(latency)),
                    Arc::new(InMemoryHistoryStore::with_latency(latency)),
                )
            }
            StorageBackend::Postgres => {
                info!("Connecting to database at {}...", settings.database.redacted_url());
                let pool = PgPoolOptions::new()
                    .max_connections(settings.database.pool_size)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(&settings.database.url)
                    .await
                    .context("failed to connect to database")?;
                info!("Database connection established");

                info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!("Migrations applied successfully");

                (
                    Arc::new(PostgresBalanceStore::new(pool.clone())),
                    Arc::new(PostgresHistoryStore::new(pool)),
                )
            }
        };

    let ledger = Arc::new(AccountLedger::with_config(
        balances,
        histories,
        settings.ledger.clone(),
    ));
    let state = AppState::new(ledger).with_metrics(metrics_handle);
    let app = create_router(state);

    let addr = format!("{}:{}", settings.application.host, settings.application.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Point ledger listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
