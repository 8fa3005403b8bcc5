//! immo-gateway server entry point.
//!
//! Starts the Axum HTTP server with the search, map, billing, and
//! webhook endpoints.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use immo_gateway::api;
use immo_gateway::app_state::AppState;
use immo_gateway::config::{GatewayConfig, StoreBackend};
use immo_gateway::persistence::memory::MemoryStore;
use immo_gateway::persistence::postgres::PostgresStore;
use immo_gateway::persistence::MarketStore;
use immo_gateway::service::{
    LedgerService, MapService, SearchService, SubmissionService, WebhookService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting immo-gateway");

    // Build the store; initialization is an explicit lifecycle step,
    // run exactly once before any request is served.
    let store: Arc<dyn MarketStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(std::time::Duration::from_secs(
                    config.database_connect_timeout_secs,
                ))
                .connect(&config.database_url)
                .await?;
            Arc::new(PostgresStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("running against the in-memory store; data will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };
    store.init().await?;

    // Build service layer
    let search = Arc::new(SearchService::new(
        Arc::clone(&store),
        config.search_candidate_limit,
    ));
    let map = Arc::new(MapService::new(Arc::clone(&store)));
    let ledger = Arc::new(LedgerService::new(Arc::clone(&store)));
    let submission = Arc::new(SubmissionService::new(Arc::clone(&store)));
    let webhook = Arc::new(WebhookService::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        config.webhook_secret.clone(),
        config.webhook_tolerance_secs,
    ));

    // Build application state
    let app_state = AppState {
        search,
        map,
        ledger,
        submission,
        webhook,
        store,
    };

    // Build router
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
