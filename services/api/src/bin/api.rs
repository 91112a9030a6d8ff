//! services/api/src/bin/api.rs

use chrono::Utc;
use doorlock_api::{
    adapters::{
        actuator::RemoteActuator,
        db::PgStore,
        memory::MemoryStore,
        status_feed::{run_status_feed, TokenSource},
    },
    config::Config,
    error::ApiError,
    web::{
        self,
        rest::ApiDoc,
        state::{AppState, Stores},
    },
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Storage ---
    let stores = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = Arc::new(PgStore::new(db_pool));
            info!("Running database migrations...");
            store.run_migrations().await?;
            store.seed_credential_if_empty(&config.seed).await?;
            info!("Database ready.");
            Stores::postgres(store)
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            let seed = &config.seed;
            let store = MemoryStore::seeded(&seed.surname, &seed.password, &seed.passcode)?;
            Stores::memory(Arc::new(store))
        }
    };

    // --- 3. Initialize the Actuator Client ---
    let device = Arc::new(RemoteActuator::new(
        config.actuator_url.clone(),
        config.actuator_timeout,
    )?);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(config.clone(), stores, device));

    // --- 5. Follow the Actuator's Status Socket ---
    let shutdown = CancellationToken::new();
    if let Some(ws_url) = config.actuator_ws_url.clone() {
        let principal = app_state.credentials.first_credential().await?.principal();
        let tokens = app_state.tokens.clone();
        let token: TokenSource =
            Arc::new(move || Some(tokens.issue(&principal, Utc::now()).0));

        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(run_status_feed(ws_url, token, shutdown.clone(), tx));

        let hub = app_state.hub.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Some(update) = msg.status_update() {
                    hub.apply(update);
                }
                if let Some(event) = msg.as_event() {
                    hub.announce(event);
                }
            }
        });
    } else {
        info!("ACTUATOR_WS_URL is empty, upstream status feed disabled");
    }

    // --- 6. Create the Web Router ---
    let app = web::router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let result = axum::serve(listener, app).await;
    shutdown.cancel();
    result?;

    Ok(())
}
