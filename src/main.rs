use sphere_api::{
    AppState, MemoryRepository,
    config::{AppConfig, Env, StoreBackend},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging, opens the selected store and
/// serves the router until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sphere_api=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(
        "Application starting in {:?} mode with {:?} store",
        config.env,
        config.store_backend
    );

    // 3. Store
    let repo: RepositoryState = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&config.db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                tracing::warn!(error = %e, "migration failed; continuing with existing schema");
            }

            Arc::new(PostgresRepository::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Arc::new(MemoryRepository::new())
        }
    };

    // 4. Router and server
    let addr = config.addr.clone();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind {addr}: {e}"));

    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{addr}/swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server terminated");
    }
}
