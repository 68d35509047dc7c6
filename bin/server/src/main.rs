use closetrack_scheduler::RetryWorker;
use closetrack_server::config::ServerConfig;
use closetrack_server::routes;
use closetrack_server::runner::ManagerRetryRunner;
use closetrack_server::state::AppState;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Create application state
    let state = AppState::new(db_pool, &config.automation).expect("failed to build app state");

    // Spawn the background retry worker
    let worker = RetryWorker::new(
        ManagerRetryRunner::new(state.manager.clone()),
        Duration::from_secs(config.automation.retry_poll_interval_seconds),
    );
    tokio::spawn(worker.run());
    tracing::info!(
        poll_interval_seconds = config.automation.retry_poll_interval_seconds,
        "Retry worker started"
    );

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
