mod auth;
mod config;
mod error;
mod oauth;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use routes::{app_router, AppState};
use tasksync_core::db::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tasksync_api=info".parse().expect("valid directive"))
                .add_directive("tasksync_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting tasksync-api with config: {:?}", config);

    let db = Database::open(&config.db_path).await?;
    let state = AppState::from_config(config, &db)?;
    let restarted = state.scheduler.restart_ready().await?;
    tracing::info!(restarted, "Resumed sync loops");

    let scheduler = state.scheduler.clone();
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("tasksync-api listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    tracing::info!("tasksync-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
