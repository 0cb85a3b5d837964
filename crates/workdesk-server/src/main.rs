mod config;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use workdesk_api::AppStateInner;
use workdesk_core::Messenger;
use workdesk_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workdesk=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Accounts are mirrored into the same database by the portal.
    let db = Arc::new(Database::open(&config.db_path)?);
    let messenger = Messenger::with_local_directory(db);
    let state = AppStateInner::new(messenger, config.jwt_secret.clone());

    let app = Router::new()
        .merge(workdesk_api::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Workdesk messaging listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Workdesk messaging stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
