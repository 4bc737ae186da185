use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logs;
pub mod models;
pub mod state;

use config::Config;
use db::redis::LogSource;
use state::AppState;

/// Setup logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(match origin {
        Some(origin) => cors.allow_origin(origin.parse::<HeaderValue>()?),
        None => cors.allow_origin(Any),
    })
}

/// Build the HTTP application for an already initialized state
pub fn app(state: Arc<AppState>, cors_origin: Option<&str>) -> Result<Router, Box<dyn std::error::Error>> {
    Ok(api::router(state).layer(cors_layer(cors_origin)?))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the connection registry
    let metadata_db = db::sqlite::init_database(&config.database)?;
    let source = LogSource::from_config(&config);
    log::info!(
        "Using connection registry {} with log source {:?}",
        config.database.display(),
        source
    );

    let state = Arc::new(AppState::new(metadata_db, source));
    let app = app(state.clone(), config.cors_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.clients.clear();
    log::info!("Shut down");
    Ok(())
}
