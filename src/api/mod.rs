pub mod connection;
pub mod logs;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// All HTTP routes of the service
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Connection registry
        .route(
            "/api/connections",
            get(connection::list_connections).post(connection::create_connection),
        )
        .route(
            "/api/connections/:id",
            get(connection::get_connection)
                .put(connection::update_connection)
                .delete(connection::delete_connection),
        )
        .route("/api/connections/:id/test", post(connection::test_connection))
        .route("/api/connections/:id/status", get(connection::connection_status))
        .route(
            "/api/connections/:id/disconnect",
            post(connection::disconnect_connection),
        )
        // Logs
        .route("/api/logs", get(logs::get_logs))
        .route("/api/logs/stats", get(logs::get_log_stats))
        .with_state(state)
}
