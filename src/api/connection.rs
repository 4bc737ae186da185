use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::db::{redis, sqlite};
use crate::error::{sanitize_error, AppError, Result};
use crate::models::{
    ConnectionInfo, ConnectionProfile, ConnectionStatus, ConnectionUpdate, NewConnection,
    TestConnectionResult,
};
use crate::state::AppState;

/// Path ids are taken as text so a bad one gets the usual validation payload
pub(crate) fn parse_id(raw: &str) -> Result<i64> {
    raw.trim().parse().map_err(|_| AppError::invalid_id(raw))
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation("Invalid data", vec![rejection.body_text()]))
}

/// List all connection profiles
pub async fn list_connections(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ConnectionProfile>>> {
    let profiles = state.with_db(sqlite::load_connections)?;
    Ok(Json(profiles))
}

pub async fn get_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionProfile>> {
    let id = parse_id(&id)?;
    Ok(Json(state.profile(id)?))
}

/// Register a new connection profile
pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<NewConnection>, JsonRejection>,
) -> Result<(StatusCode, Json<ConnectionProfile>)> {
    let input = body(payload)?;

    let errors = input.validate();
    if !errors.is_empty() {
        return Err(AppError::validation("Invalid data", errors));
    }

    let profile = state.with_db(|db| sqlite::create_connection(db, &input))?;
    log::info!("Created connection {} ({})", profile.id, profile.name);

    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn update_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ConnectionUpdate>, JsonRejection>,
) -> Result<Json<ConnectionProfile>> {
    let id = parse_id(&id)?;
    let update = body(payload)?;

    let errors = update.validate();
    if !errors.is_empty() {
        return Err(AppError::validation("Invalid data", errors));
    }

    let previous = state.profile(id)?;
    let profile = state
        .with_db(|db| sqlite::update_connection(db, id, &update))?
        .ok_or_else(|| AppError::connection_not_found(id))?;

    // Address or credentials may have changed; reconnect on next use
    state.remove_client(&previous);
    log::info!("Updated connection {} ({})", profile.id, profile.name);

    Ok(Json(profile))
}

/// Delete a connection profile and drop its client
pub async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    let profile = state.profile(id)?;

    if !state.with_db(|db| sqlite::delete_connection(db, id))? {
        return Err(AppError::connection_not_found(id));
    }

    state.remove_client(&profile);
    log::info!("Deleted connection {} ({})", profile.id, profile.name);

    Ok(StatusCode::NO_CONTENT)
}

/// Probe the server once with PING and record the outcome on the profile
pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TestConnectionResult>> {
    let id = parse_id(&id)?;
    let profile = state.profile(id)?;

    state.with_db(|db| sqlite::set_status(db, id, ConnectionStatus::Connecting, None))?;

    let result = match redis::ping(&state.clients, &profile).await {
        Ok(latency) => {
            state.with_db(|db| {
                sqlite::set_status(db, id, ConnectionStatus::Connected, Some(Utc::now()))
            })?;
            log::info!("Connection {} answered PING in {} ms", id, latency);
            TestConnectionResult {
                success: true,
                message: "Connection successful".to_string(),
                latency_ms: Some(latency),
            }
        }
        Err(e) => {
            state.remove_client(&profile);
            state.with_db(|db| sqlite::set_status(db, id, ConnectionStatus::Error, None))?;
            let message = sanitize_error(&e.to_string());
            log::warn!("Connection {} failed its test: {}", id, message);
            TestConnectionResult {
                success: false,
                message: format!("Connection failed: {}", message),
                latency_ms: None,
            }
        }
    };

    Ok(Json(result))
}

/// Get a profile together with whether a client is currently pooled for it
pub async fn connection_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionInfo>> {
    let id = parse_id(&id)?;
    let profile = state.profile(id)?;
    let pooled = state.has_client(&profile);

    Ok(Json(ConnectionInfo { profile, pooled }))
}

/// Drop the pooled client of a profile and mark it disconnected
pub async fn disconnect_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    let profile = state.profile(id)?;

    state.remove_client(&profile);
    state.with_db(|db| sqlite::set_status(db, id, ConnectionStatus::Disconnected, None))?;

    Ok(StatusCode::NO_CONTENT)
}
