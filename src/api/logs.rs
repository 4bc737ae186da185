use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::connection::parse_id;
use crate::db::sqlite;
use crate::error::{AppError, Result};
use crate::models::{ConnectionProfile, FilterCriteria, LogPage, LogQuery, StatsSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub connection_id: Option<String>,
}

fn invalid_query(errors: Vec<String>) -> AppError {
    AppError::validation("Invalid query parameters", errors)
}

/// The named profile, or the oldest registered one when none is named
fn resolve_profile(state: &AppState, connection_id: Option<&str>) -> Result<ConnectionProfile> {
    match connection_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(raw) => state.profile(parse_id(raw)?),
        None => state
            .with_db(sqlite::first_connection)?
            .ok_or_else(|| AppError::NotFound("No Redis connection registered".to_string())),
    }
}

/// Filtered and paginated log records of one connection
pub async fn get_logs(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<LogQuery>, QueryRejection>,
) -> Result<Json<LogPage>> {
    let Query(query) = query.map_err(|rejection| invalid_query(vec![rejection.body_text()]))?;
    let criteria = FilterCriteria::from_query(&query).map_err(invalid_query)?;
    let profile = resolve_profile(&state, query.connection_id.as_deref())?;

    let page = state.reader.fetch(&state.clients, &profile, &criteria).await?;
    Ok(Json(page))
}

/// Totals and 24-hour error/warning/success summary of one connection
pub async fn get_log_stats(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<StatsSummary>> {
    let Query(query) = query.map_err(|rejection| invalid_query(vec![rejection.body_text()]))?;
    let profile = resolve_profile(&state, query.connection_id.as_deref())?;

    Ok(Json(state.reader.stats(&state.clients, &profile).await))
}
