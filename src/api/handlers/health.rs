//! Health check endpoint.

use axum::{extract::State, Json};
use std::time::SystemTime;
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;
use crate::store::AggregateStore;

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Health"
)]
/// Returns service health information.
///
/// A failing database is reported in the body, not as an error status.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let database_status = match state.repository.health_check().await {
        Ok(()) => HealthStatus::Healthy,
        Err(_) => HealthStatus::Unhealthy,
    };

    let (indexed_block, recorded_events) = if database_status == HealthStatus::Healthy {
        (
            state.repository.cursor(state.chain_id).await?.unwrap_or(0),
            state.repository.event_count().await?,
        )
    } else {
        (0, 0)
    };

    Ok(Json(HealthResponse {
        status: database_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        indexed_block,
        recorded_events,
        database_status,
    }))
}
