//! Global statistics endpoint.

use axum::{extract::State, Json};
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::GlobalStatsResponse;
use crate::app_state::AppState;
use crate::store::AggregateStore;

#[utoipa::path(
    get,
    path = "/api/v1/stats/global",
    responses(
        (status = 200, description = "Global totals", body = GlobalStatsResponse),
        (status = 404, description = "Nothing indexed yet", body = crate::api::models::ErrorResponse)
    ),
    tag = "Statistics"
)]
/// Returns the global totals.
#[instrument(skip(state))]
pub async fn get_global_stats(
    State(state): State<AppState>,
) -> Result<Json<GlobalStatsResponse>, ApiError> {
    let stats = state
        .repository
        .global_stats()
        .await?
        .ok_or_else(|| ApiError::NotFound("No events indexed yet".to_string()))?;

    Ok(Json(stats.into()))
}
