//! Jackpot endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use super::parse_number;
use crate::api::middleware::error::ApiError;
use crate::api::models::JackpotStatsResponse;
use crate::app_state::AppState;
use crate::store::AggregateStore;

#[utoipa::path(
    get,
    path = "/api/v1/jackpots/{nonce}",
    params(
        ("nonce" = String, Path, description = "Jackpot nonce")
    ),
    responses(
        (status = 200, description = "Jackpot totals", body = JackpotStatsResponse),
        (status = 404, description = "No claims for the nonce", body = crate::api::models::ErrorResponse)
    ),
    tag = "Jackpots"
)]
/// Returns one jackpot round's totals.
#[instrument(skip(state))]
pub async fn get_jackpot(
    State(state): State<AppState>,
    Path(nonce): Path<String>,
) -> Result<Json<JackpotStatsResponse>, ApiError> {
    let nonce = parse_number("nonce", &nonce)?;

    let stats = state
        .repository
        .jackpot_stats(nonce)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Jackpot {nonce} not found")))?;

    Ok(Json(stats.into()))
}
