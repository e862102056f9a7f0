//! Player endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::instrument;

use super::{check_limit, parse_wallet};
use crate::api::middleware::error::ApiError;
use crate::api::models::{ListQuery, PlayerResponse};
use crate::app_state::AppState;
use crate::store::AggregateStore;

#[utoipa::path(
    get,
    path = "/api/v1/players/{wallet}",
    params(
        ("wallet" = String, Path, description = "Wallet address, any case")
    ),
    responses(
        (status = 200, description = "Player totals", body = PlayerResponse),
        (status = 400, description = "Malformed wallet", body = crate::api::models::ErrorResponse),
        (status = 404, description = "Wallet never seen", body = crate::api::models::ErrorResponse)
    ),
    tag = "Players"
)]
/// Returns one player's totals and profile.
#[instrument(skip(state))]
pub async fn get_player(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<PlayerResponse>, ApiError> {
    let wallet = parse_wallet(&wallet)?;

    let player = state
        .repository
        .player_stats(&wallet)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Player {wallet} not found")))?;

    Ok(Json(player.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/players",
    params(ListQuery),
    responses(
        (status = 200, description = "Players by purchase amount", body = [PlayerResponse])
    ),
    tag = "Players"
)]
/// Lists players, biggest buyers first.
#[instrument(skip(state))]
pub async fn list_players(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PlayerResponse>>, ApiError> {
    let limit = check_limit(query.limit)?;
    let players = state.repository.top_players(limit).await?;

    Ok(Json(players.into_iter().map(PlayerResponse::from).collect()))
}
