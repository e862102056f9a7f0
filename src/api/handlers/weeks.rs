//! Weekly claim endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::instrument;

use super::{check_limit, parse_number, parse_wallet};
use crate::api::middleware::error::ApiError;
use crate::api::models::{ListQuery, PlayerWeeklyResponse, WeeklyStatsResponse};
use crate::app_state::AppState;
use crate::store::AggregateStore;

#[utoipa::path(
    get,
    path = "/api/v1/weeks",
    params(ListQuery),
    responses(
        (status = 200, description = "Most recent weeks first", body = [WeeklyStatsResponse])
    ),
    tag = "Weeks"
)]
/// Lists weeks, newest first.
#[instrument(skip(state))]
pub async fn list_weeks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<WeeklyStatsResponse>>, ApiError> {
    let limit = check_limit(query.limit)?;
    let weeks = state.repository.recent_weeks(limit).await?;

    Ok(Json(weeks.into_iter().map(WeeklyStatsResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/weeks/{week}",
    params(
        ("week" = String, Path, description = "Week number")
    ),
    responses(
        (status = 200, description = "Week totals", body = WeeklyStatsResponse),
        (status = 404, description = "No claims that week", body = crate::api::models::ErrorResponse)
    ),
    tag = "Weeks"
)]
/// Returns one week's totals.
#[instrument(skip(state))]
pub async fn get_week(
    State(state): State<AppState>,
    Path(week): Path<String>,
) -> Result<Json<WeeklyStatsResponse>, ApiError> {
    let week = parse_number("week", &week)?;

    let stats = state
        .repository
        .weekly_stats(week)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Week {week} not found")))?;

    Ok(Json(stats.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/weeks/{week}/players",
    params(
        ("week" = String, Path, description = "Week number"),
        ListQuery
    ),
    responses(
        (status = 200, description = "Claimers by amount", body = [PlayerWeeklyResponse])
    ),
    tag = "Weeks"
)]
/// Lists a week's claimers, largest amount first.
#[instrument(skip(state))]
pub async fn list_week_players(
    State(state): State<AppState>,
    Path(week): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PlayerWeeklyResponse>>, ApiError> {
    let week = parse_number("week", &week)?;
    let limit = check_limit(query.limit)?;
    let claimers = state.repository.week_claimers(week, limit).await?;

    Ok(Json(claimers.into_iter().map(PlayerWeeklyResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/weeks/{week}/players/{wallet}",
    params(
        ("week" = String, Path, description = "Week number"),
        ("wallet" = String, Path, description = "Wallet address, any case")
    ),
    responses(
        (status = 200, description = "Wallet totals for the week", body = PlayerWeeklyResponse),
        (status = 404, description = "Wallet did not claim that week", body = crate::api::models::ErrorResponse)
    ),
    tag = "Weeks"
)]
/// Returns one wallet's totals for a week.
#[instrument(skip(state))]
pub async fn get_player_week(
    State(state): State<AppState>,
    Path((week, wallet)): Path<(String, String)>,
) -> Result<Json<PlayerWeeklyResponse>, ApiError> {
    let week = parse_number("week", &week)?;
    let wallet = parse_wallet(&wallet)?;

    let stats = state
        .repository
        .player_weekly_stats(&wallet, week)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No claims by {wallet} in week {week}"))
        })?;

    Ok(Json(stats.into()))
}
