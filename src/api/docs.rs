//! OpenAPI documentation for the REST API.

use utoipa::OpenApi;

use crate::api::handlers;

/// OpenAPI documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::stats::get_global_stats,
        handlers::players::get_player,
        handlers::players::list_players,
        handlers::weeks::list_weeks,
        handlers::weeks::get_week,
        handlers::weeks::list_week_players,
        handlers::weeks::get_player_week,
        handlers::jackpots::get_jackpot,
    ),
    components(schemas(
        crate::api::models::HealthResponse,
        crate::api::models::HealthStatus,
        crate::api::models::TotalsInfo,
        crate::api::models::GlobalStatsResponse,
        crate::api::models::ProfileInfo,
        crate::api::models::PlayerResponse,
        crate::api::models::WeeklyStatsResponse,
        crate::api::models::PlayerWeeklyResponse,
        crate::api::models::JackpotStatsResponse,
        crate::api::models::ListQuery,
        crate::api::models::ErrorResponse,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Statistics", description = "Global totals"),
        (name = "Players", description = "Per-wallet totals and profiles"),
        (name = "Weeks", description = "Weekly claim totals"),
        (name = "Jackpots", description = "Jackpot round totals"),
    ),
    info(
        title = "Key Vault Stats API",
        version = "1.0.0",
        description = "Read API over the indexed key purchase and claim statistics",
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health",
            "/api/v1/stats/global",
            "/api/v1/players",
            "/api/v1/players/{wallet}",
            "/api/v1/weeks",
            "/api/v1/weeks/{week}",
            "/api/v1/weeks/{week}/players",
            "/api/v1/weeks/{week}/players/{wallet}",
            "/api/v1/jackpots/{nonce}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
