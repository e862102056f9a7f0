//! API request and response models.
//!
//! Counters and amounts are rendered as decimal strings; JSON numbers cannot hold
//! them losslessly.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::stats::{
    GlobalStats, JackpotStats, PlayerStats, PlayerWeeklyStats, Totals, WeeklyStats,
};

/// Economic counters shared by global and player responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotalsInfo {
    /// Number of purchases
    pub key_purchase_events: String,
    /// Keys bought
    pub keys_purchased: String,
    /// Sum paid for keys
    pub key_purchase_amount: String,
    /// Number of weekly claims
    pub weekly_claim_events: String,
    /// Sum of weekly claims
    pub weekly_claim_amount: String,
    /// Number of jackpot claims
    pub jackpot_claim_events: String,
    /// Sum of jackpot claims
    pub jackpot_claim_amount: String,
    /// Sum of all claims
    pub total_claim_amount: String,
    /// Claims minus purchases, may be negative
    pub net_profit_amount: String,
}

impl From<&Totals> for TotalsInfo {
    fn from(totals: &Totals) -> Self {
        Self {
            key_purchase_events: totals.key_purchase_events.to_string(),
            keys_purchased: totals.keys_purchased.to_string(),
            key_purchase_amount: totals.key_purchase_amount.to_string(),
            weekly_claim_events: totals.weekly_claim_events.to_string(),
            weekly_claim_amount: totals.weekly_claim_amount.to_string(),
            jackpot_claim_events: totals.jackpot_claim_events.to_string(),
            jackpot_claim_amount: totals.jackpot_claim_amount.to_string(),
            total_claim_amount: totals.total_claim_amount.to_string(),
            net_profit_amount: totals.net_profit_amount.to_string(),
        }
    }
}

/// Global totals response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStatsResponse {
    /// Distinct wallets seen
    pub total_unique_players: String,
    /// Economic counters
    #[serde(flatten)]
    pub totals: TotalsInfo,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
}

impl From<GlobalStats> for GlobalStatsResponse {
    fn from(stats: GlobalStats) -> Self {
        Self {
            total_unique_players: stats.total_unique_players.to_string(),
            totals: TotalsInfo::from(&stats.totals),
            updated_at_block: stats.updated_at_block,
            updated_at_timestamp: stats.updated_at_timestamp,
        }
    }
}

/// Profile snapshot taken when the player was first seen.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    /// Display name
    pub name: Option<String>,
    /// Avatar URL
    pub image_url: Option<String>,
    /// Verification tier
    pub verification: Option<String>,
    /// Whether enrichment ran
    pub fetch_attempted: bool,
    /// When enrichment ran
    pub fetched_at_timestamp: Option<u64>,
}

/// Player response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    /// Lower-cased wallet
    pub wallet: String,
    /// Profile snapshot
    pub profile: ProfileInfo,
    /// First block seen
    pub first_seen_block: u64,
    /// First timestamp seen
    pub first_seen_timestamp: u64,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
    /// Economic counters
    #[serde(flatten)]
    pub totals: TotalsInfo,
}

impl From<PlayerStats> for PlayerResponse {
    fn from(stats: PlayerStats) -> Self {
        Self {
            profile: ProfileInfo {
                name: stats.profile.name,
                image_url: stats.profile.image_url,
                verification: stats.profile.verification,
                fetch_attempted: stats.profile.fetch_attempted,
                fetched_at_timestamp: stats.profile.fetched_at_timestamp,
            },
            totals: TotalsInfo::from(&stats.totals),
            wallet: stats.wallet,
            first_seen_block: stats.first_seen_block,
            first_seen_timestamp: stats.first_seen_timestamp,
            updated_at_block: stats.updated_at_block,
            updated_at_timestamp: stats.updated_at_timestamp,
        }
    }
}

/// Weekly totals response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStatsResponse {
    /// Week number
    pub week: String,
    /// Claims in the week
    pub weekly_claim_events: String,
    /// Amount claimed in the week
    pub weekly_claim_amount: String,
    /// Distinct claimers
    pub unique_claimers: String,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
}

impl From<WeeklyStats> for WeeklyStatsResponse {
    fn from(stats: WeeklyStats) -> Self {
        Self {
            week: stats.week.to_string(),
            weekly_claim_events: stats.weekly_claim_events.to_string(),
            weekly_claim_amount: stats.weekly_claim_amount.to_string(),
            unique_claimers: stats.unique_claimers.to_string(),
            updated_at_block: stats.updated_at_block,
            updated_at_timestamp: stats.updated_at_timestamp,
        }
    }
}

/// One wallet's totals for a week.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerWeeklyResponse {
    /// Lower-cased wallet
    pub wallet: String,
    /// Week number
    pub week: String,
    /// Claims by this wallet in the week
    pub weekly_claim_events: String,
    /// Amount claimed by this wallet in the week
    pub weekly_claim_amount: String,
    /// Block of the first claim
    pub first_claim_block: u64,
    /// Timestamp of the first claim
    pub first_claim_timestamp: u64,
    /// Block of the latest claim
    pub last_claim_block: u64,
    /// Timestamp of the latest claim
    pub last_claim_timestamp: u64,
}

impl From<PlayerWeeklyStats> for PlayerWeeklyResponse {
    fn from(stats: PlayerWeeklyStats) -> Self {
        Self {
            week: stats.week.to_string(),
            weekly_claim_events: stats.weekly_claim_events.to_string(),
            weekly_claim_amount: stats.weekly_claim_amount.to_string(),
            wallet: stats.wallet,
            first_claim_block: stats.first_claim_block,
            first_claim_timestamp: stats.first_claim_timestamp,
            last_claim_block: stats.last_claim_block,
            last_claim_timestamp: stats.last_claim_timestamp,
        }
    }
}

/// Jackpot round response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JackpotStatsResponse {
    /// Jackpot nonce
    pub nonce: String,
    /// Claims for the nonce
    pub jackpot_claim_events: String,
    /// Amount claimed for the nonce
    pub jackpot_claim_amount: String,
    /// Distinct claimers
    pub unique_claimers: String,
    /// Block of the last update
    pub updated_at_block: u64,
    /// Timestamp of the last update
    pub updated_at_timestamp: u64,
}

impl From<JackpotStats> for JackpotStatsResponse {
    fn from(stats: JackpotStats) -> Self {
        Self {
            nonce: stats.nonce.to_string(),
            jackpot_claim_events: stats.jackpot_claim_events.to_string(),
            jackpot_claim_amount: stats.jackpot_claim_amount.to_string(),
            unique_claimers: stats.unique_claimers.to_string(),
            updated_at_block: stats.updated_at_block,
            updated_at_timestamp: stats.updated_at_timestamp,
        }
    }
}

/// Query parameters for list endpoints.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Maximum items to return (1-1000)
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_limit() -> u32 {
    50
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Application version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Last indexed block number
    pub indexed_block: u64,
    /// Number of recorded events
    pub recorded_events: u64,
    /// Database status
    pub database_status: HealthStatus,
}

/// Health status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All services healthy
    Healthy,
    /// Unhealthy state
    Unhealthy,
}

/// Error response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type
    pub error: String,
    /// Human-readable message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::BlockMeta;
    use alloy::primitives::U256;

    #[test]
    fn test_global_response_flattens_totals_as_strings() {
        let mut stats = GlobalStats::new(BlockMeta::new(10, 100));
        stats
            .totals
            .apply_purchase(U256::from(3u64), U256::from(30u64))
            .unwrap();

        let json = serde_json::to_value(GlobalStatsResponse::from(stats)).unwrap();

        assert_eq!(json["keysPurchased"], "3");
        assert_eq!(json["netProfitAmount"], "-30");
        assert_eq!(json["updatedAtBlock"], 10);
    }

    #[test]
    fn test_list_query_default_limit() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
    }
}
