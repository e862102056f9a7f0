//! Database models that map to SQL tables.
//!
//! Rows hold counters and amounts as decimal strings and block numbers as
//! `i64`. Amount sums are unbounded, so the text form is the only lossless one.
//! Conversions to and from the domain types in [`crate::stats`] are checked in
//! both directions, so a corrupt column surfaces as a decoding error.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, IndexerResult};
use crate::events::EventRecord;
use crate::stats::{
    GlobalStats, JackpotStats, PlayerProfile, PlayerStats, PlayerWeeklyStats, Totals,
    WeeklyStats, GLOBAL_STATS_ID,
};

/// Convert a block number or timestamp for storage.
pub(crate) fn to_i64(field: &str, value: u64) -> IndexerResult<i64> {
    i64::try_from(value)
        .map_err(|e| IndexerError::database(format!("{field} {value} exceeds i64"), Some(Box::new(e))))
}

/// Convert a stored block number or timestamp back.
pub(crate) fn to_u64(field: &str, value: i64) -> IndexerResult<u64> {
    u64::try_from(value).map_err(|e| {
        IndexerError::decoding(format!("{field} {value} is negative"), Some(Box::new(e)))
    })
}

/// Parse a stored unsigned decimal.
pub(crate) fn parse_u256(field: &str, value: &str) -> IndexerResult<U256> {
    U256::from_str_radix(value, 10).map_err(|e| {
        IndexerError::decoding(format!("{field} is not a decimal: {value}"), Some(Box::new(e)))
    })
}

/// Parse a stored amount sum.
pub(crate) fn parse_amount(field: &str, value: &str) -> IndexerResult<BigUint> {
    value.parse::<BigUint>().map_err(|e| {
        IndexerError::decoding(format!("{field} is not a decimal: {value}"), Some(Box::new(e)))
    })
}

/// Parse a stored signed decimal.
pub(crate) fn parse_signed(field: &str, value: &str) -> IndexerResult<BigInt> {
    value.parse::<BigInt>().map_err(|e| {
        IndexerError::decoding(format!("{field} is not a signed decimal: {value}"), Some(Box::new(e)))
    })
}

/// Economic counters shared by `global_stats` and `player_stats`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TotalsRow {
    /// Number of purchases
    pub key_purchase_events: String,
    /// Keys bought
    pub keys_purchased: String,
    /// Sum of `totalPaid`
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
    /// Signed net profit
    pub net_profit_amount: String,
}

impl From<&Totals> for TotalsRow {
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

impl TryFrom<&TotalsRow> for Totals {
    type Error = IndexerError;

    fn try_from(row: &TotalsRow) -> IndexerResult<Self> {
        Ok(Self {
            key_purchase_events: parse_u256("key_purchase_events", &row.key_purchase_events)?,
            keys_purchased: parse_amount("keys_purchased", &row.keys_purchased)?,
            key_purchase_amount: parse_amount("key_purchase_amount", &row.key_purchase_amount)?,
            weekly_claim_events: parse_u256("weekly_claim_events", &row.weekly_claim_events)?,
            weekly_claim_amount: parse_amount("weekly_claim_amount", &row.weekly_claim_amount)?,
            jackpot_claim_events: parse_u256("jackpot_claim_events", &row.jackpot_claim_events)?,
            jackpot_claim_amount: parse_amount("jackpot_claim_amount", &row.jackpot_claim_amount)?,
            total_claim_amount: parse_amount("total_claim_amount", &row.total_claim_amount)?,
            net_profit_amount: parse_signed("net_profit_amount", &row.net_profit_amount)?,
        })
    }
}

/// Maps to the `global_stats` table (one row).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GlobalStatsRow {
    /// Always [`GLOBAL_STATS_ID`]
    pub id: String,
    /// Distinct wallets
    pub total_unique_players: String,
    /// Economic counters
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub totals: TotalsRow,
    /// Block of the last update
    pub updated_at_block: i64,
    /// Timestamp of the last update
    pub updated_at_timestamp: i64,
}

impl GlobalStatsRow {
    /// Build a row from the domain record.
    ///
    /// # Errors
    ///
    /// Returns an error if a block number exceeds `i64`.
    pub fn from_stats(stats: &GlobalStats) -> IndexerResult<Self> {
        Ok(Self {
            id: GLOBAL_STATS_ID.to_string(),
            total_unique_players: stats.total_unique_players.to_string(),
            totals: TotalsRow::from(&stats.totals),
            updated_at_block: to_i64("updated_at_block", stats.updated_at_block)?,
            updated_at_timestamp: to_i64("updated_at_timestamp", stats.updated_at_timestamp)?,
        })
    }

    /// Convert back to the domain record.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for corrupt columns.
    pub fn into_stats(self) -> IndexerResult<GlobalStats> {
        Ok(GlobalStats {
            total_unique_players: parse_u256("total_unique_players", &self.total_unique_players)?,
            totals: Totals::try_from(&self.totals)?,
            updated_at_block: to_u64("updated_at_block", self.updated_at_block)?,
            updated_at_timestamp: to_u64("updated_at_timestamp", self.updated_at_timestamp)?,
        })
    }
}

/// Maps to the `player_stats` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerStatsRow {
    /// Lower-cased wallet
    pub wallet: String,
    /// Display name
    pub profile_name: Option<String>,
    /// Avatar URL
    pub profile_image_url: Option<String>,
    /// Verification tier
    pub profile_verification: Option<String>,
    /// Whether enrichment ran
    pub profile_fetch_attempted: bool,
    /// When enrichment ran
    pub profile_fetched_at_timestamp: Option<i64>,
    /// First block seen
    pub first_seen_block: i64,
    /// First timestamp seen
    pub first_seen_timestamp: i64,
    /// Block of the last update
    pub updated_at_block: i64,
    /// Timestamp of the last update
    pub updated_at_timestamp: i64,
    /// Economic counters
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub totals: TotalsRow,
}

impl PlayerStatsRow {
    /// Build a row from the domain record.
    ///
    /// # Errors
    ///
    /// Returns an error if a block number exceeds `i64`.
    pub fn from_stats(stats: &PlayerStats) -> IndexerResult<Self> {
        Ok(Self {
            wallet: stats.wallet.clone(),
            profile_name: stats.profile.name.clone(),
            profile_image_url: stats.profile.image_url.clone(),
            profile_verification: stats.profile.verification.clone(),
            profile_fetch_attempted: stats.profile.fetch_attempted,
            profile_fetched_at_timestamp: stats
                .profile
                .fetched_at_timestamp
                .map(|ts| to_i64("profile_fetched_at_timestamp", ts))
                .transpose()?,
            first_seen_block: to_i64("first_seen_block", stats.first_seen_block)?,
            first_seen_timestamp: to_i64("first_seen_timestamp", stats.first_seen_timestamp)?,
            updated_at_block: to_i64("updated_at_block", stats.updated_at_block)?,
            updated_at_timestamp: to_i64("updated_at_timestamp", stats.updated_at_timestamp)?,
            totals: TotalsRow::from(&stats.totals),
        })
    }

    /// Convert back to the domain record.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for corrupt columns.
    pub fn into_stats(self) -> IndexerResult<PlayerStats> {
        Ok(PlayerStats {
            profile: PlayerProfile {
                name: self.profile_name,
                image_url: self.profile_image_url,
                verification: self.profile_verification,
                fetch_attempted: self.profile_fetch_attempted,
                fetched_at_timestamp: self
                    .profile_fetched_at_timestamp
                    .map(|ts| to_u64("profile_fetched_at_timestamp", ts))
                    .transpose()?,
            },
            first_seen_block: to_u64("first_seen_block", self.first_seen_block)?,
            first_seen_timestamp: to_u64("first_seen_timestamp", self.first_seen_timestamp)?,
            updated_at_block: to_u64("updated_at_block", self.updated_at_block)?,
            updated_at_timestamp: to_u64("updated_at_timestamp", self.updated_at_timestamp)?,
            totals: Totals::try_from(&self.totals)?,
            wallet: self.wallet,
        })
    }
}

/// Maps to the `weekly_stats` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeeklyStatsRow {
    /// Week as decimal
    pub id: String,
    /// Week number
    pub week: String,
    /// Claims in the week
    pub weekly_claim_events: String,
    /// Amount claimed in the week
    pub weekly_claim_amount: String,
    /// Distinct claimers
    pub unique_claimers: String,
    /// Block of the last update
    pub updated_at_block: i64,
    /// Timestamp of the last update
    pub updated_at_timestamp: i64,
}

impl WeeklyStatsRow {
    /// Build a row from the domain record.
    ///
    /// # Errors
    ///
    /// Returns an error if a block number exceeds `i64`.
    pub fn from_stats(stats: &WeeklyStats) -> IndexerResult<Self> {
        Ok(Self {
            id: stats.id(),
            week: stats.week.to_string(),
            weekly_claim_events: stats.weekly_claim_events.to_string(),
            weekly_claim_amount: stats.weekly_claim_amount.to_string(),
            unique_claimers: stats.unique_claimers.to_string(),
            updated_at_block: to_i64("updated_at_block", stats.updated_at_block)?,
            updated_at_timestamp: to_i64("updated_at_timestamp", stats.updated_at_timestamp)?,
        })
    }

    /// Convert back to the domain record.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for corrupt columns.
    pub fn into_stats(self) -> IndexerResult<WeeklyStats> {
        Ok(WeeklyStats {
            week: parse_u256("week", &self.week)?,
            weekly_claim_events: parse_u256("weekly_claim_events", &self.weekly_claim_events)?,
            weekly_claim_amount: parse_amount("weekly_claim_amount", &self.weekly_claim_amount)?,
            unique_claimers: parse_u256("unique_claimers", &self.unique_claimers)?,
            updated_at_block: to_u64("updated_at_block", self.updated_at_block)?,
            updated_at_timestamp: to_u64("updated_at_timestamp", self.updated_at_timestamp)?,
        })
    }
}

/// Maps to the `player_weekly_stats` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerWeeklyStatsRow {
    /// `<wallet>_<week>`
    pub id: String,
    /// Lower-cased wallet
    pub wallet: String,
    /// Week number
    pub week: String,
    /// Claims by this wallet in the week
    pub weekly_claim_events: String,
    /// Amount claimed by this wallet in the week
    pub weekly_claim_amount: String,
    /// Block of the first claim
    pub first_claim_block: i64,
    /// Timestamp of the first claim
    pub first_claim_timestamp: i64,
    /// Block of the latest claim
    pub last_claim_block: i64,
    /// Timestamp of the latest claim
    pub last_claim_timestamp: i64,
}

impl PlayerWeeklyStatsRow {
    /// Build a row from the domain record.
    ///
    /// # Errors
    ///
    /// Returns an error if a block number exceeds `i64`.
    pub fn from_stats(stats: &PlayerWeeklyStats) -> IndexerResult<Self> {
        Ok(Self {
            id: stats.id(),
            wallet: stats.wallet.clone(),
            week: stats.week.to_string(),
            weekly_claim_events: stats.weekly_claim_events.to_string(),
            weekly_claim_amount: stats.weekly_claim_amount.to_string(),
            first_claim_block: to_i64("first_claim_block", stats.first_claim_block)?,
            first_claim_timestamp: to_i64("first_claim_timestamp", stats.first_claim_timestamp)?,
            last_claim_block: to_i64("last_claim_block", stats.last_claim_block)?,
            last_claim_timestamp: to_i64("last_claim_timestamp", stats.last_claim_timestamp)?,
        })
    }

    /// Convert back to the domain record.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for corrupt columns.
    pub fn into_stats(self) -> IndexerResult<PlayerWeeklyStats> {
        Ok(PlayerWeeklyStats {
            week: parse_u256("week", &self.week)?,
            weekly_claim_events: parse_u256("weekly_claim_events", &self.weekly_claim_events)?,
            weekly_claim_amount: parse_amount("weekly_claim_amount", &self.weekly_claim_amount)?,
            first_claim_block: to_u64("first_claim_block", self.first_claim_block)?,
            first_claim_timestamp: to_u64("first_claim_timestamp", self.first_claim_timestamp)?,
            last_claim_block: to_u64("last_claim_block", self.last_claim_block)?,
            last_claim_timestamp: to_u64("last_claim_timestamp", self.last_claim_timestamp)?,
            wallet: self.wallet,
        })
    }
}

/// Maps to the `jackpot_stats` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JackpotStatsRow {
    /// Nonce as decimal
    pub id: String,
    /// Jackpot nonce
    pub nonce: String,
    /// Claims for the nonce
    pub jackpot_claim_events: String,
    /// Amount claimed for the nonce
    pub jackpot_claim_amount: String,
    /// Distinct claimers
    pub unique_claimers: String,
    /// Block of the last update
    pub updated_at_block: i64,
    /// Timestamp of the last update
    pub updated_at_timestamp: i64,
}

impl JackpotStatsRow {
    /// Build a row from the domain record.
    ///
    /// # Errors
    ///
    /// Returns an error if a block number exceeds `i64`.
    pub fn from_stats(stats: &JackpotStats) -> IndexerResult<Self> {
        Ok(Self {
            id: stats.id(),
            nonce: stats.nonce.to_string(),
            jackpot_claim_events: stats.jackpot_claim_events.to_string(),
            jackpot_claim_amount: stats.jackpot_claim_amount.to_string(),
            unique_claimers: stats.unique_claimers.to_string(),
            updated_at_block: to_i64("updated_at_block", stats.updated_at_block)?,
            updated_at_timestamp: to_i64("updated_at_timestamp", stats.updated_at_timestamp)?,
        })
    }

    /// Convert back to the domain record.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for corrupt columns.
    pub fn into_stats(self) -> IndexerResult<JackpotStats> {
        Ok(JackpotStats {
            nonce: parse_u256("nonce", &self.nonce)?,
            jackpot_claim_events: parse_u256("jackpot_claim_events", &self.jackpot_claim_events)?,
            jackpot_claim_amount: parse_amount("jackpot_claim_amount", &self.jackpot_claim_amount)?,
            unique_claimers: parse_u256("unique_claimers", &self.unique_claimers)?,
            updated_at_block: to_u64("updated_at_block", self.updated_at_block)?,
            updated_at_timestamp: to_u64("updated_at_timestamp", self.updated_at_timestamp)?,
        })
    }
}

/// Maps to the `event_records` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecordRow {
    /// `<chainId>_<blockNumber>_<logIndex>`
    pub id: String,
    /// Chain id
    pub chain_id: i64,
    /// Emitting contract name
    pub contract: String,
    /// Solidity event name
    pub event_name: String,
    /// Block number
    pub block_number: i64,
    /// Block timestamp
    pub block_timestamp: i64,
    /// Log index
    pub log_index: i64,
    /// Parameters as a JSON object
    pub fields: String,
    /// Unix timestamp when the row was written
    pub created_at: i64,
}

impl EventRecordRow {
    /// Build a row from an event record.
    ///
    /// # Errors
    ///
    /// Returns an error if a number exceeds `i64` or the fields fail to
    /// serialize.
    pub fn from_record(record: &EventRecord) -> IndexerResult<Self> {
        let fields = serde_json::to_string(&record.fields).map_err(|e| {
            IndexerError::database("Failed to serialize event fields", Some(Box::new(e)))
        })?;
        Ok(Self {
            id: record.id.clone(),
            chain_id: to_i64("chain_id", record.chain_id)?,
            contract: record.contract.to_string(),
            event_name: record.event_name.clone(),
            block_number: to_i64("block_number", record.block_number)?,
            block_timestamp: to_i64("block_timestamp", record.block_timestamp)?,
            log_index: to_i64("log_index", record.log_index)?,
            fields,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Convert back to an event record.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for corrupt columns.
    pub fn into_record(self) -> IndexerResult<EventRecord> {
        let fields: BTreeMap<String, String> = serde_json::from_str(&self.fields).map_err(|e| {
            IndexerError::decoding(
                format!("Corrupt fields for event {}", self.id),
                Some(Box::new(e)),
            )
        })?;
        Ok(EventRecord {
            chain_id: to_u64("chain_id", self.chain_id)?,
            contract: self.contract.parse()?,
            event_name: self.event_name,
            block_number: to_u64("block_number", self.block_number)?,
            block_timestamp: to_u64("block_timestamp", self.block_timestamp)?,
            log_index: to_u64("log_index", self.log_index)?,
            fields,
            id: self.id,
        })
    }
}

/// Maps to the `indexer_state` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexerState {
    /// Chain id (PRIMARY KEY)
    pub chain_id: i64,
    /// Last block fully ingested
    pub last_indexed_block: i64,
    /// Unix timestamp of the last update
    pub last_updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Contract;
    use crate::stats::BlockMeta;

    const BLOCK: BlockMeta = BlockMeta::new(100, 1_700_000_000);

    #[test]
    fn test_negative_net_profit_survives_storage() {
        let mut stats = GlobalStats::new(BLOCK);
        stats
            .totals
            .apply_purchase(U256::from(3u64), U256::from(30u64))
            .unwrap();

        let row = GlobalStatsRow::from_stats(&stats).unwrap();
        assert_eq!(row.totals.net_profit_amount, "-30");
        assert_eq!(row.into_stats().unwrap(), stats);
    }

    #[test]
    fn test_sums_past_u256_survive_storage() {
        let mut stats = GlobalStats::new(BLOCK);
        stats.totals.apply_weekly_claim(U256::MAX).unwrap();
        stats.totals.apply_jackpot_claim(U256::MAX).unwrap();

        let row = GlobalStatsRow::from_stats(&stats).unwrap();
        assert_eq!(row.totals.total_claim_amount.len(), 78);
        assert_eq!(row.into_stats().unwrap(), stats);
    }

    #[test]
    fn test_player_profile_columns() {
        let mut stats = PlayerStats::new("0xabc", BLOCK);
        stats.profile = PlayerProfile {
            name: Some("alice".to_string()),
            image_url: None,
            verification: Some("verified".to_string()),
            fetch_attempted: true,
            fetched_at_timestamp: Some(BLOCK.timestamp),
        };

        let row = PlayerStatsRow::from_stats(&stats).unwrap();
        assert_eq!(row.profile_image_url, None);
        assert_eq!(row.into_stats().unwrap(), stats);
    }

    #[test]
    fn test_corrupt_decimal_is_a_decoding_error() {
        let mut row = WeeklyStatsRow::from_stats(&WeeklyStats::new(U256::from(7u64), BLOCK)).unwrap();
        row.unique_claimers = "seven".to_string();

        let err = row.into_stats().unwrap_err();
        assert!(matches!(err, IndexerError::DecodingError { .. }));
    }

    #[test]
    fn test_block_number_past_i64_is_rejected() {
        let stats = GlobalStats::new(BlockMeta::new(u64::MAX, 0));
        assert!(GlobalStatsRow::from_stats(&stats).is_err());
    }

    #[test]
    fn test_event_record_fields_as_json() {
        let record = EventRecord {
            id: "2741_5_1".to_string(),
            chain_id: 2741,
            contract: Contract::KeyPurchase,
            event_name: "KeyPriceUpdated".to_string(),
            block_number: 5,
            block_timestamp: 50,
            log_index: 1,
            fields: BTreeMap::from([
                ("newPrice".to_string(), "20".to_string()),
                ("oldPrice".to_string(), "10".to_string()),
            ]),
        };

        let row = EventRecordRow::from_record(&record).unwrap();
        assert_eq!(row.fields, r#"{"newPrice":"20","oldPrice":"10"}"#);
        assert_eq!(row.contract, "KeyPurchase");
        assert_eq!(row.into_record().unwrap(), record);
    }
}
