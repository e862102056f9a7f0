//! Repository pattern for database operations.
//!
//! [`Repository`] implements [`AggregateStore`] on `SQLite`. A changeset is
//! written inside one transaction, so an event's record and every aggregate
//! it touched land together or not at all. Read-side queries for the API and
//! CLI live here too.

use alloy::primitives::U256;
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use super::models::{
    to_i64, to_u64, EventRecordRow, GlobalStatsRow, IndexerState, JackpotStatsRow, PlayerStatsRow,
    PlayerWeeklyStatsRow, WeeklyStatsRow,
};
use crate::error::{IndexerError, IndexerResult};
use crate::events::EventRecord;
use crate::stats::{
    jackpot_id, jackpot_player_seen_id, player_weekly_id, weekly_id, GlobalStats,
    JackpotPlayerSeen, JackpotStats, PlayerStats, PlayerWeeklyStats, WeeklyStats,
    GLOBAL_STATS_ID,
};
use crate::store::{AggregateStore, Changeset};

/// Map a write failure, reporting unique-key clashes as state errors.
fn write_error(what: &str, e: sqlx::Error) -> IndexerError {
    let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
    if duplicate {
        IndexerError::state(format!("{what} already exists"), Some(Box::new(e)))
    } else {
        IndexerError::database(format!("Failed to write {what}"), Some(Box::new(e)))
    }
}

/// Repository for database operations.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Creates a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== API QUERY OPERATIONS ====================

    /// Health check for database connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not answer.
    pub async fn health_check(&self) -> IndexerResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Database health check failed", Some(Box::new(e))))?;

        Ok(())
    }

    /// Players with the largest purchase amounts first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn top_players(&self, limit: u32) -> IndexerResult<Vec<PlayerStats>> {
        // Decimal TEXT sorts numerically by length first.
        let rows = sqlx::query_as::<_, PlayerStatsRow>(
            r"
            SELECT * FROM player_stats
            ORDER BY LENGTH(key_purchase_amount) DESC, key_purchase_amount DESC, wallet ASC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to query top players", Some(Box::new(e))))?;

        rows.into_iter().map(PlayerStatsRow::into_stats).collect()
    }

    /// Most recent weeks first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn recent_weeks(&self, limit: u32) -> IndexerResult<Vec<WeeklyStats>> {
        let rows = sqlx::query_as::<_, WeeklyStatsRow>(
            r"
            SELECT * FROM weekly_stats
            ORDER BY LENGTH(week) DESC, week DESC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to query weeks", Some(Box::new(e))))?;

        rows.into_iter().map(WeeklyStatsRow::into_stats).collect()
    }

    /// Claimers of one week, largest claim amount first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub async fn week_claimers(&self, week: U256, limit: u32) -> IndexerResult<Vec<PlayerWeeklyStats>> {
        let rows = sqlx::query_as::<_, PlayerWeeklyStatsRow>(
            r"
            SELECT * FROM player_weekly_stats
            WHERE week = ?
            ORDER BY LENGTH(weekly_claim_amount) DESC, weekly_claim_amount DESC, wallet ASC
            LIMIT ?
            ",
        )
        .bind(week.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to query week claimers", Some(Box::new(e))))?;

        rows.into_iter().map(PlayerWeeklyStatsRow::into_stats).collect()
    }

    /// Fetch one event record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn event_record(&self, id: &str) -> IndexerResult<Option<EventRecord>> {
        sqlx::query_as::<_, EventRecordRow>("SELECT * FROM event_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query event", Some(Box::new(e))))?
            .map(EventRecordRow::into_record)
            .transpose()
    }

    /// Number of stored event records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn event_count(&self) -> IndexerResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM event_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to count events", Some(Box::new(e))))?;

        u64::try_from(count)
            .map_err(|e| IndexerError::database("Negative event count", Some(Box::new(e))))
    }

    /// Full indexer state row for a chain.
    ///
    /// Returns `None` if no state exists (first run).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_state(&self, chain_id: u64) -> IndexerResult<Option<IndexerState>> {
        sqlx::query_as::<_, IndexerState>("SELECT * FROM indexer_state WHERE chain_id = ?")
            .bind(to_i64("chain_id", chain_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query indexer state", Some(Box::new(e))))
    }
}

// ==================== CHANGESET WRITES ====================

async fn insert_event(conn: &mut SqliteConnection, record: &EventRecord) -> IndexerResult<()> {
    let row = EventRecordRow::from_record(record)?;
    sqlx::query(
        r"
        INSERT INTO event_records (
            id, chain_id, contract, event_name, block_number,
            block_timestamp, log_index, fields, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&row.id)
    .bind(row.chain_id)
    .bind(&row.contract)
    .bind(&row.event_name)
    .bind(row.block_number)
    .bind(row.block_timestamp)
    .bind(row.log_index)
    .bind(&row.fields)
    .bind(row.created_at)
    .execute(conn)
    .await
    .map_err(|e| write_error(&format!("event {}", row.id), e))?;

    Ok(())
}

async fn upsert_global(conn: &mut SqliteConnection, stats: &GlobalStats) -> IndexerResult<()> {
    let row = GlobalStatsRow::from_stats(stats)?;
    sqlx::query(
        r"
        INSERT INTO global_stats (
            id, total_unique_players, key_purchase_events, keys_purchased,
            key_purchase_amount, weekly_claim_events, weekly_claim_amount,
            jackpot_claim_events, jackpot_claim_amount, total_claim_amount,
            net_profit_amount, updated_at_block, updated_at_timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            total_unique_players = excluded.total_unique_players,
            key_purchase_events = excluded.key_purchase_events,
            keys_purchased = excluded.keys_purchased,
            key_purchase_amount = excluded.key_purchase_amount,
            weekly_claim_events = excluded.weekly_claim_events,
            weekly_claim_amount = excluded.weekly_claim_amount,
            jackpot_claim_events = excluded.jackpot_claim_events,
            jackpot_claim_amount = excluded.jackpot_claim_amount,
            total_claim_amount = excluded.total_claim_amount,
            net_profit_amount = excluded.net_profit_amount,
            updated_at_block = excluded.updated_at_block,
            updated_at_timestamp = excluded.updated_at_timestamp
        ",
    )
    .bind(&row.id)
    .bind(&row.total_unique_players)
    .bind(&row.totals.key_purchase_events)
    .bind(&row.totals.keys_purchased)
    .bind(&row.totals.key_purchase_amount)
    .bind(&row.totals.weekly_claim_events)
    .bind(&row.totals.weekly_claim_amount)
    .bind(&row.totals.jackpot_claim_events)
    .bind(&row.totals.jackpot_claim_amount)
    .bind(&row.totals.total_claim_amount)
    .bind(&row.totals.net_profit_amount)
    .bind(row.updated_at_block)
    .bind(row.updated_at_timestamp)
    .execute(conn)
    .await
    .map_err(|e| write_error("global stats", e))?;

    Ok(())
}

/// Profile and first-seen columns are only written on insert.
async fn upsert_player(conn: &mut SqliteConnection, stats: &PlayerStats) -> IndexerResult<()> {
    let row = PlayerStatsRow::from_stats(stats)?;
    sqlx::query(
        r"
        INSERT INTO player_stats (
            wallet, profile_name, profile_image_url, profile_verification,
            profile_fetch_attempted, profile_fetched_at_timestamp,
            first_seen_block, first_seen_timestamp, updated_at_block, updated_at_timestamp,
            key_purchase_events, keys_purchased, key_purchase_amount,
            weekly_claim_events, weekly_claim_amount, jackpot_claim_events,
            jackpot_claim_amount, total_claim_amount, net_profit_amount
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (wallet) DO UPDATE SET
            updated_at_block = excluded.updated_at_block,
            updated_at_timestamp = excluded.updated_at_timestamp,
            key_purchase_events = excluded.key_purchase_events,
            keys_purchased = excluded.keys_purchased,
            key_purchase_amount = excluded.key_purchase_amount,
            weekly_claim_events = excluded.weekly_claim_events,
            weekly_claim_amount = excluded.weekly_claim_amount,
            jackpot_claim_events = excluded.jackpot_claim_events,
            jackpot_claim_amount = excluded.jackpot_claim_amount,
            total_claim_amount = excluded.total_claim_amount,
            net_profit_amount = excluded.net_profit_amount
        ",
    )
    .bind(&row.wallet)
    .bind(&row.profile_name)
    .bind(&row.profile_image_url)
    .bind(&row.profile_verification)
    .bind(row.profile_fetch_attempted)
    .bind(row.profile_fetched_at_timestamp)
    .bind(row.first_seen_block)
    .bind(row.first_seen_timestamp)
    .bind(row.updated_at_block)
    .bind(row.updated_at_timestamp)
    .bind(&row.totals.key_purchase_events)
    .bind(&row.totals.keys_purchased)
    .bind(&row.totals.key_purchase_amount)
    .bind(&row.totals.weekly_claim_events)
    .bind(&row.totals.weekly_claim_amount)
    .bind(&row.totals.jackpot_claim_events)
    .bind(&row.totals.jackpot_claim_amount)
    .bind(&row.totals.total_claim_amount)
    .bind(&row.totals.net_profit_amount)
    .execute(conn)
    .await
    .map_err(|e| write_error(&format!("player {}", row.wallet), e))?;

    Ok(())
}

async fn upsert_weekly(conn: &mut SqliteConnection, stats: &WeeklyStats) -> IndexerResult<()> {
    let row = WeeklyStatsRow::from_stats(stats)?;
    sqlx::query(
        r"
        INSERT INTO weekly_stats (
            id, week, weekly_claim_events, weekly_claim_amount,
            unique_claimers, updated_at_block, updated_at_timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            weekly_claim_events = excluded.weekly_claim_events,
            weekly_claim_amount = excluded.weekly_claim_amount,
            unique_claimers = excluded.unique_claimers,
            updated_at_block = excluded.updated_at_block,
            updated_at_timestamp = excluded.updated_at_timestamp
        ",
    )
    .bind(&row.id)
    .bind(&row.week)
    .bind(&row.weekly_claim_events)
    .bind(&row.weekly_claim_amount)
    .bind(&row.unique_claimers)
    .bind(row.updated_at_block)
    .bind(row.updated_at_timestamp)
    .execute(conn)
    .await
    .map_err(|e| write_error(&format!("week {}", row.id), e))?;

    Ok(())
}

async fn upsert_player_weekly(
    conn: &mut SqliteConnection,
    stats: &PlayerWeeklyStats,
) -> IndexerResult<()> {
    let row = PlayerWeeklyStatsRow::from_stats(stats)?;
    sqlx::query(
        r"
        INSERT INTO player_weekly_stats (
            id, wallet, week, weekly_claim_events, weekly_claim_amount,
            first_claim_block, first_claim_timestamp, last_claim_block, last_claim_timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            weekly_claim_events = excluded.weekly_claim_events,
            weekly_claim_amount = excluded.weekly_claim_amount,
            last_claim_block = excluded.last_claim_block,
            last_claim_timestamp = excluded.last_claim_timestamp
        ",
    )
    .bind(&row.id)
    .bind(&row.wallet)
    .bind(&row.week)
    .bind(&row.weekly_claim_events)
    .bind(&row.weekly_claim_amount)
    .bind(row.first_claim_block)
    .bind(row.first_claim_timestamp)
    .bind(row.last_claim_block)
    .bind(row.last_claim_timestamp)
    .execute(conn)
    .await
    .map_err(|e| write_error(&format!("player week {}", row.id), e))?;

    Ok(())
}

async fn upsert_jackpot(conn: &mut SqliteConnection, stats: &JackpotStats) -> IndexerResult<()> {
    let row = JackpotStatsRow::from_stats(stats)?;
    sqlx::query(
        r"
        INSERT INTO jackpot_stats (
            id, nonce, jackpot_claim_events, jackpot_claim_amount,
            unique_claimers, updated_at_block, updated_at_timestamp
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            jackpot_claim_events = excluded.jackpot_claim_events,
            jackpot_claim_amount = excluded.jackpot_claim_amount,
            unique_claimers = excluded.unique_claimers,
            updated_at_block = excluded.updated_at_block,
            updated_at_timestamp = excluded.updated_at_timestamp
        ",
    )
    .bind(&row.id)
    .bind(&row.nonce)
    .bind(&row.jackpot_claim_events)
    .bind(&row.jackpot_claim_amount)
    .bind(&row.unique_claimers)
    .bind(row.updated_at_block)
    .bind(row.updated_at_timestamp)
    .execute(conn)
    .await
    .map_err(|e| write_error(&format!("jackpot {}", row.id), e))?;

    Ok(())
}

async fn insert_jackpot_seen(
    conn: &mut SqliteConnection,
    seen: &JackpotPlayerSeen,
) -> IndexerResult<()> {
    let id = seen.id();
    sqlx::query("INSERT INTO jackpot_player_seen (id, nonce, wallet) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(seen.nonce.to_string())
        .bind(&seen.wallet)
        .execute(conn)
        .await
        .map_err(|e| write_error(&format!("jackpot seen-fact {id}"), e))?;

    Ok(())
}

#[async_trait]
impl AggregateStore for Repository {
    async fn global_stats(&self) -> IndexerResult<Option<GlobalStats>> {
        sqlx::query_as::<_, GlobalStatsRow>("SELECT * FROM global_stats WHERE id = ?")
            .bind(GLOBAL_STATS_ID)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query global stats", Some(Box::new(e))))?
            .map(GlobalStatsRow::into_stats)
            .transpose()
    }

    async fn player_stats(&self, wallet: &str) -> IndexerResult<Option<PlayerStats>> {
        sqlx::query_as::<_, PlayerStatsRow>("SELECT * FROM player_stats WHERE wallet = ?")
            .bind(wallet)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query player", Some(Box::new(e))))?
            .map(PlayerStatsRow::into_stats)
            .transpose()
    }

    async fn weekly_stats(&self, week: U256) -> IndexerResult<Option<WeeklyStats>> {
        sqlx::query_as::<_, WeeklyStatsRow>("SELECT * FROM weekly_stats WHERE id = ?")
            .bind(weekly_id(week))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query week", Some(Box::new(e))))?
            .map(WeeklyStatsRow::into_stats)
            .transpose()
    }

    async fn player_weekly_stats(
        &self,
        wallet: &str,
        week: U256,
    ) -> IndexerResult<Option<PlayerWeeklyStats>> {
        sqlx::query_as::<_, PlayerWeeklyStatsRow>("SELECT * FROM player_weekly_stats WHERE id = ?")
            .bind(player_weekly_id(wallet, week))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query player week", Some(Box::new(e))))?
            .map(PlayerWeeklyStatsRow::into_stats)
            .transpose()
    }

    async fn jackpot_stats(&self, nonce: U256) -> IndexerResult<Option<JackpotStats>> {
        sqlx::query_as::<_, JackpotStatsRow>("SELECT * FROM jackpot_stats WHERE id = ?")
            .bind(jackpot_id(nonce))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query jackpot", Some(Box::new(e))))?
            .map(JackpotStatsRow::into_stats)
            .transpose()
    }

    async fn jackpot_player_seen(&self, nonce: U256, wallet: &str) -> IndexerResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM jackpot_player_seen WHERE id = ?")
            .bind(jackpot_player_seen_id(nonce, wallet))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query seen-fact", Some(Box::new(e))))?;

        Ok(row.is_some())
    }

    async fn event_record_exists(&self, id: &str) -> IndexerResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM event_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::database("Failed to query event", Some(Box::new(e))))?;

        Ok(row.is_some())
    }

    #[instrument(skip(self, changes), fields(records = changes.len()))]
    async fn commit(&self, changes: Changeset) -> IndexerResult<()> {
        if changes.is_empty() {
            debug!("Empty changeset, skipping");
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexerError::database("Failed to start transaction", Some(Box::new(e))))?;

        // Write-once rows go first so a replay fails before touching aggregates.
        if let Some(event) = &changes.event {
            insert_event(&mut tx, event).await?;
        }
        if let Some(seen) = &changes.jackpot_seen {
            insert_jackpot_seen(&mut tx, seen).await?;
        }
        if let Some(global) = &changes.global {
            upsert_global(&mut tx, global).await?;
        }
        if let Some(player) = &changes.player {
            upsert_player(&mut tx, player).await?;
        }
        if let Some(weekly) = &changes.weekly {
            upsert_weekly(&mut tx, weekly).await?;
        }
        if let Some(player_weekly) = &changes.player_weekly {
            upsert_player_weekly(&mut tx, player_weekly).await?;
        }
        if let Some(jackpot) = &changes.jackpot {
            upsert_jackpot(&mut tx, jackpot).await?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexerError::database("Failed to commit transaction", Some(Box::new(e))))?;

        Ok(())
    }

    async fn cursor(&self, chain_id: u64) -> IndexerResult<Option<u64>> {
        self.get_state(chain_id)
            .await?
            .map(|state| to_u64("last_indexed_block", state.last_indexed_block))
            .transpose()
    }

    async fn save_cursor(&self, chain_id: u64, block: u64) -> IndexerResult<()> {
        sqlx::query(
            r"
            INSERT INTO indexer_state (chain_id, last_indexed_block, last_updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (chain_id) DO UPDATE SET
                last_indexed_block = excluded.last_indexed_block,
                last_updated_at = excluded.last_updated_at
            ",
        )
        .bind(to_i64("chain_id", chain_id)?)
        .bind(to_i64("last_indexed_block", block)?)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::database("Failed to update indexer state", Some(Box::new(e))))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::db::create_pool;
    use crate::events::Contract;
    use crate::stats::BlockMeta;

    const BLOCK: BlockMeta = BlockMeta::new(100, 1_700_000_000);

    async fn setup_test_db() -> Repository {
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        Repository::new(pool)
    }

    fn record(id: &str) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            chain_id: 2741,
            contract: Contract::KeyPurchase,
            event_name: "KeysPurchased".to_string(),
            block_number: BLOCK.number,
            block_timestamp: BLOCK.timestamp,
            log_index: 0,
            fields: BTreeMap::from([("buyer".to_string(), "0xabc".to_string())]),
        }
    }

    fn purchase_changes(id: &str, wallet: &str) -> Changeset {
        let mut global = GlobalStats::new(BLOCK);
        global.count_player(true).unwrap();
        global
            .totals
            .apply_purchase(U256::from(3u64), U256::from(30u64))
            .unwrap();

        let mut player = PlayerStats::new(wallet, BLOCK);
        player
            .totals
            .apply_purchase(U256::from(3u64), U256::from(30u64))
            .unwrap();

        Changeset {
            event: Some(record(id)),
            global: Some(global),
            player: Some(player),
            ..Changeset::default()
        }
    }

    #[tokio::test]
    async fn test_commit_and_read_back() {
        let repo = setup_test_db().await;

        repo.commit(purchase_changes("2741_100_0", "0xabc")).await.unwrap();

        let global = repo.global_stats().await.unwrap().unwrap();
        assert_eq!(global.total_unique_players, U256::from(1u64));
        assert_eq!(global.totals.net_profit_amount.to_string(), "-30");

        let player = repo.player_stats("0xabc").await.unwrap().unwrap();
        assert_eq!(player.totals.keys_purchased.to_string(), "3");
        assert!(repo.event_record_exists("2741_100_0").await.unwrap());
        assert_eq!(repo.event_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_rolls_back_whole_changeset() {
        let repo = setup_test_db().await;
        repo.commit(purchase_changes("2741_100_0", "0xabc")).await.unwrap();

        // Same event id, different player: nothing from it may land.
        let err = repo
            .commit(purchase_changes("2741_100_0", "0xdef"))
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::StateError { .. }));
        assert!(repo.player_stats("0xdef").await.unwrap().is_none());
        assert_eq!(repo.event_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_player_update_keeps_profile_and_first_seen() {
        let repo = setup_test_db().await;
        let mut player = PlayerStats::new("0xabc", BLOCK);
        player.profile.name = Some("alice".to_string());
        player.profile.fetch_attempted = true;
        repo.commit(Changeset {
            player: Some(player.clone()),
            ..Changeset::default()
        })
        .await
        .unwrap();

        let later = BlockMeta::new(200, 1_700_000_100);
        player.profile.name = None;
        player.first_seen_block = later.number;
        player.touch(later);
        player.totals.apply_weekly_claim(U256::from(50u64)).unwrap();
        repo.commit(Changeset {
            player: Some(player),
            ..Changeset::default()
        })
        .await
        .unwrap();

        let stored = repo.player_stats("0xabc").await.unwrap().unwrap();
        assert_eq!(stored.profile.name.as_deref(), Some("alice"));
        assert_eq!(stored.first_seen_block, BLOCK.number);
        assert_eq!(stored.updated_at_block, later.number);
        assert_eq!(stored.totals.weekly_claim_amount.to_string(), "50");
    }

    #[tokio::test]
    async fn test_jackpot_seen_fact_is_write_once() {
        let repo = setup_test_db().await;
        let seen = JackpotPlayerSeen {
            nonce: U256::from(4u64),
            wallet: "0xabc".to_string(),
        };
        let changes = Changeset {
            jackpot_seen: Some(seen.clone()),
            ..Changeset::default()
        };

        repo.commit(changes.clone()).await.unwrap();
        assert!(repo.jackpot_player_seen(U256::from(4u64), "0xabc").await.unwrap());
        assert!(!repo.jackpot_player_seen(U256::from(5u64), "0xabc").await.unwrap());
        assert!(repo.commit(changes).await.is_err());
    }

    #[tokio::test]
    async fn test_top_players_sorts_numerically() {
        let repo = setup_test_db().await;
        for (wallet, amount) in [("0xa", 9u64), ("0xb", 100), ("0xc", 20)] {
            let mut player = PlayerStats::new(wallet, BLOCK);
            player
                .totals
                .apply_purchase(U256::from(1u64), U256::from(amount))
                .unwrap();
            repo.commit(Changeset {
                player: Some(player),
                ..Changeset::default()
            })
            .await
            .unwrap();
        }

        let wallets: Vec<_> = repo
            .top_players(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.wallet)
            .collect();
        assert_eq!(wallets, vec!["0xb", "0xc", "0xa"]);
    }

    #[tokio::test]
    async fn test_cursor_management() {
        let repo = setup_test_db().await;
        assert_eq!(repo.cursor(2741).await.unwrap(), None);

        repo.save_cursor(2741, 500).await.unwrap();
        repo.save_cursor(2741, 900).await.unwrap();

        assert_eq!(repo.cursor(2741).await.unwrap(), Some(900));
        assert_eq!(repo.cursor(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("indexer.db").display());

        {
            let repo = Repository::new(create_pool(&url).await.unwrap());
            repo.commit(purchase_changes("2741_100_0", "0xabc")).await.unwrap();
            repo.save_cursor(2741, 100).await.unwrap();
            repo.pool().close().await;
        }

        let repo = Repository::new(create_pool(&url).await.unwrap());
        assert_eq!(repo.cursor(2741).await.unwrap(), Some(100));
        assert!(repo.player_stats("0xabc").await.unwrap().is_some());
    }
}
