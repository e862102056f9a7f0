use std::collections::{HashMap, HashSet};

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AggregateStore, Changeset};
use crate::error::{IndexerError, IndexerResult};
use crate::events::EventRecord;
use crate::stats::{
    jackpot_id, jackpot_player_seen_id, player_weekly_id, weekly_id, GlobalStats, JackpotStats,
    PlayerStats, PlayerWeeklyStats, WeeklyStats,
};

#[derive(Debug, Default)]
struct Tables {
    global: Option<GlobalStats>,
    players: HashMap<String, PlayerStats>,
    weeks: HashMap<String, WeeklyStats>,
    player_weeks: HashMap<String, PlayerWeeklyStats>,
    jackpots: HashMap<String, JackpotStats>,
    jackpot_seen: HashSet<String>,
    events: HashMap<String, EventRecord>,
    cursors: HashMap<u64, u64>,
}

/// In-process [`AggregateStore`].
///
/// All tables sit behind one lock, so a commit is observed all at once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored event record by id.
    pub async fn event_record(&self, id: &str) -> Option<EventRecord> {
        self.tables.read().await.events.get(id).cloned()
    }

    /// Number of stored event records.
    pub async fn event_count(&self) -> usize {
        self.tables.read().await.events.len()
    }

    /// Number of stored players.
    pub async fn player_count(&self) -> usize {
        self.tables.read().await.players.len()
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn global_stats(&self) -> IndexerResult<Option<GlobalStats>> {
        Ok(self.tables.read().await.global.clone())
    }

    async fn player_stats(&self, wallet: &str) -> IndexerResult<Option<PlayerStats>> {
        Ok(self.tables.read().await.players.get(wallet).cloned())
    }

    async fn weekly_stats(&self, week: U256) -> IndexerResult<Option<WeeklyStats>> {
        Ok(self.tables.read().await.weeks.get(&weekly_id(week)).cloned())
    }

    async fn player_weekly_stats(
        &self,
        wallet: &str,
        week: U256,
    ) -> IndexerResult<Option<PlayerWeeklyStats>> {
        let id = player_weekly_id(wallet, week);
        Ok(self.tables.read().await.player_weeks.get(&id).cloned())
    }

    async fn jackpot_stats(&self, nonce: U256) -> IndexerResult<Option<JackpotStats>> {
        Ok(self
            .tables
            .read()
            .await
            .jackpots
            .get(&jackpot_id(nonce))
            .cloned())
    }

    async fn jackpot_player_seen(&self, nonce: U256, wallet: &str) -> IndexerResult<bool> {
        let id = jackpot_player_seen_id(nonce, wallet);
        Ok(self.tables.read().await.jackpot_seen.contains(&id))
    }

    async fn event_record_exists(&self, id: &str) -> IndexerResult<bool> {
        Ok(self.tables.read().await.events.contains_key(id))
    }

    async fn commit(&self, changes: Changeset) -> IndexerResult<()> {
        let mut tables = self.tables.write().await;

        // Write-once records are checked before anything is applied.
        if let Some(event) = &changes.event {
            if tables.events.contains_key(&event.id) {
                return Err(IndexerError::state(
                    format!("Event {} already recorded", event.id),
                    None,
                ));
            }
        }
        if let Some(seen) = &changes.jackpot_seen {
            if tables.jackpot_seen.contains(&seen.id()) {
                return Err(IndexerError::state(
                    format!("Jackpot seen-fact {} already exists", seen.id()),
                    None,
                ));
            }
        }

        if let Some(event) = changes.event {
            tables.events.insert(event.id.clone(), event);
        }
        if let Some(global) = changes.global {
            tables.global = Some(global);
        }
        if let Some(player) = changes.player {
            tables.players.insert(player.wallet.clone(), player);
        }
        if let Some(weekly) = changes.weekly {
            tables.weeks.insert(weekly.id(), weekly);
        }
        if let Some(player_weekly) = changes.player_weekly {
            tables.player_weeks.insert(player_weekly.id(), player_weekly);
        }
        if let Some(jackpot) = changes.jackpot {
            tables.jackpots.insert(jackpot.id(), jackpot);
        }
        if let Some(seen) = changes.jackpot_seen {
            tables.jackpot_seen.insert(seen.id());
        }

        Ok(())
    }

    async fn cursor(&self, chain_id: u64) -> IndexerResult<Option<u64>> {
        Ok(self.tables.read().await.cursors.get(&chain_id).copied())
    }

    async fn save_cursor(&self, chain_id: u64, block: u64) -> IndexerResult<()> {
        self.tables.write().await.cursors.insert(chain_id, block);
        Ok(())
    }
}
