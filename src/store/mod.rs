//! Aggregate storage abstraction.
//!
//! [`AggregateStore`] is the single seam between the event handlers and
//! persistence. Handlers read the records an event touches, compute the new
//! values in memory, and hand everything back as one [`Changeset`]. A store
//! must apply a changeset atomically: either every record in it is written,
//! or none is.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`] for tests and dry runs
//! - [`crate::db::Repository`] backed by `SQLite`

mod memory;

pub use memory::MemoryStore;

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::error::IndexerResult;
use crate::events::EventRecord;
use crate::stats::{
    GlobalStats, JackpotPlayerSeen, JackpotStats, PlayerStats, PlayerWeeklyStats, WeeklyStats,
};

/// Every write produced by handling one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    /// Verbatim record of the event; its id marks the event as applied
    pub event: Option<EventRecord>,
    /// Updated global totals
    pub global: Option<GlobalStats>,
    /// Created or updated player
    pub player: Option<PlayerStats>,
    /// Created or updated week
    pub weekly: Option<WeeklyStats>,
    /// Created or updated player-week
    pub player_weekly: Option<PlayerWeeklyStats>,
    /// Created or updated jackpot
    pub jackpot: Option<JackpotStats>,
    /// Newly created seen-fact
    pub jackpot_seen: Option<JackpotPlayerSeen>,
}

impl Changeset {
    /// Number of records this changeset writes.
    #[must_use]
    pub fn len(&self) -> usize {
        [
            self.event.is_some(),
            self.global.is_some(),
            self.player.is_some(),
            self.weekly.is_some(),
            self.player_weekly.is_some(),
            self.jackpot.is_some(),
            self.jackpot_seen.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    /// Whether the changeset writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyed access to the aggregate entities.
///
/// Getters return `Ok(None)` when a record has never been written. Wallet
/// arguments are expected to be normalized already.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Fetch the singleton global totals.
    async fn global_stats(&self) -> IndexerResult<Option<GlobalStats>>;

    /// Fetch one player.
    async fn player_stats(&self, wallet: &str) -> IndexerResult<Option<PlayerStats>>;

    /// Fetch one week.
    async fn weekly_stats(&self, week: U256) -> IndexerResult<Option<WeeklyStats>>;

    /// Fetch one wallet's totals for a week.
    async fn player_weekly_stats(
        &self,
        wallet: &str,
        week: U256,
    ) -> IndexerResult<Option<PlayerWeeklyStats>>;

    /// Fetch one jackpot round.
    async fn jackpot_stats(&self, nonce: U256) -> IndexerResult<Option<JackpotStats>>;

    /// Whether `wallet` has already been counted for jackpot `nonce`.
    async fn jackpot_player_seen(&self, nonce: U256, wallet: &str) -> IndexerResult<bool>;

    /// Whether an event with this id has already been applied.
    async fn event_record_exists(&self, id: &str) -> IndexerResult<bool>;

    /// Apply every write in `changes` atomically.
    async fn commit(&self, changes: Changeset) -> IndexerResult<()>;

    /// Last block fully ingested for `chain_id`.
    async fn cursor(&self, chain_id: u64) -> IndexerResult<Option<u64>>;

    /// Record that every block up to `block` has been ingested.
    async fn save_cursor(&self, chain_id: u64, block: u64) -> IndexerResult<()>;
}
