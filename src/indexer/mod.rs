//! Event dispatch and aggregate updates.
//!
//! The [`Indexer`] is the single writer. Each event is handled to completion,
//! reads and profile enrichment included, before the next one starts:
//!
//! 1. Skip the event if its record already exists (redelivery after a restart)
//! 2. Read every aggregate the event touches, concurrently
//! 3. Compute the new values in memory
//! 4. Commit the event record and all updated aggregates as one [`Changeset`]
//!
//! Administrative events go through the same path with an empty changeset,
//! so the only write is their verbatim record.

mod claims;
mod players;
mod purchases;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::error::IndexerResult;
use crate::events::{sort_canonical, ChainEvent, EventKind};
use crate::profile::ProfileLookup;
use crate::stats::{BlockMeta, GlobalStats};
use crate::store::{AggregateStore, Changeset};

/// What [`Indexer::handle`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The event was applied and recorded
    Applied,
    /// The event had already been applied and was skipped
    Duplicate,
}

/// Counts for a handled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Events applied
    pub applied: u64,
    /// Events skipped as already applied
    pub duplicates: u64,
}

impl BatchSummary {
    fn record(&mut self, outcome: HandleOutcome) {
        match outcome {
            HandleOutcome::Applied => self.applied += 1,
            HandleOutcome::Duplicate => self.duplicates += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.duplicates += other.duplicates;
    }
}

/// Events from one fetched block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestBatch {
    /// Chain the range belongs to
    pub chain_id: u64,
    /// Last block of the range; saved as the cursor once the batch is applied
    pub to_block: u64,
    /// Decoded events, in any order
    pub events: Vec<ChainEvent>,
}

/// Single-writer event processor.
pub struct Indexer<S, P> {
    store: S,
    profiles: P,
}

impl<S: AggregateStore, P: ProfileLookup> Indexer<S, P> {
    /// Create an indexer writing to `store` and enriching through `profiles`.
    pub const fn new(store: S, profiles: P) -> Self {
        Self { store, profiles }
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns store failures and counter overflows. Nothing is written when
    /// an error is returned.
    #[instrument(skip(self, event), fields(event_id = %event.id(), kind = event.kind.name()))]
    pub async fn handle(&self, event: &ChainEvent) -> IndexerResult<HandleOutcome> {
        let id = event.id();
        if self.store.event_record_exists(&id).await? {
            debug!("event already applied, skipping");
            return Ok(HandleOutcome::Duplicate);
        }

        let block = event.block();
        let mut changes = match &event.kind {
            EventKind::KeysPurchased(purchase) => {
                purchases::apply(&self.store, &self.profiles, purchase, block).await?
            }
            EventKind::WeeklyClaimed(claim) => {
                claims::apply_weekly(&self.store, &self.profiles, claim, block).await?
            }
            EventKind::JackpotClaimed(claim) => {
                claims::apply_jackpot(&self.store, &self.profiles, claim, block).await?
            }
            _ => Changeset::default(),
        };
        changes.event = Some(event.to_record());

        debug!(writes = changes.len(), "committing changeset");
        self.store.commit(changes).await?;
        Ok(HandleOutcome::Applied)
    }

    /// Apply a batch in canonical chain order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing event. Events before it stay applied.
    pub async fn handle_batch(&self, mut events: Vec<ChainEvent>) -> IndexerResult<BatchSummary> {
        sort_canonical(&mut events);

        let mut summary = BatchSummary::default();
        for event in &events {
            summary.record(self.handle(event).await?);
        }
        Ok(summary)
    }

    /// Drain `batches` until the sender is dropped, saving the cursor after
    /// each batch.
    ///
    /// # Errors
    ///
    /// Stops at the first failing event or cursor write.
    pub async fn run(&self, mut batches: mpsc::Receiver<IngestBatch>) -> IndexerResult<BatchSummary> {
        let mut total = BatchSummary::default();

        while let Some(batch) = batches.recv().await {
            let count = batch.events.len();
            let summary = self.handle_batch(batch.events).await?;
            self.store.save_cursor(batch.chain_id, batch.to_block).await?;

            if count > 0 {
                info!(
                    "Applied {} events up to block {} ({} duplicates)",
                    summary.applied, batch.to_block, summary.duplicates
                );
            } else {
                debug!("No events up to block {}", batch.to_block);
            }
            total.merge(summary);
        }

        info!("Event channel closed after {} events", total.applied);
        Ok(total)
    }
}

/// Global totals, or a zeroed record stamped with `block`.
async fn load_global<S: AggregateStore + ?Sized>(
    store: &S,
    block: BlockMeta,
) -> IndexerResult<GlobalStats> {
    Ok(store
        .global_stats()
        .await?
        .unwrap_or_else(|| GlobalStats::new(block)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Contract, KeysPurchased};
    use crate::profile::Profile;
    use crate::store::MemoryStore;
    use alloy::primitives::U256;
    use async_trait::async_trait;

    struct NoProfiles;

    #[async_trait]
    impl ProfileLookup for NoProfiles {
        async fn lookup(&self, _wallet: &str) -> Profile {
            Profile::not_found()
        }
    }

    fn event(block: u64, log_index: u64, kind: EventKind) -> ChainEvent {
        ChainEvent {
            chain_id: 2741,
            block_number: block,
            block_timestamp: block * 10,
            log_index,
            contract: Contract::KeyPurchase,
            kind,
        }
    }

    fn purchase(block: u64, log_index: u64) -> ChainEvent {
        event(
            block,
            log_index,
            EventKind::KeysPurchased(KeysPurchased {
                buyer: "0xAbC0000000000000000000000000000000000001".to_string(),
                quantity: U256::from(1u64),
                price_per_key: U256::from(10u64),
                total_paid: U256::from(10u64),
            }),
        )
    }

    #[tokio::test]
    async fn test_admin_event_writes_only_its_record() {
        let indexer = Indexer::new(MemoryStore::new(), NoProfiles);
        let paused = event(5, 1, EventKind::PauseStatusChanged { paused: true });

        let outcome = indexer.handle(&paused).await.unwrap();

        assert_eq!(outcome, HandleOutcome::Applied);
        assert!(indexer.store().global_stats().await.unwrap().is_none());
        let record = indexer.store().event_record("2741_5_1").await.unwrap();
        assert_eq!(record.event_name, "PauseStatusChanged");
        assert_eq!(record.fields.get("paused").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_redelivered_event_is_skipped() {
        let indexer = Indexer::new(MemoryStore::new(), NoProfiles);
        let first = purchase(5, 0);

        assert_eq!(indexer.handle(&first).await.unwrap(), HandleOutcome::Applied);
        assert_eq!(
            indexer.handle(&first).await.unwrap(),
            HandleOutcome::Duplicate
        );

        let global = indexer.store().global_stats().await.unwrap().unwrap();
        assert_eq!(global.totals.key_purchase_events, U256::from(1u64));
    }

    #[tokio::test]
    async fn test_batch_is_applied_in_chain_order() {
        let indexer = Indexer::new(MemoryStore::new(), NoProfiles);

        let summary = indexer
            .handle_batch(vec![purchase(9, 0), purchase(3, 2), purchase(3, 1)])
            .await
            .unwrap();
        assert_eq!(summary.applied, 3);

        let global = indexer.store().global_stats().await.unwrap().unwrap();
        assert_eq!(global.updated_at_block, 9);
        let player = indexer
            .store()
            .player_stats("0xabc0000000000000000000000000000000000001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(player.first_seen_block, 3);
    }

    #[tokio::test]
    async fn test_run_saves_cursor_after_each_batch() {
        let indexer = Indexer::new(MemoryStore::new(), NoProfiles);
        let (tx, rx) = mpsc::channel(4);

        tx.send(IngestBatch {
            chain_id: 2741,
            to_block: 10,
            events: vec![purchase(4, 0)],
        })
        .await
        .unwrap();
        tx.send(IngestBatch {
            chain_id: 2741,
            to_block: 20,
            events: vec![purchase(4, 0), purchase(15, 0)],
        })
        .await
        .unwrap();
        drop(tx);

        let total = indexer.run(rx).await.unwrap();

        assert_eq!(total.applied, 2);
        assert_eq!(total.duplicates, 1);
        assert_eq!(indexer.store().cursor(2741).await.unwrap(), Some(20));
    }
}
