//! "First time seen" facts for jackpot claimers.
//!
//! A wallet bumps a jackpot's `uniqueClaimers` only on its first claim of
//! that nonce. Players and weekly claimers need no fact of their own: their
//! first sighting is the absence of the `PlayerStats` or `PlayerWeeklyStats`
//! record the handler loads and writes anyway. A jackpot has no per-player
//! aggregate, so the pair is tracked by a write-once [`JackpotPlayerSeen`].

use alloy::primitives::U256;

use crate::error::IndexerResult;
use crate::stats::JackpotPlayerSeen;
use crate::store::AggregateStore;

/// Read side of the jackpot seen-facts over an [`AggregateStore`].
pub struct UniquenessTracker<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: AggregateStore + ?Sized> UniquenessTracker<'a, S> {
    /// Track uniqueness against `store`.
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Whether `wallet` has already been counted for jackpot `nonce`.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn has_seen(&self, nonce: U256, wallet: &str) -> IndexerResult<bool> {
        self.store.jackpot_player_seen(nonce, wallet).await
    }

    /// The fact to commit on `wallet`'s first claim of `nonce`, or `None`
    /// when it was already `seen`.
    #[must_use]
    pub fn first_sighting(nonce: U256, wallet: &str, seen: bool) -> Option<JackpotPlayerSeen> {
        (!seen).then(|| JackpotPlayerSeen {
            nonce,
            wallet: wallet.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Changeset, MemoryStore};

    #[tokio::test]
    async fn test_unseen_on_empty_store() {
        let store = MemoryStore::new();
        let tracker = UniquenessTracker::new(&store);

        assert!(!tracker.has_seen(U256::from(42u64), "0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn test_fact_marks_only_its_pair() {
        let store = MemoryStore::new();
        let nonce = U256::from(42u64);
        let fact = UniquenessTracker::<MemoryStore>::first_sighting(nonce, "0xabc", false).unwrap();
        assert_eq!(fact.id(), "42_0xabc");

        store
            .commit(Changeset {
                jackpot_seen: Some(fact),
                ..Changeset::default()
            })
            .await
            .unwrap();

        let tracker = UniquenessTracker::new(&store);
        assert!(tracker.has_seen(nonce, "0xabc").await.unwrap());
        assert!(!tracker.has_seen(nonce, "0xdef").await.unwrap());
        assert!(!tracker.has_seen(U256::from(43u64), "0xabc").await.unwrap());
    }

    #[test]
    fn test_repeat_claim_writes_no_fact() {
        let fact = UniquenessTracker::<MemoryStore>::first_sighting(U256::from(1u64), "0xabc", true);
        assert!(fact.is_none());
    }
}
