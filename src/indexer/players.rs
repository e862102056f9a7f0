use tracing::{debug, info};

use crate::error::IndexerResult;
use crate::profile::{Profile, ProfileLookup};
use crate::stats::{BlockMeta, PlayerProfile, PlayerStats};
use crate::store::AggregateStore;

/// A player record and whether it was created for this event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct PlayerEntry {
    pub stats: PlayerStats,
    pub is_new: bool,
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn enrich(profile: Profile, block: BlockMeta) -> PlayerProfile {
    PlayerProfile {
        name: non_empty(profile.name),
        image_url: non_empty(profile.image_url),
        verification: non_empty(profile.verification),
        fetch_attempted: true,
        fetched_at_timestamp: Some(block.timestamp),
    }
}

/// Existing player for `wallet`, or a new zeroed one with its profile
/// resolved.
///
/// Nothing is written; the caller commits the returned record. The profile is
/// looked up only when the player does not exist yet, and lookups cannot fail.
pub(super) async fn load_or_create<S, P>(
    store: &S,
    profiles: &P,
    wallet: &str,
    block: BlockMeta,
) -> IndexerResult<PlayerEntry>
where
    S: AggregateStore + ?Sized,
    P: ProfileLookup + ?Sized,
{
    if let Some(stats) = store.player_stats(wallet).await? {
        return Ok(PlayerEntry {
            stats,
            is_new: false,
        });
    }

    let profile = profiles.lookup(wallet).await;
    if profile.found {
        info!(wallet, name = %profile.name, "new player with profile");
    } else {
        debug!(wallet, "new player without profile");
    }

    let mut stats = PlayerStats::new(wallet, block);
    stats.profile = enrich(profile, block);
    Ok(PlayerEntry {
        stats,
        is_new: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Changeset, MemoryStore};
    use async_trait::async_trait;

    struct FixedProfile(Profile);

    #[async_trait]
    impl ProfileLookup for FixedProfile {
        async fn lookup(&self, _wallet: &str) -> Profile {
            self.0.clone()
        }
    }

    const BLOCK: BlockMeta = BlockMeta::new(7, 70);

    #[tokio::test]
    async fn test_new_player_gets_profile_and_fetch_stamp() {
        let store = MemoryStore::new();
        let profiles = FixedProfile(Profile {
            found: true,
            name: "alice".to_string(),
            image_url: String::new(),
            verification: "verified".to_string(),
        });

        let entry = load_or_create(&store, &profiles, "0xabc", BLOCK).await.unwrap();

        assert!(entry.is_new);
        assert_eq!(entry.stats.profile.name.as_deref(), Some("alice"));
        assert_eq!(entry.stats.profile.image_url, None);
        assert_eq!(entry.stats.profile.verification.as_deref(), Some("verified"));
        assert!(entry.stats.profile.fetch_attempted);
        assert_eq!(entry.stats.profile.fetched_at_timestamp, Some(70));
        assert_eq!(entry.stats.first_seen_block, 7);
    }

    #[tokio::test]
    async fn test_failed_lookup_still_marks_attempt() {
        let store = MemoryStore::new();
        let entry = load_or_create(&store, &FixedProfile(Profile::not_found()), "0xabc", BLOCK)
            .await
            .unwrap();

        assert_eq!(entry.stats.profile.name, None);
        assert!(entry.stats.profile.fetch_attempted);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent_without_update() {
        let store = MemoryStore::new();
        let profiles = FixedProfile(Profile::not_found());

        let first = load_or_create(&store, &profiles, "0xabc", BLOCK).await.unwrap();
        let second = load_or_create(&store, &profiles, "0xabc", BLOCK).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existing_player_is_not_refetched() {
        let store = MemoryStore::new();
        let mut existing = PlayerStats::new("0xabc", BlockMeta::new(1, 10));
        existing.profile.name = Some("old".to_string());
        store
            .commit(Changeset {
                player: Some(existing.clone()),
                ..Changeset::default()
            })
            .await
            .unwrap();

        let profiles = FixedProfile(Profile {
            found: true,
            name: "new".to_string(),
            ..Profile::default()
        });
        let entry = load_or_create(&store, &profiles, "0xabc", BLOCK).await.unwrap();

        assert!(!entry.is_new);
        assert_eq!(entry.stats, existing);
    }
}
