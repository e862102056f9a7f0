use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{Fetched, Profile};

/// Wallet to profile cache that only keeps cache-worthy results.
#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: RwLock<HashMap<String, Profile>>,
}

impl ProfileCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached profile for `wallet`, if any.
    pub async fn get(&self, wallet: &str) -> Option<Profile> {
        self.entries.read().await.get(wallet).cloned()
    }

    /// Store `fetched` under `wallet` if it is cache-worthy.
    ///
    /// Returns whether the entry was stored.
    pub async fn remember(&self, wallet: &str, fetched: &Fetched) -> bool {
        if !fetched.cacheable {
            return false;
        }
        self.entries
            .write()
            .await
            .insert(wallet.to_string(), fetched.profile.clone());
        true
    }

    /// Number of cached wallets.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
