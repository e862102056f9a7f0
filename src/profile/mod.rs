//! Identity profile enrichment for newly seen wallets.
//!
//! A lookup is three layers composed by [`CachedProfileLookup`]:
//!
//! 1. [`ProfileCache`]: remembers results marked cache-worthy
//! 2. [`RateGate`]: process-wide limit on outbound calls, excess callers wait
//! 3. [`ProfileSource`]: the raw fetch, which classifies its own result
//!
//! Lookups never fail. Every error path degrades to [`Profile::not_found`],
//! and only transient failures (5xx, 429, transport, timeout) are kept out of
//! the cache so a later lookup can retry.
//!
//! ## Example
//!
//! ```no_run
//! use keyvault_indexer::profile::{CachedProfileLookup, ProfileLookup, ProfileLookupConfig};
//!
//! # async fn example() -> keyvault_indexer::error::IndexerResult<()> {
//! let lookup = CachedProfileLookup::from_config(&ProfileLookupConfig::default())?;
//! let profile = lookup.lookup("0xAbC0000000000000000000000000000000000001").await;
//! if profile.found {
//!     println!("{} {}", profile.name, profile.image_url);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod rate_limit;
mod source;

pub use cache::ProfileCache;
pub use rate_limit::RateGate;
pub use source::{
    avatar_url, is_transient_status, parse_profile, Fetched, HttpProfileSource, ProfileSource,
};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::IndexerResult;
use crate::stats::normalize_wallet;

/// Default profile endpoint; the wallet is appended as a path segment.
pub const DEFAULT_PROFILE_BASE_URL: &str = "https://backend.portal.abs.xyz/api/user/address";

/// Default outbound calls per second.
pub const DEFAULT_RATE_PER_SECOND: u32 = 10;

/// Default timeout for one outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a profile lookup. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Whether the profile service returned usable data
    pub found: bool,
    /// Display name (trimmed)
    pub name: String,
    /// Avatar image URL
    pub image_url: String,
    /// Verification tier
    pub verification: String,
}

impl Profile {
    /// The degraded result returned for every failure.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Settings for the profile service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLookupConfig {
    /// Endpoint the wallet is appended to
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>` when set
    pub bearer_token: Option<String>,
    /// `User-Agent` header
    pub user_agent: String,
    /// `Referer` header
    pub referer: String,
    /// Timeout for one call
    pub timeout: Duration,
    /// Outbound calls allowed per second
    pub rate_per_second: u32,
}

impl Default for ProfileLookupConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROFILE_BASE_URL.to_string(),
            bearer_token: None,
            user_agent: concat!("keyvault-indexer/", env!("CARGO_PKG_VERSION")).to_string(),
            referer: "https://portal.abs.xyz/".to_string(),
            timeout: DEFAULT_TIMEOUT,
            rate_per_second: DEFAULT_RATE_PER_SECOND,
        }
    }
}

/// Wallet to profile resolution used during player creation.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Resolve `wallet`. Never fails; failures return [`Profile::not_found`].
    async fn lookup(&self, wallet: &str) -> Profile;
}

/// Cache in front of a rate-limited [`ProfileSource`].
pub struct CachedProfileLookup<S> {
    source: S,
    cache: ProfileCache,
    gate: RateGate,
}

impl CachedProfileLookup<HttpProfileSource> {
    /// Build the HTTP-backed lookup from configuration.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error if the client cannot be built.
    pub fn from_config(config: &ProfileLookupConfig) -> IndexerResult<Self> {
        let source = HttpProfileSource::new(config)?;
        Ok(Self::new(source, config.rate_per_second))
    }
}

impl<S: ProfileSource> CachedProfileLookup<S> {
    /// Wrap `source` with a cache and a `rate_per_second` gate.
    pub fn new(source: S, rate_per_second: u32) -> Self {
        Self {
            source,
            cache: ProfileCache::new(),
            gate: RateGate::per_second(rate_per_second),
        }
    }

    /// The underlying cache.
    pub const fn cache(&self) -> &ProfileCache {
        &self.cache
    }
}

#[async_trait]
impl<S: ProfileSource> ProfileLookup for CachedProfileLookup<S> {
    #[instrument(skip(self), fields(wallet = %wallet))]
    async fn lookup(&self, wallet: &str) -> Profile {
        let key = normalize_wallet(wallet);

        if let Some(profile) = self.cache.get(&key).await {
            debug!(found = profile.found, "profile cache hit");
            return profile;
        }

        self.gate.wait().await;
        let fetched = self.source.fetch(&key).await;
        debug!(
            found = fetched.profile.found,
            cacheable = fetched.cacheable,
            "profile fetched"
        );

        self.cache.remember(&key, &fetched).await;
        fetched.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        result: Fetched,
    }

    #[async_trait]
    impl ProfileSource for CountingSource {
        async fn fetch(&self, _wallet: &str) -> Fetched {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn named(name: &str) -> Profile {
        Profile {
            found: true,
            name: name.to_string(),
            image_url: String::new(),
            verification: String::new(),
        }
    }

    #[tokio::test]
    async fn test_cacheable_result_is_fetched_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CachedProfileLookup::new(
            CountingSource {
                calls: Arc::clone(&calls),
                result: Fetched::cacheable(named("alice")),
            },
            100,
        );

        let first = lookup.lookup("0xABC").await;
        let second = lookup.lookup("0xabc").await;

        assert_eq!(first, named("alice"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_result_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CachedProfileLookup::new(
            CountingSource {
                calls: Arc::clone(&calls),
                result: Fetched::transient(),
            },
            100,
        );

        assert!(!lookup.lookup("0xabc").await.found);
        assert!(!lookup.lookup("0xabc").await.found);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(lookup.cache().is_empty().await);
    }

    #[test]
    fn test_default_config() {
        let config = ProfileLookupConfig::default();
        assert_eq!(config.base_url, DEFAULT_PROFILE_BASE_URL);
        assert_eq!(config.rate_per_second, 10);
        assert!(config.bearer_token.is_none());
    }
}
