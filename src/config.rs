//! Configuration management for the key vault indexer.
//!
//! This module loads and validates configuration from environment variables
//! using the `dotenvy` crate. All operations return [`IndexerResult`].
//!
//! ## Environment Variables
//!
//! Required by the `index` command:
//! - `RPC_URL`: HTTP RPC endpoint
//! - `KEY_PURCHASE_ADDRESS`: `KeyPurchase` contract address
//! - `CLAIM_VAULT_ADDRESS`: `ClaimVault` contract address
//!
//! Optional (with defaults):
//! - `CHAIN_ID`: Chain to index (default: 2741)
//! - `START_BLOCK`: First block when no cursor is stored (default: 0)
//! - `BATCH_SIZE`: Maximum blocks per `eth_getLogs` query (default: 1000)
//! - `POLL_INTERVAL_SECS`: Delay between polls at the chain head (default: 5)
//! - `DATABASE_URL`: `SQLite` database (default: "sqlite:./indexer.db")
//! - `PROFILE_API_BASE_URL`: Profile service endpoint
//! - `PROFILE_API_TOKEN`: Bearer token for the profile service
//! - `PROFILE_USER_AGENT`, `PROFILE_REFERER`: Profile request headers
//! - `PROFILE_RATE_LIMIT_PER_SEC`: Outbound profile calls per second (default: 10)
//! - `PROFILE_TIMEOUT_SECS`: Profile request timeout (default: 10)
//! - `API_PORT`: Read API port (default: 3000)
//! - `API_RATE_LIMIT_RPM`: Read API requests per minute (default: 600)
//! - `CORS_ORIGINS`: Comma-separated allowed origins (default: any)
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use keyvault_indexer::config::Config;
//! use keyvault_indexer::error::IndexerResult;
//!
//! # fn main() -> IndexerResult<()> {
//! let config = Config::from_env()?;
//! println!("Database: {}", config.database_url());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::error::{IndexerError, IndexerResult};
use crate::events::ContractAddresses;
use crate::profile::{ProfileLookupConfig, DEFAULT_PROFILE_BASE_URL};

/// Abstract mainnet chain id.
pub const DEFAULT_CHAIN_ID: u64 = 2741;

/// Main configuration struct for the indexer.
#[derive(Debug, Clone)]
pub struct Config {
    rpc_url: Option<String>,
    chain_id: u64,
    key_purchase_address: Option<Address>,
    claim_vault_address: Option<Address>,
    start_block: u64,
    batch_size: u64,
    poll_interval_secs: u64,
    database_url: String,
    profile: ProfileLookupConfig,
    api_port: u16,
    api_rate_limit_rpm: u32,
    cors_origins: Vec<String>,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    expected: &str,
) -> IndexerResult<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|value| !value.trim().is_empty()) {
        Some(value) => value.trim().parse::<T>().map_err(|e| {
            IndexerError::config(format!("{key} must be {expected}"), Some(Box::new(e)))
        }),
        None => Ok(default),
    }
}

fn parse_address(key: &str, value: &str) -> IndexerResult<Address> {
    let value = value.trim();
    if !value.starts_with("0x") || value.len() != 42 {
        return Err(IndexerError::config(
            format!("{key} must be a valid address (0x + 40 hex chars), got: {value}"),
            None,
        ));
    }
    Address::from_str(value).map_err(|e| {
        IndexerError::config(format!("{key} is not a valid address"), Some(Box::new(e)))
    })
}

fn optional_address(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> IndexerResult<Option<Address>> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .map(|value| parse_address(key, &value))
        .transpose()
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Loads a `.env` file first if one is present.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> IndexerResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> IndexerResult<Self> {
        let rpc_url = lookup("RPC_URL").filter(|url| !url.trim().is_empty());

        let chain_id = parse_or(&lookup, "CHAIN_ID", DEFAULT_CHAIN_ID, "a valid chain id")?;
        let key_purchase_address = optional_address(&lookup, "KEY_PURCHASE_ADDRESS")?;
        let claim_vault_address = optional_address(&lookup, "CLAIM_VAULT_ADDRESS")?;

        let start_block = parse_or(&lookup, "START_BLOCK", 0, "a valid block number")?;
        let batch_size = parse_or(&lookup, "BATCH_SIZE", 1000, "a valid number")?;
        if batch_size == 0 {
            return Err(IndexerError::config("BATCH_SIZE must be at least 1", None));
        }
        let poll_interval_secs = parse_or(&lookup, "POLL_INTERVAL_SECS", 5, "a valid number")?;

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| "sqlite:./indexer.db".to_string());

        let defaults = ProfileLookupConfig::default();
        let profile = ProfileLookupConfig {
            base_url: lookup("PROFILE_API_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE_BASE_URL.to_string()),
            bearer_token: lookup("PROFILE_API_TOKEN").filter(|token| !token.trim().is_empty()),
            user_agent: lookup("PROFILE_USER_AGENT")
                .filter(|agent| !agent.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            referer: lookup("PROFILE_REFERER")
                .filter(|referer| !referer.trim().is_empty())
                .unwrap_or(defaults.referer),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "PROFILE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
                "a valid number of seconds",
            )?),
            rate_per_second: parse_or(
                &lookup,
                "PROFILE_RATE_LIMIT_PER_SEC",
                defaults.rate_per_second,
                "a valid number",
            )?,
        };
        if profile.rate_per_second == 0 {
            return Err(IndexerError::config(
                "PROFILE_RATE_LIMIT_PER_SEC must be at least 1",
                None,
            ));
        }

        let api_port = parse_or(&lookup, "API_PORT", 3000, "a valid port")?;
        let api_rate_limit_rpm = parse_or(&lookup, "API_RATE_LIMIT_RPM", 600, "a valid number")?;
        let cors_origins = lookup("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            rpc_url,
            chain_id,
            key_purchase_address,
            claim_vault_address,
            start_block,
            batch_size,
            poll_interval_secs,
            database_url,
            profile,
            api_port,
            api_rate_limit_rpm,
            cors_origins,
        })
    }

    /// Get the RPC URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `RPC_URL` is not set.
    pub fn rpc_url(&self) -> IndexerResult<&str> {
        self.rpc_url.as_deref().ok_or_else(|| {
            IndexerError::config("RPC_URL environment variable is required", None)
        })
    }

    /// Get both contract addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if either address is not set.
    pub fn contracts(&self) -> IndexerResult<ContractAddresses> {
        let key_purchase = self.key_purchase_address.ok_or_else(|| {
            IndexerError::config("KEY_PURCHASE_ADDRESS environment variable is required", None)
        })?;
        let claim_vault = self.claim_vault_address.ok_or_else(|| {
            IndexerError::config("CLAIM_VAULT_ADDRESS environment variable is required", None)
        })?;
        Ok(ContractAddresses {
            key_purchase,
            claim_vault,
        })
    }

    /// Get the chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get the first block to index when no cursor is stored.
    #[must_use]
    pub const fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Get the batch size (max blocks per query).
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Get the polling interval in seconds.
    #[must_use]
    pub const fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Settings for the profile lookup.
    #[must_use]
    pub fn profile_lookup(&self) -> ProfileLookupConfig {
        self.profile.clone()
    }

    /// Get the read API port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Get the read API rate limit in requests per minute.
    #[must_use]
    pub const fn api_rate_limit_rpm(&self) -> u32 {
        self.api_rate_limit_rpm
    }

    /// Get the allowed CORS origins. Empty means any.
    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> IndexerResult<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.chain_id(), 2741);
        assert_eq!(config.start_block(), 0);
        assert_eq!(config.batch_size(), 1000);
        assert_eq!(config.poll_interval_secs(), 5);
        assert_eq!(config.database_url(), "sqlite:./indexer.db");
        assert_eq!(config.api_port(), 3000);
        assert_eq!(config.api_rate_limit_rpm(), 600);
        assert!(config.cors_origins().is_empty());

        let profile = config.profile_lookup();
        assert_eq!(profile.base_url, DEFAULT_PROFILE_BASE_URL);
        assert_eq!(profile.rate_per_second, 10);
        assert_eq!(profile.timeout, Duration::from_secs(10));
        assert!(profile.bearer_token.is_none());
    }

    #[test]
    fn test_rpc_and_contracts_required_on_access() {
        let config = load(&[]).unwrap();
        assert!(config.rpc_url().is_err());
        assert!(config.contracts().is_err());
    }

    #[test]
    fn test_contract_addresses_parsed() {
        let config = load(&[
            ("RPC_URL", "https://api.mainnet.abs.xyz"),
            (
                "KEY_PURCHASE_ADDRESS",
                "0x1000000000000000000000000000000000000001",
            ),
            (
                "CLAIM_VAULT_ADDRESS",
                "0x2000000000000000000000000000000000000002",
            ),
        ])
        .unwrap();

        assert_eq!(config.rpc_url().unwrap(), "https://api.mainnet.abs.xyz");
        let contracts = config.contracts().unwrap();
        assert_ne!(contracts.key_purchase, contracts.claim_vault);
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(load(&[("KEY_PURCHASE_ADDRESS", "invalid_address")]).is_err());
        assert!(load(&[(
            "CLAIM_VAULT_ADDRESS",
            "0xZZ00000000000000000000000000000000000002"
        )])
        .is_err());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(load(&[("BATCH_SIZE", "lots")]).is_err());
        assert!(load(&[("BATCH_SIZE", "0")]).is_err());
        assert!(load(&[("PROFILE_RATE_LIMIT_PER_SEC", "0")]).is_err());
        assert!(load(&[("API_PORT", "70000")]).is_err());
    }

    #[test]
    fn test_profile_settings() {
        let config = load(&[
            ("PROFILE_API_BASE_URL", "http://127.0.0.1:9000/user"),
            ("PROFILE_API_TOKEN", "secret"),
            ("PROFILE_USER_AGENT", "indexer-test"),
            ("PROFILE_TIMEOUT_SECS", "2"),
        ])
        .unwrap();

        let profile = config.profile_lookup();
        assert_eq!(profile.base_url, "http://127.0.0.1:9000/user");
        assert_eq!(profile.bearer_token.as_deref(), Some("secret"));
        assert_eq!(profile.user_agent, "indexer-test");
        assert_eq!(profile.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_cors_origins_split() {
        let config = load(&[("CORS_ORIGINS", "https://a.xyz, https://b.xyz,,")]).unwrap();
        assert_eq!(config.cors_origins(), ["https://a.xyz", "https://b.xyz"]);
    }
}
