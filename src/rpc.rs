//! RPC access for log ingestion.
//!
//! Uses Alloy's `ProviderBuilder` over HTTP. Logs for both contracts are
//! fetched with one `eth_getLogs` call per block range, decoded into
//! [`ChainEvent`]s, and stamped with their block timestamps.
//!
//! ## Example
//!
//! ```no_run
//! use keyvault_indexer::rpc::{create_provider, get_latest_block};
//! use keyvault_indexer::error::IndexerResult;
//!
//! # async fn example() -> IndexerResult<()> {
//! let provider = create_provider("https://api.mainnet.abs.xyz").await?;
//! let latest_block = get_latest_block(&provider).await?;
//! println!("Latest block: {}", latest_block);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};

use alloy::providers::{Provider as AlloProvider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info, warn};

use crate::error::{IndexerError, IndexerResult};
use crate::events::{decode_log, ChainEvent, ContractAddresses};

/// HTTP provider type.
pub type Provider = RootProvider<Http<Client>>;

/// Create an RPC provider connected via HTTP.
///
/// # Errors
///
/// Returns an error if the RPC URL cannot be parsed.
#[allow(clippy::unused_async)]
pub async fn create_provider(rpc_url: &str) -> IndexerResult<Provider> {
    info!("Initializing RPC provider");
    debug!("RPC URL: {}", rpc_url);

    let url = rpc_url
        .parse()
        .map_err(|e| IndexerError::rpc("Failed to parse RPC URL", Some(Box::new(e))))?;

    let provider = ProviderBuilder::new().on_http(url);

    info!("RPC provider initialized successfully");

    Ok(provider)
}

/// Get the latest block number.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
pub async fn get_latest_block(provider: &Provider) -> IndexerResult<u64> {
    debug!("Fetching latest block number");

    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| IndexerError::rpc("Failed to fetch latest block number", Some(Box::new(e))))?;

    debug!("Latest block number: {}", block_number);

    Ok(block_number)
}

/// Verify the provider answers, and that it serves the expected chain.
///
/// # Errors
///
/// Returns an error if the node is unreachable or reports another chain id.
pub async fn check_connection(provider: &Provider, expected_chain_id: u64) -> IndexerResult<()> {
    debug!("Checking provider connection health");

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| IndexerError::rpc("Failed to fetch chain id", Some(Box::new(e))))?;
    if chain_id != expected_chain_id {
        warn!("Provider reports chain {}, expected {}", chain_id, expected_chain_id);
        return Err(IndexerError::config(
            format!("RPC serves chain {chain_id}, but CHAIN_ID is {expected_chain_id}"),
            None,
        ));
    }

    let block = get_latest_block(provider).await?;
    info!("Connection check successful - chain {}, latest block {}", chain_id, block);
    Ok(())
}

/// Filter for every log emitted by either contract in `[from_block, to_block]`.
#[must_use]
pub fn contract_log_filter(contracts: &ContractAddresses, from_block: u64, to_block: u64) -> Filter {
    Filter::new()
        .address(vec![contracts.key_purchase, contracts.claim_vault])
        .from_block(from_block)
        .to_block(to_block)
}

/// Fetch raw logs for both contracts over a block range.
///
/// # Errors
///
/// Returns an error if the `eth_getLogs` request fails.
pub async fn fetch_contract_logs(
    provider: &Provider,
    contracts: &ContractAddresses,
    from_block: u64,
    to_block: u64,
) -> IndexerResult<Vec<Log>> {
    let filter = contract_log_filter(contracts, from_block, to_block);
    let logs = provider.get_logs(&filter).await.map_err(|e| {
        IndexerError::rpc(
            format!("Failed to fetch logs for blocks {from_block}-{to_block}"),
            Some(Box::new(e)),
        )
    })?;

    debug!("Fetched {} logs from blocks {} to {}", logs.len(), from_block, to_block);
    Ok(logs)
}

/// Block numbers whose timestamp is not carried on any of `logs`.
fn blocks_missing_timestamps(logs: &[Log]) -> BTreeSet<u64> {
    logs.iter()
        .filter(|log| log.block_timestamp.is_none())
        .filter_map(|log| log.block_number)
        .collect()
}

/// Look up timestamps for blocks whose logs omit `blockTimestamp`.
///
/// # Errors
///
/// Returns an error if a block cannot be fetched.
pub async fn resolve_block_timestamps(
    provider: &Provider,
    logs: &[Log],
) -> IndexerResult<HashMap<u64, u64>> {
    let mut timestamps = HashMap::new();

    for number in blocks_missing_timestamps(logs) {
        let block = provider
            .get_block_by_number(number.into(), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| {
                IndexerError::rpc(format!("Failed to fetch block {number}"), Some(Box::new(e)))
            })?
            .ok_or_else(|| IndexerError::rpc(format!("Block {number} not found"), None))?;
        timestamps.insert(number, block.header.timestamp);
    }

    Ok(timestamps)
}

/// Decode logs into events, skipping unknown topics.
///
/// # Errors
///
/// Returns a decoding error for a malformed log, or if a log's block
/// timestamp is neither on the log nor in `timestamps`.
pub fn decode_logs(
    logs: &[Log],
    chain_id: u64,
    contracts: &ContractAddresses,
    timestamps: &HashMap<u64, u64>,
) -> IndexerResult<Vec<ChainEvent>> {
    let mut events = Vec::with_capacity(logs.len());

    for log in logs {
        let timestamp = log
            .block_timestamp
            .or_else(|| log.block_number.and_then(|n| timestamps.get(&n).copied()))
            .ok_or_else(|| IndexerError::decoding("Log missing block timestamp", None))?;

        match decode_log(log, chain_id, contracts, timestamp)? {
            Some(event) => events.push(event),
            None => debug!("Skipping log with unknown topic at block {:?}", log.block_number),
        }
    }

    Ok(events)
}

/// Fetch and decode every contract event in `[from_block, to_block]`.
///
/// # Errors
///
/// Returns RPC or decoding errors.
pub async fn fetch_events(
    provider: &Provider,
    chain_id: u64,
    contracts: &ContractAddresses,
    from_block: u64,
    to_block: u64,
) -> IndexerResult<Vec<ChainEvent>> {
    let logs = fetch_contract_logs(provider, contracts, from_block, to_block).await?;
    if logs.is_empty() {
        return Ok(Vec::new());
    }

    let timestamps = resolve_block_timestamps(provider, &logs).await?;
    decode_logs(&logs, chain_id, contracts, &timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, IClaimVault};
    use alloy::primitives::{address, Address, Log as PrimitiveLog, U256};
    use alloy::sol_types::SolEvent;

    const KEY_PURCHASE: Address = address!("1000000000000000000000000000000000000001");
    const CLAIM_VAULT: Address = address!("2000000000000000000000000000000000000002");

    fn contracts() -> ContractAddresses {
        ContractAddresses {
            key_purchase: KEY_PURCHASE,
            claim_vault: CLAIM_VAULT,
        }
    }

    fn claim_log(block: u64, timestamp: Option<u64>) -> Log {
        let event = IClaimVault::WeeklyClaimed {
            claimer: address!("abc0000000000000000000000000000000000def"),
            week: U256::from(7u64),
            amount: U256::from(50u64),
        };
        Log {
            inner: PrimitiveLog {
                address: CLAIM_VAULT,
                data: event.encode_log_data(),
            },
            block_number: Some(block),
            block_timestamp: timestamp,
            log_index: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_blocks_missing_timestamps() {
        let logs = vec![
            claim_log(5, None),
            claim_log(5, None),
            claim_log(6, Some(60)),
            claim_log(7, None),
        ];
        let missing: Vec<_> = blocks_missing_timestamps(&logs).into_iter().collect();
        assert_eq!(missing, vec![5, 7]);
    }

    #[test]
    fn test_decode_logs_uses_resolved_timestamps() {
        let logs = vec![claim_log(5, None), claim_log(6, Some(60))];
        let timestamps = HashMap::from([(5, 50)]);

        let events = decode_logs(&logs, 2741, &contracts(), &timestamps).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].block_timestamp, 50);
        assert_eq!(events[1].block_timestamp, 60);
        assert!(matches!(events[0].kind, EventKind::WeeklyClaimed(_)));
    }

    #[test]
    fn test_decode_logs_requires_a_timestamp() {
        let logs = vec![claim_log(5, None)];
        let err = decode_logs(&logs, 2741, &contracts(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, IndexerError::DecodingError { .. }));
    }

    #[test]
    fn test_filter_covers_both_contracts() {
        let filter = contract_log_filter(&contracts(), 10, 20);
        assert!(filter.address.matches(&KEY_PURCHASE));
        assert!(filter.address.matches(&CLAIM_VAULT));
        assert_eq!(filter.get_from_block(), Some(10));
        assert_eq!(filter.get_to_block(), Some(20));
    }

    #[tokio::test]
    async fn test_create_provider_invalid_url() {
        assert!(create_provider("not-a-valid-url").await.is_err());
    }

    #[tokio::test]
    #[ignore = "Requires a reachable RPC_URL"]
    async fn test_get_latest_block_integration() {
        let rpc_url =
            std::env::var("RPC_URL").unwrap_or_else(|_| "http://localhost:8545".to_string());
        let provider = create_provider(&rpc_url).await.unwrap();
        assert!(get_latest_block(&provider).await.unwrap() > 0);
    }
}
