//! Typed events for the `KeyPurchase` and `ClaimVault` contracts.
//!
//! Bindings are generated with Alloy's `sol!` macro, so event signatures and
//! topic layouts are checked at compile time. [`decode_log`] turns an RPC log
//! into a [`ChainEvent`], the unit of work handed to the
//! [`Indexer`](crate::indexer::Indexer).
//!
//! Both contracts emit identically named ownership, pause, and upgrade events.
//! Their signatures hash to the same topic, so the emitting contract is taken
//! from the log address and carried on the event as a [`Contract`].
//!
//! ## Example
//!
//! ```
//! use alloy::primitives::U256;
//! use keyvault_indexer::events::{ChainEvent, Contract, EventKind, KeysPurchased};
//!
//! let event = ChainEvent {
//!     chain_id: 2741,
//!     block_number: 1_000,
//!     block_timestamp: 1_700_000_000,
//!     log_index: 3,
//!     contract: Contract::KeyPurchase,
//!     kind: EventKind::KeysPurchased(KeysPurchased {
//!         buyer: "0xAbC0000000000000000000000000000000000001".to_string(),
//!         quantity: U256::from(3u64),
//!         price_per_key: U256::from(10u64),
//!         total_paid: U256::from(30u64),
//!     }),
//! };
//! assert_eq!(event.id(), "2741_1000_3");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, IndexerResult};
use crate::stats::BlockMeta;

sol! {
    /// Key sale contract.
    #[sol(rpc)]
    interface IKeyPurchase {
        event KeysPurchased(address indexed buyer, uint256 quantity, uint256 pricePerKey, uint256 totalPaid);
        event ClaimsRecipientUpdated(address indexed oldClaimsRecipient, address indexed newClaimsRecipient);
        event FeeBpsUpdated(uint256 oldFeeBps, uint256 newFeeBps);
        event FeeRecipientUpdated(address indexed oldFeeRecipient, address indexed newFeeRecipient);
        event KeyPriceUpdated(uint256 oldPrice, uint256 newPrice);
        event OwnershipTransferred(address indexed oldOwner, address indexed newOwner);
        event OwnershipHandoverRequested(address indexed pendingOwner);
        event OwnershipHandoverCanceled(address indexed pendingOwner);
        event PauseStatusChanged(bool paused);
        event Upgraded(address indexed implementation);
    }
}

sol! {
    /// Reward vault paying weekly and jackpot claims.
    #[sol(rpc)]
    interface IClaimVault {
        event WeeklyClaimed(address indexed claimer, uint256 week, uint256 amount);
        event JackpotClaimed(address indexed claimer, uint256 nonce, uint256 amount);
        event SignerUpdated(address indexed oldSigner, address indexed newSigner);
        event OwnershipTransferred(address indexed oldOwner, address indexed newOwner);
        event OwnershipHandoverRequested(address indexed pendingOwner);
        event OwnershipHandoverCanceled(address indexed pendingOwner);
        event PauseStatusChanged(bool paused);
        event Upgraded(address indexed implementation);
    }
}

/// Contract that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contract {
    /// Key sale contract
    KeyPurchase,
    /// Claim vault contract
    ClaimVault,
}

impl Contract {
    /// Name used in stored records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeyPurchase => "KeyPurchase",
            Self::ClaimVault => "ClaimVault",
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Contract {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KeyPurchase" => Ok(Self::KeyPurchase),
            "ClaimVault" => Ok(Self::ClaimVault),
            other => Err(IndexerError::decoding(
                format!("Unknown contract name: {other}"),
                None,
            )),
        }
    }
}

/// Deployed contract addresses to decode logs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    /// `KeyPurchase` contract
    pub key_purchase: Address,
    /// `ClaimVault` contract
    pub claim_vault: Address,
}

impl ContractAddresses {
    /// Which contract, if any, lives at `address`.
    #[must_use]
    pub fn contract_at(&self, address: Address) -> Option<Contract> {
        if address == self.key_purchase {
            Some(Contract::KeyPurchase)
        } else if address == self.claim_vault {
            Some(Contract::ClaimVault)
        } else {
            None
        }
    }
}

/// `KeysPurchased` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysPurchased {
    /// Buyer address as emitted (checksummed)
    pub buyer: String,
    /// Number of keys bought
    pub quantity: U256,
    /// Unit price
    pub price_per_key: U256,
    /// Total paid for the purchase
    pub total_paid: U256,
}

/// `WeeklyClaimed` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyClaimed {
    /// Claimer address as emitted
    pub claimer: String,
    /// Week number
    pub week: U256,
    /// Amount claimed
    pub amount: U256,
}

/// `JackpotClaimed` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JackpotClaimed {
    /// Claimer address as emitted
    pub claimer: String,
    /// Jackpot nonce
    pub nonce: U256,
    /// Amount claimed
    pub amount: U256,
}

/// Typed event payloads.
///
/// The first three variants drive aggregation. Every other variant is an
/// administrative event that is only recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Keys bought from the sale contract
    KeysPurchased(KeysPurchased),
    /// Weekly reward claimed from the vault
    WeeklyClaimed(WeeklyClaimed),
    /// Jackpot claimed from the vault
    JackpotClaimed(JackpotClaimed),
    /// Claims recipient changed
    ClaimsRecipientUpdated {
        /// Previous recipient
        old_claims_recipient: String,
        /// New recipient
        new_claims_recipient: String,
    },
    /// Fee basis points changed
    FeeBpsUpdated {
        /// Previous fee
        old_fee_bps: U256,
        /// New fee
        new_fee_bps: U256,
    },
    /// Fee recipient changed
    FeeRecipientUpdated {
        /// Previous recipient
        old_fee_recipient: String,
        /// New recipient
        new_fee_recipient: String,
    },
    /// Key price changed
    KeyPriceUpdated {
        /// Previous price
        old_price: U256,
        /// New price
        new_price: U256,
    },
    /// Ownership transferred
    OwnershipTransferred {
        /// Previous owner
        old_owner: String,
        /// New owner
        new_owner: String,
    },
    /// Ownership handover requested
    OwnershipHandoverRequested {
        /// Pending owner
        pending_owner: String,
    },
    /// Ownership handover canceled
    OwnershipHandoverCanceled {
        /// Pending owner
        pending_owner: String,
    },
    /// Contract paused or unpaused
    PauseStatusChanged {
        /// New pause flag
        paused: bool,
    },
    /// Claim signer rotated
    SignerUpdated {
        /// Previous signer
        old_signer: String,
        /// New signer
        new_signer: String,
    },
    /// Proxy implementation upgraded
    Upgraded {
        /// New implementation
        implementation: String,
    },
}

impl EventKind {
    /// Solidity event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::KeysPurchased(_) => "KeysPurchased",
            Self::WeeklyClaimed(_) => "WeeklyClaimed",
            Self::JackpotClaimed(_) => "JackpotClaimed",
            Self::ClaimsRecipientUpdated { .. } => "ClaimsRecipientUpdated",
            Self::FeeBpsUpdated { .. } => "FeeBpsUpdated",
            Self::FeeRecipientUpdated { .. } => "FeeRecipientUpdated",
            Self::KeyPriceUpdated { .. } => "KeyPriceUpdated",
            Self::OwnershipTransferred { .. } => "OwnershipTransferred",
            Self::OwnershipHandoverRequested { .. } => "OwnershipHandoverRequested",
            Self::OwnershipHandoverCanceled { .. } => "OwnershipHandoverCanceled",
            Self::PauseStatusChanged { .. } => "PauseStatusChanged",
            Self::SignerUpdated { .. } => "SignerUpdated",
            Self::Upgraded { .. } => "Upgraded",
        }
    }

    /// Raw parameters keyed by their Solidity names.
    #[must_use]
    pub fn fields(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            Self::KeysPurchased(p) => vec![
                ("buyer", p.buyer.clone()),
                ("quantity", p.quantity.to_string()),
                ("pricePerKey", p.price_per_key.to_string()),
                ("totalPaid", p.total_paid.to_string()),
            ],
            Self::WeeklyClaimed(c) => vec![
                ("claimer", c.claimer.clone()),
                ("week", c.week.to_string()),
                ("amount", c.amount.to_string()),
            ],
            Self::JackpotClaimed(c) => vec![
                ("claimer", c.claimer.clone()),
                ("nonce", c.nonce.to_string()),
                ("amount", c.amount.to_string()),
            ],
            Self::ClaimsRecipientUpdated {
                old_claims_recipient,
                new_claims_recipient,
            } => vec![
                ("oldClaimsRecipient", old_claims_recipient.clone()),
                ("newClaimsRecipient", new_claims_recipient.clone()),
            ],
            Self::FeeBpsUpdated {
                old_fee_bps,
                new_fee_bps,
            } => vec![
                ("oldFeeBps", old_fee_bps.to_string()),
                ("newFeeBps", new_fee_bps.to_string()),
            ],
            Self::FeeRecipientUpdated {
                old_fee_recipient,
                new_fee_recipient,
            } => vec![
                ("oldFeeRecipient", old_fee_recipient.clone()),
                ("newFeeRecipient", new_fee_recipient.clone()),
            ],
            Self::KeyPriceUpdated {
                old_price,
                new_price,
            } => vec![
                ("oldPrice", old_price.to_string()),
                ("newPrice", new_price.to_string()),
            ],
            Self::OwnershipTransferred {
                old_owner,
                new_owner,
            } => vec![
                ("oldOwner", old_owner.clone()),
                ("newOwner", new_owner.clone()),
            ],
            Self::OwnershipHandoverRequested { pending_owner }
            | Self::OwnershipHandoverCanceled { pending_owner } => {
                vec![("pendingOwner", pending_owner.clone())]
            }
            Self::PauseStatusChanged { paused } => vec![("paused", paused.to_string())],
            Self::SignerUpdated {
                old_signer,
                new_signer,
            } => vec![
                ("oldSigner", old_signer.clone()),
                ("newSigner", new_signer.clone()),
            ],
            Self::Upgraded { implementation } => {
                vec![("implementation", implementation.clone())]
            }
        };

        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

/// One decoded log with its chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    /// Chain the log was emitted on
    pub chain_id: u64,
    /// Block number
    pub block_number: u64,
    /// Block timestamp (Unix epoch seconds)
    pub block_timestamp: u64,
    /// Log index within the block
    pub log_index: u64,
    /// Emitting contract
    pub contract: Contract,
    /// Typed payload
    pub kind: EventKind,
}

impl ChainEvent {
    /// Deterministic identifier `<chainId>_<blockNumber>_<logIndex>`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.chain_id, self.block_number, self.log_index)
    }

    /// Block metadata for stamping aggregates.
    #[must_use]
    pub const fn block(&self) -> BlockMeta {
        BlockMeta::new(self.block_number, self.block_timestamp)
    }

    /// Canonical chain order key.
    #[must_use]
    pub const fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    /// Verbatim record of this event.
    #[must_use]
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            id: self.id(),
            chain_id: self.chain_id,
            contract: self.contract,
            event_name: self.kind.name().to_string(),
            block_number: self.block_number,
            block_timestamp: self.block_timestamp,
            log_index: self.log_index,
            fields: self.kind.fields(),
        }
    }
}

/// Write-once copy of an event's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// `<chainId>_<blockNumber>_<logIndex>`
    pub id: String,
    /// Chain id
    pub chain_id: u64,
    /// Emitting contract
    pub contract: Contract,
    /// Solidity event name
    pub event_name: String,
    /// Block number
    pub block_number: u64,
    /// Block timestamp
    pub block_timestamp: u64,
    /// Log index
    pub log_index: u64,
    /// Parameters keyed by Solidity name
    pub fields: BTreeMap<String, String>,
}

fn checksum(address: Address) -> String {
    address.to_checksum(None)
}

fn decode<E: SolEvent>(log: &Log) -> IndexerResult<E> {
    E::decode_log_data(log.data(), true).map_err(|e| {
        IndexerError::decoding(
            format!("Failed to decode {}: {e}", E::SIGNATURE),
            None,
        )
    })
}

/// Decode an RPC log into a [`ChainEvent`].
///
/// Returns `Ok(None)` for logs from other addresses or with unknown topics.
/// `block_timestamp` is passed separately because many nodes leave it off
/// the log (see [`crate::rpc::resolve_block_timestamps`]).
///
/// # Errors
///
/// Returns a decoding error if the log is missing its block number or log
/// index, or if the payload does not match the event signature.
pub fn decode_log(
    log: &Log,
    chain_id: u64,
    contracts: &ContractAddresses,
    block_timestamp: u64,
) -> IndexerResult<Option<ChainEvent>> {
    let Some(contract) = contracts.contract_at(log.address()) else {
        return Ok(None);
    };
    let Some(topic0) = log.topics().first().copied() else {
        return Ok(None);
    };

    let kind = if topic0 == IKeyPurchase::KeysPurchased::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::KeysPurchased>(log)?;
        EventKind::KeysPurchased(KeysPurchased {
            buyer: checksum(e.buyer),
            quantity: e.quantity,
            price_per_key: e.pricePerKey,
            total_paid: e.totalPaid,
        })
    } else if topic0 == IClaimVault::WeeklyClaimed::SIGNATURE_HASH {
        let e = decode::<IClaimVault::WeeklyClaimed>(log)?;
        EventKind::WeeklyClaimed(WeeklyClaimed {
            claimer: checksum(e.claimer),
            week: e.week,
            amount: e.amount,
        })
    } else if topic0 == IClaimVault::JackpotClaimed::SIGNATURE_HASH {
        let e = decode::<IClaimVault::JackpotClaimed>(log)?;
        EventKind::JackpotClaimed(JackpotClaimed {
            claimer: checksum(e.claimer),
            nonce: e.nonce,
            amount: e.amount,
        })
    } else if topic0 == IKeyPurchase::ClaimsRecipientUpdated::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::ClaimsRecipientUpdated>(log)?;
        EventKind::ClaimsRecipientUpdated {
            old_claims_recipient: checksum(e.oldClaimsRecipient),
            new_claims_recipient: checksum(e.newClaimsRecipient),
        }
    } else if topic0 == IKeyPurchase::FeeBpsUpdated::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::FeeBpsUpdated>(log)?;
        EventKind::FeeBpsUpdated {
            old_fee_bps: e.oldFeeBps,
            new_fee_bps: e.newFeeBps,
        }
    } else if topic0 == IKeyPurchase::FeeRecipientUpdated::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::FeeRecipientUpdated>(log)?;
        EventKind::FeeRecipientUpdated {
            old_fee_recipient: checksum(e.oldFeeRecipient),
            new_fee_recipient: checksum(e.newFeeRecipient),
        }
    } else if topic0 == IKeyPurchase::KeyPriceUpdated::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::KeyPriceUpdated>(log)?;
        EventKind::KeyPriceUpdated {
            old_price: e.oldPrice,
            new_price: e.newPrice,
        }
    } else if topic0 == IKeyPurchase::OwnershipTransferred::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::OwnershipTransferred>(log)?;
        EventKind::OwnershipTransferred {
            old_owner: checksum(e.oldOwner),
            new_owner: checksum(e.newOwner),
        }
    } else if topic0 == IKeyPurchase::OwnershipHandoverRequested::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::OwnershipHandoverRequested>(log)?;
        EventKind::OwnershipHandoverRequested {
            pending_owner: checksum(e.pendingOwner),
        }
    } else if topic0 == IKeyPurchase::OwnershipHandoverCanceled::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::OwnershipHandoverCanceled>(log)?;
        EventKind::OwnershipHandoverCanceled {
            pending_owner: checksum(e.pendingOwner),
        }
    } else if topic0 == IKeyPurchase::PauseStatusChanged::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::PauseStatusChanged>(log)?;
        EventKind::PauseStatusChanged { paused: e.paused }
    } else if topic0 == IClaimVault::SignerUpdated::SIGNATURE_HASH {
        let e = decode::<IClaimVault::SignerUpdated>(log)?;
        EventKind::SignerUpdated {
            old_signer: checksum(e.oldSigner),
            new_signer: checksum(e.newSigner),
        }
    } else if topic0 == IKeyPurchase::Upgraded::SIGNATURE_HASH {
        let e = decode::<IKeyPurchase::Upgraded>(log)?;
        EventKind::Upgraded {
            implementation: checksum(e.implementation),
        }
    } else {
        return Ok(None);
    };

    let block_number = log
        .block_number
        .ok_or_else(|| IndexerError::decoding("Log missing block number", None))?;
    let log_index = log
        .log_index
        .ok_or_else(|| IndexerError::decoding("Log missing log index", None))?;

    Ok(Some(ChainEvent {
        chain_id,
        block_number,
        block_timestamp,
        log_index,
        contract,
        kind,
    }))
}

/// Sort events into canonical chain order (block, then log index).
pub fn sort_canonical(events: &mut [ChainEvent]) {
    events.sort_by_key(ChainEvent::position);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Log as PrimitiveLog};

    const KEY_PURCHASE: Address = address!("1000000000000000000000000000000000000001");
    const CLAIM_VAULT: Address = address!("2000000000000000000000000000000000000002");
    const BUYER: Address = address!("abc0000000000000000000000000000000000def");

    fn contracts() -> ContractAddresses {
        ContractAddresses {
            key_purchase: KEY_PURCHASE,
            claim_vault: CLAIM_VAULT,
        }
    }

    fn rpc_log<E: SolEvent>(emitter: Address, event: &E, block: u64, index: u64) -> Log {
        Log {
            inner: PrimitiveLog {
                address: emitter,
                data: event.encode_log_data(),
            },
            block_number: Some(block),
            log_index: Some(index),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_keys_purchased() {
        let raw = IKeyPurchase::KeysPurchased {
            buyer: BUYER,
            quantity: U256::from(3u64),
            pricePerKey: U256::from(10u64),
            totalPaid: U256::from(30u64),
        };
        let log = rpc_log(KEY_PURCHASE, &raw, 500, 2);

        let event = decode_log(&log, 2741, &contracts(), 1_700_000_000)
            .unwrap()
            .unwrap();

        assert_eq!(event.id(), "2741_500_2");
        assert_eq!(event.contract, Contract::KeyPurchase);
        match event.kind {
            EventKind::KeysPurchased(p) => {
                assert_eq!(p.buyer, BUYER.to_checksum(None));
                assert_eq!(p.total_paid, U256::from(30u64));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_shared_event_tagged_by_emitter() {
        let raw = IClaimVault::PauseStatusChanged { paused: true };
        let log = rpc_log(CLAIM_VAULT, &raw, 10, 0);

        let event = decode_log(&log, 1, &contracts(), 0).unwrap().unwrap();
        assert_eq!(event.contract, Contract::ClaimVault);
        assert_eq!(event.kind, EventKind::PauseStatusChanged { paused: true });
    }

    #[test]
    fn test_unknown_address_is_skipped() {
        let raw = IKeyPurchase::PauseStatusChanged { paused: false };
        let log = rpc_log(BUYER, &raw, 10, 0);
        assert!(decode_log(&log, 1, &contracts(), 0).unwrap().is_none());
    }

    #[test]
    fn test_missing_block_number_is_an_error() {
        let raw = IClaimVault::WeeklyClaimed {
            claimer: BUYER,
            week: U256::from(7u64),
            amount: U256::from(50u64),
        };
        let mut log = rpc_log(CLAIM_VAULT, &raw, 10, 0);
        log.block_number = None;

        let err = decode_log(&log, 1, &contracts(), 0).unwrap_err();
        assert!(matches!(err, IndexerError::DecodingError { .. }));
    }

    #[test]
    fn test_record_fields_use_solidity_names() {
        let event = ChainEvent {
            chain_id: 1,
            block_number: 2,
            block_timestamp: 3,
            log_index: 4,
            contract: Contract::KeyPurchase,
            kind: EventKind::FeeBpsUpdated {
                old_fee_bps: U256::from(100u64),
                new_fee_bps: U256::from(250u64),
            },
        };
        let record = event.to_record();

        assert_eq!(record.id, "1_2_4");
        assert_eq!(record.event_name, "FeeBpsUpdated");
        assert_eq!(record.fields.get("oldFeeBps").map(String::as_str), Some("100"));
        assert_eq!(record.fields.get("newFeeBps").map(String::as_str), Some("250"));
    }

    #[test]
    fn test_sort_canonical_orders_by_block_then_log_index() {
        let make = |block, index| ChainEvent {
            chain_id: 1,
            block_number: block,
            block_timestamp: 0,
            log_index: index,
            contract: Contract::ClaimVault,
            kind: EventKind::PauseStatusChanged { paused: false },
        };
        let mut events = vec![make(5, 1), make(4, 9), make(5, 0)];
        sort_canonical(&mut events);

        let positions: Vec<_> = events.iter().map(ChainEvent::position).collect();
        assert_eq!(positions, vec![(4, 9), (5, 0), (5, 1)]);
    }

    #[test]
    fn test_contract_name_round_trip() {
        let parsed: Contract = "ClaimVault".parse().unwrap();
        assert_eq!(parsed, Contract::ClaimVault);
        assert!("Other".parse::<Contract>().is_err());
    }
}
