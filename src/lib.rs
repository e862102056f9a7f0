//! # Key Vault Stats Indexer
//!
//! Event indexer for the key purchase and claim vault contracts, built on
//! [Alloy](https://github.com/alloy-rs/alloy).
//!
//! Every `KeysPurchased`, `WeeklyClaimed`, and `JackpotClaimed` event is folded
//! into running statistics: global totals, per-player totals with a cached
//! profile snapshot, per-week and per-player-week claim totals, and per-jackpot
//! totals with distinct-claimer counts. Administrative events are recorded
//! verbatim.
//!
//! ## Features
//!
//! - **Type-safe event decoding** using Alloy's `sol!` macro
//! - **Exact arithmetic**: unbounded amount sums and a signed net profit per player
//! - **Idempotent replay**: an event is applied at most once, atomically
//! - **Profile enrichment** that is cached, rate limited, and never fails
//! - **Read API** with OpenAPI docs
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **RPC Layer** ([`rpc`]) - Log fetching and timestamp resolution
//! 3. **Events Layer** ([`events`]) - Decoding into [`events::ChainEvent`]
//! 4. **Indexer Layer** ([`indexer`]) - Dispatch and aggregate updates
//! 5. **Storage Layer** ([`store`], [`db`]) - Atomic changesets over SQLite
//! 6. **Profile Layer** ([`profile`]) - External profile lookups
//! 7. **API Layer** ([`api`]) - Axum read API
//!
//! ## Quick Start
//!
//! ```bash
//! # Follow the chain
//! cargo run --release -- index
//!
//! # Serve the read API
//! cargo run --release -- serve
//! ```
//!
//! ### Using as a Library
//!
//! ```rust,no_run
//! use keyvault_indexer::indexer::Indexer;
//! use keyvault_indexer::profile::CachedProfileLookup;
//! use keyvault_indexer::{config::Config, rpc, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let provider = rpc::create_provider(config.rpc_url()?).await?;
//!     let contracts = config.contracts()?;
//!
//!     let profiles = CachedProfileLookup::from_config(&config.profile_lookup())?;
//!     let indexer = Indexer::new(MemoryStore::new(), profiles);
//!
//!     let events = rpc::fetch_events(&provider, config.chain_id(), &contracts, 0, 1000).await?;
//!     let summary = indexer.handle_batch(events).await?;
//!     println!("applied {} events", summary.applied);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::IndexerResult<T>`](error::IndexerResult):
//!
//! ```rust
//! use keyvault_indexer::error::{IndexerError, IndexerResult};
//!
//! fn example() -> IndexerResult<()> {
//!     Err(IndexerError::config("RPC_URL is required", None))
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod indexer;
pub mod observability;
pub mod profile;
pub mod rpc;
pub mod stats;
pub mod store;
pub mod uniqueness;
