//! Command-line interface for the key vault stats indexer.
//!
//! # Commands
//!
//! - `index`: Follow the chain and apply events until ctrl-c
//! - `stats`: Print the global totals
//! - `player <wallet>`: Print one player's totals and profile
//! - `serve`: Run the read API
//!
//! # Example
//!
//! ```bash
//! # Index from the stored cursor (or START_BLOCK on first run)
//! keyvault-indexer index
//!
//! # Inspect what has been indexed so far
//! keyvault-indexer stats
//! keyvault-indexer player 0xAbC0000000000000000000000000000000000dEf
//! ```

use std::future::Future;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use num_bigint::{BigInt, Sign};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::server::{run_server, ServerOptions};
use crate::app_state::AppState;
use crate::config::Config;
use crate::db::{create_pool, Repository};
use crate::error::{IndexerError, IndexerResult};
use crate::events::ContractAddresses;
use crate::indexer::{Indexer, IngestBatch};
use crate::profile::CachedProfileLookup;
use crate::rpc::{check_connection, create_provider, fetch_events, get_latest_block, Provider};
use crate::stats::{normalize_wallet, Totals};
use crate::store::AggregateStore;

/// Batches buffered between the RPC poller and the indexer.
const INGEST_CHANNEL_CAPACITY: usize = 8;

/// Key vault stats indexer
#[derive(Parser, Debug)]
#[command(name = "keyvault-indexer")]
#[command(about = "Indexes key purchases and vault claims into player statistics", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow the chain and apply events until interrupted
    Index {
        /// Polling interval in seconds (default: POLL_INTERVAL_SECS)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Block to start from when no cursor is stored (default: START_BLOCK)
        #[arg(short, long)]
        start_block: Option<u64>,
    },

    /// Print the global totals
    Stats,

    /// Print one player's totals and profile
    Player {
        /// Wallet address, any case
        wallet: String,
    },

    /// Run the read API
    Serve {
        /// Port to listen on (default: API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns configuration, RPC, database, or indexing errors.
pub async fn run() -> IndexerResult<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Index {
            interval,
            start_block,
        } => run_index_command(&config, interval, start_block).await,
        Commands::Stats => run_stats_command(&config).await,
        Commands::Player { wallet } => run_player_command(&config, &wallet).await,
        Commands::Serve { port } => run_serve_command(&config, port).await,
    }
}

/// Resolves once ctrl-c is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// First block to fetch: one past the cursor, or the configured start.
const fn resume_block(cursor: Option<u64>, start_block: u64) -> u64 {
    match cursor {
        Some(block) => block.saturating_add(1),
        None => start_block,
    }
}

/// Split `[from, to]` into inclusive ranges of at most `batch_size` blocks.
fn block_ranges(from: u64, to: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let step = batch_size.max(1);
    let mut ranges = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start.saturating_add(step - 1).min(to);
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    ranges
}

/// Everything the poller needs to fetch one round of batches.
struct Poller<'a> {
    provider: &'a Provider,
    contracts: &'a ContractAddresses,
    chain_id: u64,
    batch_size: u64,
}

impl Poller<'_> {
    /// Fetch every range from `next_block` to the chain head and queue it.
    ///
    /// `next_block` advances past each queued range.
    async fn poll_once(
        &self,
        next_block: &mut u64,
        batches: &mpsc::Sender<IngestBatch>,
    ) -> IndexerResult<usize> {
        let latest = get_latest_block(self.provider).await?;
        if latest < *next_block {
            debug!("No new blocks (latest: {}, next: {})", latest, *next_block);
            return Ok(0);
        }

        let mut queued = 0;
        for (from, to) in block_ranges(*next_block, latest, self.batch_size) {
            let events =
                fetch_events(self.provider, self.chain_id, self.contracts, from, to).await?;
            debug!("Fetched {} events from blocks {} to {}", events.len(), from, to);

            batches
                .send(IngestBatch {
                    chain_id: self.chain_id,
                    to_block: to,
                    events,
                })
                .await
                .map_err(|_| IndexerError::state("Indexer stopped accepting batches", None))?;

            *next_block = to.saturating_add(1);
            queued += 1;
        }
        Ok(queued)
    }
}

/// Wait for `fut` unless `shutdown` fires first. `None` means shutdown.
async fn unless_shutdown<T>(
    shutdown: &mut (impl Future<Output = ()> + Unpin),
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        () = shutdown => None,
        value = fut => Some(value),
    }
}

/// Execute the index command.
///
/// The poller runs here and feeds an [`Indexer`] task over a bounded channel.
/// On ctrl-c the channel is closed, the indexer drains what was queued, and
/// its cursor reflects the last fully applied batch.
async fn run_index_command(
    config: &Config,
    interval: Option<u64>,
    start_block: Option<u64>,
) -> IndexerResult<()> {
    let contracts = config.contracts()?;
    let chain_id = config.chain_id();
    let interval = Duration::from_secs(interval.unwrap_or_else(|| config.poll_interval_secs()));

    let provider = create_provider(config.rpc_url()?).await?;
    check_connection(&provider, chain_id).await?;

    let repository = Repository::new(create_pool(config.database_url()).await?);
    let profiles = CachedProfileLookup::from_config(&config.profile_lookup())?;

    let mut next_block = resume_block(
        repository.cursor(chain_id).await?,
        start_block.unwrap_or_else(|| config.start_block()),
    );
    info!("Starting from block {}", next_block);
    println!(
        "{} {}",
        "🔍 Indexing from block".cyan().bold(),
        next_block.to_string().yellow()
    );

    let (tx, rx) = mpsc::channel(INGEST_CHANNEL_CAPACITY);
    let indexer = Indexer::new(repository, profiles);
    let consumer = tokio::spawn(async move { indexer.run(rx).await });

    let poller = Poller {
        provider: &provider,
        contracts: &contracts,
        chain_id,
        batch_size: config.batch_size(),
    };

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut poll_error = None;
    loop {
        match unless_shutdown(&mut shutdown, poller.poll_once(&mut next_block, &tx)).await {
            None => break,
            Some(Ok(queued)) => debug!("Queued {} batches", queued),
            Some(Err(e)) if tx.is_closed() => {
                poll_error = Some(e);
                break;
            }
            Some(Err(e)) => {
                error!("Error polling blocks: {}", e);
                println!("{} {}", "⚠️  Error:".red().bold(), e);
            }
        }

        if unless_shutdown(&mut shutdown, tokio::time::sleep(interval)).await.is_none() {
            break;
        }
    }

    println!("{}", "🛑 Shutting down gracefully...".yellow().bold());
    drop(tx);

    let summary = consumer
        .await
        .map_err(|e| IndexerError::state("Indexer task panicked", Some(Box::new(e))))??;
    if let Some(e) = poll_error {
        warn!("Poller stopped after indexer failure: {}", e);
    }

    println!(
        "{} {} events applied, {} duplicates skipped",
        "✅".green(),
        summary.applied.to_string().green().bold(),
        summary.duplicates
    );
    Ok(())
}

/// Execute the stats command.
async fn run_stats_command(config: &Config) -> IndexerResult<()> {
    let repository = Repository::new(create_pool(config.database_url()).await?);

    let Some(stats) = repository.global_stats().await? else {
        println!("{}", "No events indexed yet.".yellow().bold());
        return Ok(());
    };

    println!("{}", "📊 Global totals".cyan().bold());
    println!(
        "  {:<22} {}",
        "Unique players",
        stats.total_unique_players.to_string().yellow()
    );
    print_totals(&stats.totals);
    println!(
        "  {:<22} {}",
        "Updated at block",
        stats.updated_at_block.to_string().dimmed()
    );

    if let Some(cursor) = repository.cursor(config.chain_id()).await? {
        println!("  {:<22} {}", "Indexed through", cursor.to_string().dimmed());
    }
    Ok(())
}

/// Execute the player command.
async fn run_player_command(config: &Config, wallet: &str) -> IndexerResult<()> {
    let repository = Repository::new(create_pool(config.database_url()).await?);
    let wallet = normalize_wallet(wallet);

    let Some(player) = repository.player_stats(&wallet).await? else {
        println!("{} {}", "Player not found:".yellow().bold(), wallet);
        return Ok(());
    };

    println!("{} {}", "👤".cyan(), player.wallet.bold());
    if let Some(name) = &player.profile.name {
        println!("  {:<22} {}", "Name", name.green());
    }
    if let Some(tier) = &player.profile.verification {
        println!("  {:<22} {}", "Verification", tier);
    }
    if let Some(url) = &player.profile.image_url {
        println!("  {:<22} {}", "Avatar", url.dimmed());
    }
    println!(
        "  {:<22} {}",
        "First seen at block",
        player.first_seen_block.to_string().dimmed()
    );
    print_totals(&player.totals);
    Ok(())
}

/// Execute the serve command.
async fn run_serve_command(config: &Config, port: Option<u16>) -> IndexerResult<()> {
    let repository = Repository::new(create_pool(config.database_url()).await?);
    let state = AppState::new(repository, config.chain_id());

    let options = ServerOptions {
        port: port.unwrap_or_else(|| config.api_port()),
        rate_limit_rpm: config.api_rate_limit_rpm(),
        cors_origins: config.cors_origins().to_vec(),
    };
    println!(
        "{} {}",
        "🌐 Serving API on port".cyan().bold(),
        options.port.to_string().yellow()
    );

    run_server(state, options, shutdown_signal()).await
}

fn print_totals(totals: &Totals) {
    let rows: [(&str, String); 8] = [
        ("Purchases", totals.key_purchase_events.to_string()),
        ("Keys purchased", totals.keys_purchased.to_string()),
        ("Purchase amount", totals.key_purchase_amount.to_string()),
        ("Weekly claims", totals.weekly_claim_events.to_string()),
        ("Weekly claim amount", totals.weekly_claim_amount.to_string()),
        ("Jackpot claims", totals.jackpot_claim_events.to_string()),
        ("Jackpot claim amount", totals.jackpot_claim_amount.to_string()),
        ("Total claim amount", totals.total_claim_amount.to_string()),
    ];
    for (label, value) in rows {
        println!("  {:<22} {}", label, value.yellow());
    }
    println!(
        "  {:<22} {}",
        "Net profit",
        format_net_profit(&totals.net_profit_amount)
    );
}

/// Net profit, green when positive and red when negative.
fn format_net_profit(net: &BigInt) -> String {
    let text = net.to_string();
    match net.sign() {
        Sign::Minus => text.red().bold().to_string(),
        Sign::NoSign => text.white().bold().to_string(),
        Sign::Plus => format!("+{text}").green().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_block() {
        assert_eq!(resume_block(None, 500), 500);
        assert_eq!(resume_block(Some(900), 500), 901);
    }

    #[test]
    fn test_block_ranges() {
        assert_eq!(block_ranges(10, 25, 10), vec![(10, 19), (20, 25)]);
        assert_eq!(block_ranges(10, 10, 1000), vec![(10, 10)]);
        assert!(block_ranges(11, 10, 1000).is_empty());
    }

    #[test]
    fn test_block_ranges_at_u64_max() {
        assert_eq!(
            block_ranges(u64::MAX - 1, u64::MAX, 1),
            vec![(u64::MAX - 1, u64::MAX - 1), (u64::MAX, u64::MAX)]
        );
    }

    #[test]
    fn test_format_net_profit_sign() {
        colored::control::set_override(false);
        assert_eq!(format_net_profit(&BigInt::from(-30i64)), "-30");
        assert_eq!(format_net_profit(&BigInt::from(20i64)), "+20");
        assert_eq!(format_net_profit(&BigInt::default()), "0");
    }

    #[test]
    fn test_cli_parsing() {
        assert!(Cli::try_parse_from(["keyvault-indexer", "index"]).is_ok());
        assert!(Cli::try_parse_from(["keyvault-indexer", "stats"]).is_ok());
        assert!(Cli::try_parse_from(["keyvault-indexer", "serve"]).is_ok());
        assert!(Cli::try_parse_from(["keyvault-indexer", "player"]).is_err());
    }

    #[test]
    fn test_index_command_with_options() {
        let cli =
            Cli::try_parse_from(["keyvault-indexer", "index", "--interval", "30", "-s", "42"]);

        assert!(matches!(
            cli,
            Ok(Cli {
                command: Commands::Index {
                    interval: Some(30),
                    start_block: Some(42),
                },
            })
        ));
    }

    #[test]
    fn test_player_command_takes_wallet() {
        let cli = Cli::try_parse_from(["keyvault-indexer", "player", "0xABC"]).unwrap();
        assert!(matches!(cli.command, Commands::Player { ref wallet } if wallet == "0xABC"));
    }
}
