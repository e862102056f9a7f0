//! CLI entry point for the key vault stats indexer.
//!
//! # Architecture Flow
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli.rs  → config.rs (environment)
//!     ├── index:  rpc.rs → events.rs → [mpsc] → indexer/ → db/ (SQLite)
//!     │                                    └── profile/ (cached, rate-limited)
//!     ├── stats / player: db/
//!     └── serve:  api/ → db/
//! ```
//!
//! All errors bubble up as `IndexerResult<T>`.

use keyvault_indexer::{cli, observability};
use tracing::error;

/// Entry point for the key vault stats indexer.
///
/// Logging is controlled by environment variables:
/// - `RUST_LOG`: filter directives (e.g. `keyvault_indexer=debug,sqlx=warn`)
/// - `LOG_LEVEL`: plain level used when `RUST_LOG` is unset
/// - `LOG_JSON`: JSON console output ("true" or "false")
/// - `LOG_FILE`: additional daily rotated JSON log file
#[tokio::main]
async fn main() {
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .ok()
        .and_then(|value| value.parse::<bool>().ok())
        .unwrap_or(false);

    // Held until exit so buffered file logs are flushed.
    let _log_guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
