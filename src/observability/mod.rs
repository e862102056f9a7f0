//! Observability and structured logging infrastructure.
//!
//! # Features
//!
//! - **Structured Logging**: Key-value pairs for machine-parseable logs
//! - **Span Tracking**: Every handled event runs in a span carrying its id
//! - **Multiple Formats**: Console (pretty/JSON) and file output
//! - **Environment Filtering**: `RUST_LOG` variable support
//!
//! # Usage
//!
//! ```no_run
//! use keyvault_indexer::observability;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keep the guard alive for the whole run, or file output stops.
//!     let _guard = observability::init_tracing(None, None, false)?;
//!     Ok(())
//! }
//! ```
//!
//! # Environment Configuration
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=keyvault_indexer=debug,sqlx=warn keyvault-indexer index
//!
//! # JSON output for production
//! LOG_JSON=true keyvault-indexer index
//!
//! # Daily rotated log file
//! LOG_FILE=./logs/indexer.log keyvault-indexer index
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_FILTER: &str = "keyvault_indexer=info,warn";

/// Pick the log filter: `RUST_LOG`, then `log_level`, then [`DEFAULT_FILTER`].
#[must_use]
pub fn build_filter(rust_log: Option<String>, log_level: Option<String>) -> EnvFilter {
    rust_log
        .or(log_level)
        .map_or_else(|| EnvFilter::new(DEFAULT_FILTER), EnvFilter::new)
}

/// Initialize the tracing subscriber.
///
/// * `log_level` - Level override (e.g. "debug"), used when `RUST_LOG` is unset
/// * `log_file` - Enables a daily rotated JSON log file at this path
/// * `json_output` - JSON console output instead of pretty output
///
/// Returns the file writer guard when file logging is on. Dropping it stops
/// file output, so hold it until shutdown.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = build_filter(std::env::var("RUST_LOG").ok(), log_level);

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .boxed()
    };

    let mut guard = None;
    let file_layer = if let Some(ref path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("indexer.log")),
        );
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        // File output is always JSON.
        Some(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized successfully"
    );

    Ok(guard)
}

/// Initialize tracing for tests; output goes to the test harness.
#[cfg(test)]
pub fn init_test_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}
