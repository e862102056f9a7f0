//! Error types for the key vault indexer.
//!
//! This module provides a unified error type [`IndexerError`] covering every
//! failure that can occur while ingesting events, updating aggregates, and
//! serving them back out.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`IndexerError::ConfigError`]: Configuration and environment issues
//! - [`IndexerError::RpcError`]: RPC provider and network errors
//! - [`IndexerError::DecodingError`]: Log decoding and stored-value parsing errors
//! - [`IndexerError::StateError`]: Aggregate consistency errors
//! - [`IndexerError::MathError`]: Counter overflow and signed conversion errors
//! - [`IndexerError::DatabaseError`]: Storage failures
//! - [`IndexerError::HttpError`]: Outbound HTTP failures (profile lookups)
//!
//! Profile lookups never surface [`IndexerError::HttpError`] to event handlers:
//! the lookup effect degrades every failure to an empty profile. The variant
//! exists so the raw client can report what went wrong before it is classified.
//!
//! # Example
//!
//! ```
//! use keyvault_indexer::error::{IndexerError, IndexerResult};
//!
//! fn validate_week(week: u64) -> IndexerResult<()> {
//!     if week == 0 {
//!         return Err(IndexerError::state("week cannot be zero", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`IndexerError`].
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Boxed error source carried by every variant that wraps another error.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the indexer.
#[derive(Debug)]
pub enum IndexerError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing or invalid environment variables
    /// - Invalid contract addresses or URLs
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// RPC provider or network errors.
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Event decoding or stored value parsing errors.
    ///
    /// Variants include:
    /// - Signature mismatch or malformed log data
    /// - Missing block metadata on a log
    /// - Corrupt decimal TEXT columns
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Aggregate consistency errors.
    StateError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Arithmetic errors.
    ///
    /// Raised when an event or claimer counter would overflow 256 bits.
    MathError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Database operation errors.
    ///
    /// Variants include:
    /// - Connection failures
    /// - Query execution errors
    /// - Migration failures
    /// - Transaction errors
    DatabaseError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Outbound HTTP errors.
    ///
    /// `status` is set when the remote answered with a non-success code and
    /// left empty for transport failures and timeouts.
    HttpError {
        /// Human-readable error message
        message: String,
        /// Response status code, if a response was received
        status: Option<u16>,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },
}

impl IndexerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use keyvault_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::config("RPC_URL not set", None);
    /// assert!(matches!(err, IndexerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use keyvault_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::decoding("Log missing block number", None);
    /// assert!(matches!(err, IndexerError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new state error.
    #[must_use]
    pub fn state(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::StateError {
            message: message.into(),
            source,
        }
    }

    /// Create a new math error.
    ///
    /// # Example
    ///
    /// ```
    /// use keyvault_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::math("keysPurchased overflow", None);
    /// assert!(matches!(err, IndexerError::MathError { .. }));
    /// ```
    #[must_use]
    pub fn math(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::MathError {
            message: message.into(),
            source,
        }
    }

    /// Create a new database error.
    #[must_use]
    pub fn database(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source,
        }
    }

    /// Create a new HTTP error.
    ///
    /// # Example
    ///
    /// ```
    /// use keyvault_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::http("profile service unavailable", Some(503), None);
    /// assert_eq!(err.http_status(), Some(503));
    /// ```
    #[must_use]
    pub fn http(
        message: impl Into<String>,
        status: Option<u16>,
        source: Option<BoxedSource>,
    ) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
            source,
        }
    }

    /// Status code of an [`IndexerError::HttpError`], if one was received.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => *status,
            _ => None,
        }
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::StateError { message, .. } => write!(f, "State error: {message}"),
            Self::MathError { message, .. } => write!(f, "Math error: {message}"),
            Self::DatabaseError { message, .. } => write!(f, "Database error: {message}"),
            Self::HttpError {
                message,
                status: Some(status),
                ..
            } => write!(f, "HTTP error ({status}): {message}"),
            Self::HttpError { message, .. } => write!(f, "HTTP error: {message}"),
        }
    }
}

impl std::error::Error for IndexerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::StateError { source, .. }
            | Self::MathError { source, .. }
            | Self::DatabaseError { source, .. }
            | Self::HttpError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}

/// Convert from `eyre::Report` to `IndexerError`.
///
/// Used for wrapping eyre errors that don't fit into a specific category.
/// The error is categorized as an RPC error by default.
impl From<eyre::Report> for IndexerError {
    fn from(err: eyre::Report) -> Self {
        Self::RpcError {
            message: err.to_string(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = IndexerError::config("test error", None);
        assert!(matches!(err, IndexerError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_decoding_error() {
        let err = IndexerError::decoding("invalid log", None);
        assert_eq!(err.to_string(), "Decoding error: invalid log");
    }

    #[test]
    fn test_math_error() {
        let err = IndexerError::math("overflow", None);
        assert!(matches!(err, IndexerError::MathError { .. }));
        assert_eq!(err.to_string(), "Math error: overflow");
    }

    #[test]
    fn test_http_error_display_with_and_without_status() {
        let with_status = IndexerError::http("rate limited", Some(429), None);
        assert_eq!(with_status.to_string(), "HTTP error (429): rate limited");
        assert_eq!(with_status.http_status(), Some(429));

        let transport = IndexerError::http("connection reset", None, None);
        assert_eq!(transport.to_string(), "HTTP error: connection reset");
        assert_eq!(transport.http_status(), None);
    }

    #[test]
    fn test_http_status_is_none_for_other_variants() {
        assert_eq!(IndexerError::database("x", None).http_status(), None);
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = IndexerError::config("failed to load", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Configuration error: failed to load");
    }

    #[test]
    fn test_from_eyre_report() {
        let err: IndexerError = eyre::eyre!("boom").into();
        assert!(matches!(err, IndexerError::RpcError { .. }));
    }
}
