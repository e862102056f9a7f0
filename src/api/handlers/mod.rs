//! HTTP handlers for API endpoints.

use alloy::primitives::U256;

use crate::api::middleware::error::ApiError;
use crate::stats::normalize_wallet;

pub mod health;
pub mod jackpots;
pub mod players;
pub mod stats;
pub mod weeks;

/// Largest page a list endpoint serves.
const MAX_LIMIT: u32 = 1000;

/// Validate a `0x`-prefixed 20-byte wallet and lower-case it.
pub(crate) fn parse_wallet(raw: &str) -> Result<String, ApiError> {
    let valid = raw.len() == 42
        && (raw.starts_with("0x") || raw.starts_with("0X"))
        && raw[2..].chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(normalize_wallet(raw))
    } else {
        Err(ApiError::BadRequest(format!("Invalid wallet address: {raw}")))
    }
}

/// Parse a week or nonce path segment.
pub(crate) fn parse_number(what: &str, raw: &str) -> Result<U256, ApiError> {
    U256::from_str_radix(raw, 10)
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}

pub(crate) fn check_limit(limit: u32) -> Result<u32, ApiError> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}
