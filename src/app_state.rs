//! Shared application state for the API server.

use std::sync::Arc;
use std::time::SystemTime;

use crate::db::Repository;

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository for database access.
    pub repository: Arc<Repository>,
    /// Chain whose cursor the health check reports.
    pub chain_id: u64,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create a new `AppState` instance.
    #[must_use]
    pub fn new(repository: Repository, chain_id: u64) -> Self {
        Self {
            repository: Arc::new(repository),
            chain_id,
            start_time: SystemTime::now(),
        }
    }
}
