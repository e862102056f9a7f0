//! HTTP read API over the indexed aggregates.

pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
