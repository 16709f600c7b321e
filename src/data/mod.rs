//! Data layer module
//!
//! Handles payload persistence:
//! - Data models shared by every layer
//! - Cache store interface with SQLite and no-op backends

mod cache;
mod database;
mod models;

pub use cache::{CacheStore, NoopCacheStore, open_cache_store};
pub use database::SqliteCacheStore;
pub use models::*;

#[cfg(test)]
mod database_test;
