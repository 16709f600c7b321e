//! Cache store interface and backend selection
//!
//! Caching is an optimization: every implementation swallows its own
//! errors, and "always miss" is a valid operating mode for the pipeline.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::database::SqliteCacheStore;
use super::models::{AccountHandle, CacheEntry, ProfilePayload, Timestamp, now_millis};
use crate::config::{CacheConfig, CacheMode};
use crate::error::AppError;

/// Set to `1` by hosts whose filesystem is read-only at runtime
const READ_ONLY_HOST_ENV: &str = "VERCEL";

/// Key -> payload persistence with write timestamp
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name used in logs and metric labels
    fn backend(&self) -> &'static str;

    /// Look up the entry for `key`; errors are reported as a miss
    async fn get(&self, key: &AccountHandle) -> Option<CacheEntry>;

    /// Overwrite the entry for `key` and return its `updated_at`
    async fn set(&self, key: &AccountHandle, payload: &ProfilePayload) -> Timestamp;
}

/// Pass-through store for hosts without writable persistent storage
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheStore;

#[async_trait]
impl CacheStore for NoopCacheStore {
    fn backend(&self) -> &'static str {
        "noop"
    }

    async fn get(&self, _key: &AccountHandle) -> Option<CacheEntry> {
        use crate::metrics::CACHE_MISSES_TOTAL;
        CACHE_MISSES_TOTAL.with_label_values(&["noop"]).inc();
        None
    }

    async fn set(&self, _key: &AccountHandle, _payload: &ProfilePayload) -> Timestamp {
        now_millis()
    }
}

/// Select the cache backend once at startup
///
/// # Errors
/// Returns error only for `cache.mode = "sqlite"` when the database
/// cannot be opened. `auto` degrades to the no-op store instead.
pub async fn open_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, AppError> {
    open_with_write_check(config, host_is_read_only()).await
}

fn host_is_read_only() -> bool {
    std::env::var(READ_ONLY_HOST_ENV).is_ok_and(|value| value == "1")
}

async fn open_with_write_check(
    config: &CacheConfig,
    read_only_host: bool,
) -> Result<Arc<dyn CacheStore>, AppError> {
    match config.mode {
        CacheMode::Disabled => {
            tracing::info!("Profile cache disabled by configuration");
            Ok(Arc::new(NoopCacheStore))
        }
        CacheMode::Sqlite => {
            let store = SqliteCacheStore::connect(&config.path).await?;
            tracing::info!(path = %config.path.display(), "Profile cache opened");
            Ok(Arc::new(store))
        }
        CacheMode::Auto => {
            if read_only_host {
                tracing::info!(
                    env = READ_ONLY_HOST_ENV,
                    "Read-only host detected; profile cache runs as a no-op"
                );
                return Ok(Arc::new(NoopCacheStore));
            }

            if let Err(error) = check_writable(&config.path) {
                tracing::warn!(
                    %error,
                    path = %config.path.display(),
                    "Cache directory is not writable; profile cache runs as a no-op"
                );
                return Ok(Arc::new(NoopCacheStore));
            }

            match SqliteCacheStore::connect(&config.path).await {
                Ok(store) => {
                    tracing::info!(path = %config.path.display(), "Profile cache opened");
                    Ok(Arc::new(store))
                }
                Err(error) => {
                    tracing::error!(%error, "Failed to initialize SQLite cache; falling back to no-op");
                    Ok(Arc::new(NoopCacheStore))
                }
            }
        }
    }
}

/// Create the cache directory and write/remove a marker file in it
fn check_writable(db_path: &Path) -> std::io::Result<()> {
    let dir = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let marker = dir.join(".giftsync-write-check");
    std::fs::write(&marker, b"ok")?;
    std::fs::remove_file(&marker)
}
