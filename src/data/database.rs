//! SQLite cache persistence
//!
//! Single writer, many readers: the database runs in WAL journal mode so
//! readers never block on the background refresh writing a new payload.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::cache::CacheStore;
use super::models::{AccountHandle, CacheEntry, ProfilePayload, Timestamp, now_millis};
use crate::error::AppError;

const BACKEND: &str = "sqlite";

/// Persistent cache store backed by SQLite
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`
    ///
    /// Creates the parent directory, enables WAL, and runs migrations.
    ///
    /// # Errors
    /// Returns error if the directory or database cannot be created
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        Ok(Self { pool })
    }

    async fn load(&self, key: &AccountHandle) -> Result<Option<CacheEntry>, AppError> {
        let row = sqlx::query("SELECT payload, updated_at FROM profile_cache WHERE profile = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.try_get("payload")?;
        let updated_at: i64 = row.try_get("updated_at")?;
        let payload: ProfilePayload =
            serde_json::from_str(&payload).map_err(|e| AppError::Internal(e.into()))?;

        Ok(Some(CacheEntry {
            key: key.clone(),
            payload,
            updated_at,
        }))
    }

    async fn store(
        &self,
        key: &AccountHandle,
        payload: &ProfilePayload,
        updated_at: Timestamp,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(payload).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO profile_cache (profile, payload, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(profile) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(payload)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &AccountHandle) -> Option<CacheEntry> {
        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

        match self.load(key).await {
            Ok(Some(entry)) => {
                CACHE_HITS_TOTAL.with_label_values(&[BACKEND]).inc();
                Some(entry)
            }
            Ok(None) => {
                CACHE_MISSES_TOTAL.with_label_values(&[BACKEND]).inc();
                None
            }
            Err(error) => {
                tracing::warn!(%error, account = %key, "Error reading from cache");
                CACHE_MISSES_TOTAL.with_label_values(&[BACKEND]).inc();
                None
            }
        }
    }

    async fn set(&self, key: &AccountHandle, payload: &ProfilePayload) -> Timestamp {
        let updated_at = now_millis();
        if let Err(error) = self.store(key, payload, updated_at).await {
            tracing::warn!(%error, account = %key, "Error writing to cache");
        }
        updated_at
    }
}
