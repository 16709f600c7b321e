//! Profile gifts service
//!
//! Serves cached payloads immediately and refreshes them in the background.
//! Only a cold cache makes the caller wait for the external fetch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::RefreshCoordinator;
use crate::data::{AccountHandle, CacheStore, DecorationColors, ProfilePayload, Timestamp};
use crate::error::AppError;
use crate::fetcher::ProfileFetcher;

/// Payload as served, with its freshness metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileGifts {
    pub payload: ProfilePayload,
    /// Worn decoration as reported by the profile lookup
    pub decoration: Option<Value>,
    /// Served from the cache rather than a fetch made for this request
    pub cached: bool,
    pub updated_at: Timestamp,
    /// A background refresh for this account is still running
    pub refreshing: bool,
}

/// Decoration data resolved for one request
struct Decoration {
    colors: DecorationColors,
    worn_gift: Option<Value>,
}

/// Stale-while-revalidate gift listing service
pub struct GiftService {
    fetcher: Arc<dyn ProfileFetcher>,
    cache: Arc<dyn CacheStore>,
    coordinator: Arc<RefreshCoordinator>,
    decoration_timeout: Duration,
}

impl GiftService {
    pub fn new(
        fetcher: Arc<dyn ProfileFetcher>,
        cache: Arc<dyn CacheStore>,
        coordinator: Arc<RefreshCoordinator>,
        decoration_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache,
            coordinator,
            decoration_timeout,
        }
    }

    /// Get an account's gifts
    ///
    /// # Cache hit
    /// Returns the cached payload and starts a background refresh. Missing
    /// decoration colors are looked up within `decoration_timeout`.
    ///
    /// # Cache miss
    /// Fetches synchronously, stores the result, then looks up missing
    /// decoration colors without the short deadline.
    ///
    /// # Errors
    /// Returns `AppError::Fetch` if the fetch on a cache miss fails.
    /// Decoration failures are never fatal.
    pub async fn get_profile_gifts(&self, handle: &AccountHandle) -> Result<ProfileGifts, AppError> {
        if let Some(entry) = self.cache.get(handle).await {
            self.coordinator.request_refresh(handle);

            let decoration = if entry.payload.decoration_colors.is_none() {
                self.lookup_decoration(handle, Some(self.decoration_timeout))
                    .await
            } else {
                None
            };

            return Ok(self.assemble(handle, entry.payload, decoration, true, entry.updated_at));
        }

        tracing::info!(account = %handle, "Profile cache miss; fetching");
        let payload = self.fetcher.fetch_profile(handle).await?;
        let updated_at = self.cache.set(handle, &payload).await;

        let decoration = if payload.decoration_colors.is_none() {
            self.lookup_decoration(handle, None).await
        } else {
            None
        };

        Ok(self.assemble(handle, payload, decoration, false, updated_at))
    }

    fn assemble(
        &self,
        handle: &AccountHandle,
        mut payload: ProfilePayload,
        decoration: Option<Decoration>,
        cached: bool,
        updated_at: Timestamp,
    ) -> ProfileGifts {
        let worn_gift = match decoration {
            Some(decoration) => {
                payload.decoration_colors = Some(decoration.colors);
                decoration.worn_gift
            }
            None => None,
        };

        ProfileGifts {
            payload,
            decoration: worn_gift,
            cached,
            updated_at,
            refreshing: self.coordinator.is_refreshing(handle),
        }
    }

    /// Look up decoration colors, optionally racing a deadline
    ///
    /// A lookup that loses the race is dropped, which kills its process.
    async fn lookup_decoration(
        &self,
        handle: &AccountHandle,
        deadline: Option<Duration>,
    ) -> Option<Decoration> {
        let lookup = self.fetcher.fetch_decoration(handle);
        let result = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, lookup).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        account = %handle,
                        timeout_ms = deadline.as_millis() as u64,
                        "Decoration lookup timed out"
                    );
                    return None;
                }
            },
            None => lookup.await,
        };

        match result {
            Ok(data) => {
                let (center_source, edge_source) = crate::decoration::explain(&data);
                tracing::debug!(
                    account = %handle,
                    center = center_source.unwrap_or("default"),
                    edge = edge_source.unwrap_or("derived"),
                    "Resolved decoration colors"
                );

                Some(Decoration {
                    colors: crate::decoration::resolve(&data),
                    worn_gift: data.get("worn_gift").filter(|v| !v.is_null()).cloned(),
                })
            }
            Err(error) => {
                tracing::warn!(
                    account = %handle,
                    kind = error.kind(),
                    %error,
                    "Decoration lookup failed"
                );
                None
            }
        }
    }
}
