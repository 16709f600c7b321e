//! Background refresh coordinator
//!
//! Keeps at most one background refresh in flight per account. The registry
//! holds a shared handle to each running refresh so late callers can await
//! its outcome instead of starting another fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::data::{AccountHandle, CacheStore};
use crate::fetcher::ProfileFetcher;

/// Result of one background refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh payload written to the cache
    Updated,
    /// Fetch failed; the cached entry was left untouched
    Failed,
}

type InflightRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;
type Registry = Arc<Mutex<HashMap<AccountHandle, InflightRefresh>>>;

/// Per-account single-flight refresh registry
pub struct RefreshCoordinator {
    fetcher: Arc<dyn ProfileFetcher>,
    cache: Arc<dyn CacheStore>,
    inflight: Registry,
}

impl RefreshCoordinator {
    pub fn new(fetcher: Arc<dyn ProfileFetcher>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            fetcher,
            cache,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a background refresh for `handle` unless one is already running
    ///
    /// Returns `true` if a new refresh was started. The refresh runs on its
    /// own task and outlives the request that triggered it.
    pub fn request_refresh(&self, handle: &AccountHandle) -> bool {
        use crate::metrics::REFRESHES_IN_FLIGHT;

        let refresh = {
            let mut inflight = lock(&self.inflight);
            if inflight.contains_key(handle) {
                tracing::debug!(account = %handle, "Refresh already in flight");
                return false;
            }

            REFRESHES_IN_FLIGHT.inc();
            let guard = InflightGuard {
                registry: self.inflight.clone(),
                handle: handle.clone(),
            };
            let refresh = run_refresh(
                self.fetcher.clone(),
                self.cache.clone(),
                handle.clone(),
                guard,
            )
            .boxed()
            .shared();

            inflight.insert(handle.clone(), refresh.clone());
            refresh
        };

        tokio::spawn(refresh);
        true
    }

    /// Whether a background refresh for `handle` is in flight
    pub fn is_refreshing(&self, handle: &AccountHandle) -> bool {
        lock(&self.inflight).contains_key(handle)
    }

    /// Whether any account has a background refresh in flight
    pub fn is_any_refreshing(&self) -> bool {
        !lock(&self.inflight).is_empty()
    }

    /// Await the in-flight refresh for `handle`, if any
    pub async fn wait(&self, handle: &AccountHandle) -> Option<RefreshOutcome> {
        let refresh = lock(&self.inflight).get(handle).cloned()?;
        Some(refresh.await)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the registry entry when the refresh finishes or is dropped
struct InflightGuard {
    registry: Registry,
    handle: AccountHandle,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        use crate::metrics::REFRESHES_IN_FLIGHT;

        lock(&self.registry).remove(&self.handle);
        REFRESHES_IN_FLIGHT.dec();
    }
}

async fn run_refresh(
    fetcher: Arc<dyn ProfileFetcher>,
    cache: Arc<dyn CacheStore>,
    handle: AccountHandle,
    guard: InflightGuard,
) -> RefreshOutcome {
    use crate::metrics::REFRESHES_TOTAL;

    tracing::info!(account = %handle, "Background refresh started");

    let outcome = match fetcher.fetch_profile(&handle).await {
        Ok(payload) => {
            let updated_at = cache.set(&handle, &payload).await;
            tracing::info!(
                account = %handle,
                gifts = payload.gifts.len(),
                updated_at,
                "Background refresh completed"
            );
            REFRESHES_TOTAL.with_label_values(&["success"]).inc();
            RefreshOutcome::Updated
        }
        Err(error) => {
            tracing::warn!(
                account = %handle,
                kind = error.kind(),
                %error,
                "Background refresh failed"
            );
            REFRESHES_TOTAL.with_label_values(&["failure"]).inc();
            RefreshOutcome::Failed
        }
    };

    drop(guard);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{NoopCacheStore, ProfileInfo, ProfilePayload};
    use crate::fetcher::{FetchError, MockProfileFetcher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn payload(username: &str) -> ProfilePayload {
        ProfilePayload {
            gifts: vec![],
            profile: ProfileInfo {
                id: None,
                username: username.to_string(),
                display_name: username.to_string(),
                photo_data_url: None,
                decoration_colors: None,
            },
            total: 0,
            nft_count: 0,
            total_value: 0.0,
            decoration_colors: None,
            fetched_at: 0,
        }
    }

    /// Fetcher that blocks until released and counts invocations
    struct GatedFetcher {
        calls: AtomicUsize,
        release: Semaphore,
    }

    #[async_trait]
    impl ProfileFetcher for GatedFetcher {
        async fn fetch_profile(
            &self,
            handle: &AccountHandle,
        ) -> Result<ProfilePayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
            Ok(payload(handle.as_str()))
        }

        async fn fetch_decoration(
            &self,
            _handle: &AccountHandle,
        ) -> Result<serde_json::Value, FetchError> {
            Ok(serde_json::json!({ "success": true }))
        }
    }

    fn gated() -> Arc<GatedFetcher> {
        Arc::new(GatedFetcher {
            calls: AtomicUsize::new(0),
            release: Semaphore::new(0),
        })
    }

    #[tokio::test]
    async fn concurrent_requests_start_one_refresh_per_account() {
        let fetcher = gated();
        let coordinator = RefreshCoordinator::new(fetcher.clone(), Arc::new(NoopCacheStore));
        let alice = AccountHandle::parse("alice").unwrap();

        assert!(coordinator.request_refresh(&alice));
        assert!(!coordinator.request_refresh(&alice));
        assert!(!coordinator.request_refresh(&alice));
        assert!(coordinator.is_refreshing(&alice));

        tokio::task::yield_now().await;
        fetcher.release.add_permits(1);

        assert_eq!(coordinator.wait(&alice).await, Some(RefreshOutcome::Updated));
        assert!(!coordinator.is_refreshing(&alice));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn accounts_refresh_independently() {
        let fetcher = gated();
        let coordinator = RefreshCoordinator::new(fetcher.clone(), Arc::new(NoopCacheStore));
        let alice = AccountHandle::parse("alice").unwrap();
        let bob = AccountHandle::parse("bob").unwrap();

        assert!(coordinator.request_refresh(&alice));
        assert!(coordinator.request_refresh(&bob));
        assert!(coordinator.is_refreshing(&bob));
        assert!(coordinator.is_any_refreshing());

        fetcher.release.add_permits(2);

        coordinator.wait(&alice).await;
        coordinator.wait(&bob).await;
        assert!(!coordinator.is_any_refreshing());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_clears_marker() {
        let mut fetcher = MockProfileFetcher::new();
        fetcher.expect_fetch_profile().times(2).returning(|_| {
            Err(FetchError::Exit {
                code: Some(1),
                message: "rate limited".to_string(),
            })
        });

        let coordinator = RefreshCoordinator::new(Arc::new(fetcher), Arc::new(NoopCacheStore));
        let alice = AccountHandle::parse("alice").unwrap();

        assert!(coordinator.request_refresh(&alice));
        assert_eq!(coordinator.wait(&alice).await, Some(RefreshOutcome::Failed));
        assert!(!coordinator.is_refreshing(&alice));

        assert!(coordinator.request_refresh(&alice));
        coordinator.wait(&alice).await;
    }

    #[tokio::test]
    async fn wait_without_refresh_returns_none() {
        let coordinator = RefreshCoordinator::new(gated(), Arc::new(NoopCacheStore));
        let alice = AccountHandle::parse("alice").unwrap();
        assert_eq!(coordinator.wait(&alice).await, None);
    }
}
