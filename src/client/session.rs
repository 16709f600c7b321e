//! Consumer-side gifts session
//!
//! Tracks the account a viewer is looking at, keeps the latest response for
//! it and polls while the service reports a background refresh.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use super::ClientError;
use super::poll::PollScheduler;
use crate::api::ProfileGiftsResponse;
use crate::data::AccountHandle;

/// Where a session loads gift listings from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GiftsSource: Send + Sync {
    async fn load(&self, handle: &AccountHandle) -> Result<ProfileGiftsResponse, ClientError>;
}

/// How a load was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Requested by the viewer; never schedules a poll
    Interactive,
    /// Background re-fetch; polls again while the service is refreshing
    Silent,
}

/// A viewer's gifts session
pub struct GiftsSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    source: Arc<dyn GiftsSource>,
    active: watch::Sender<Option<AccountHandle>>,
    poll: PollScheduler,
    latest: Mutex<Option<ProfileGiftsResponse>>,
}

impl GiftsSession {
    pub fn new(source: Arc<dyn GiftsSource>, poll_delay: Duration) -> Self {
        let (active, watcher) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                source,
                active,
                poll: PollScheduler::new(poll_delay, watcher),
                latest: Mutex::new(None),
            }),
        }
    }

    /// Open the session on `handle` and load it
    ///
    /// # Errors
    /// Returns the source's error; the session stays open on `handle`.
    pub async fn open(
        &self,
        handle: AccountHandle,
    ) -> Result<Option<ProfileGiftsResponse>, ClientError> {
        self.activate(Some(handle));
        self.refresh(LoadMode::Interactive).await
    }

    /// Show another account, dropping any poll bound to the previous one
    pub async fn switch_account(
        &self,
        handle: AccountHandle,
    ) -> Result<Option<ProfileGiftsResponse>, ClientError> {
        if self.active().as_ref() == Some(&handle) {
            return self.refresh(LoadMode::Interactive).await;
        }

        tracing::debug!(account = %handle, "Switching account");
        self.activate(Some(handle));
        self.refresh(LoadMode::Interactive).await
    }

    /// Load the active account
    ///
    /// Returns `None` if the session is closed, or if the active account
    /// changed while the load was in flight (the response is discarded).
    pub async fn refresh(
        &self,
        mode: LoadMode,
    ) -> Result<Option<ProfileGiftsResponse>, ClientError> {
        self.inner.clone().load(mode).await
    }

    /// Close the session, cancelling any pending poll
    pub fn close(&self) {
        self.activate(None);
    }

    pub fn active(&self) -> Option<AccountHandle> {
        self.inner.active.borrow().clone()
    }

    /// Latest response stored for the active account
    pub fn latest(&self) -> Option<ProfileGiftsResponse> {
        lock(&self.inner.latest).clone()
    }

    pub fn poll_pending(&self) -> bool {
        self.inner.poll.is_pending()
    }

    /// `latest` is held across the switch so a load for the previous
    /// account cannot store its response under the new one
    fn activate(&self, handle: Option<AccountHandle>) {
        self.inner.poll.cancel();
        let mut latest = lock(&self.inner.latest);
        *latest = None;
        self.inner.active.send_replace(handle);
    }
}

impl SessionInner {
    /// Boxed so the poll callback can re-enter it
    fn load(
        self: Arc<Self>,
        mode: LoadMode,
    ) -> BoxFuture<'static, Result<Option<ProfileGiftsResponse>, ClientError>> {
        async move {
            let active = self.active.borrow().clone();
            let Some(handle) = active else {
                return Ok(None);
            };

            let response = self.source.load(&handle).await?;

            {
                let mut latest = lock(&self.latest);
                let still_active = self.active.borrow().as_ref() == Some(&handle);
                if !still_active {
                    tracing::debug!(account = %handle, "Discarding response for inactive account");
                    return Ok(None);
                }
                *latest = Some(response.clone());
            }

            if mode == LoadMode::Silent && response.cached && response.refreshing {
                self.schedule_poll(handle);
            }

            Ok(Some(response))
        }
        .boxed()
    }

    fn schedule_poll(self: &Arc<Self>, handle: AccountHandle) {
        let session: Weak<SessionInner> = Arc::downgrade(self);

        self.poll.schedule(handle, move |handle| async move {
            let Some(session) = session.upgrade() else {
                return;
            };

            if let Err(error) = session.load(LoadMode::Silent).await {
                tracing::warn!(account = %handle, %error, "Poll reload failed");
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
