//! Delayed re-poll while a background refresh is running
//!
//! At most one poll is outstanding. A poll is bound to the account that was
//! active when it was scheduled and is skipped if another account became
//! active in the meantime.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::data::AccountHandle;

struct PendingPoll {
    generation: u64,
    task: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<PendingPoll>>>;

/// Single-slot delayed callback scheduler
pub struct PollScheduler {
    delay: Duration,
    active: watch::Receiver<Option<AccountHandle>>,
    pending: Slot,
    generations: AtomicU64,
}

impl PollScheduler {
    /// `active` tracks the account the consumer currently shows
    pub fn new(delay: Duration, active: watch::Receiver<Option<AccountHandle>>) -> Self {
        Self {
            delay,
            active,
            pending: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
        }
    }

    /// Schedule `on_fire` for `handle` after the configured delay
    ///
    /// Returns `false` without scheduling if a poll is already pending.
    /// The slot is cleared before `on_fire` runs, so the callback may
    /// schedule the next poll.
    pub fn schedule<F, Fut>(&self, handle: AccountHandle, on_fire: F) -> bool
    where
        F: FnOnce(AccountHandle) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        if pending.is_some() {
            tracing::debug!(account = %handle, "Poll already pending");
            return false;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let slot = self.pending.clone();
        let active = self.active.clone();
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut pending = lock(&slot);
                if pending
                    .as_ref()
                    .is_some_and(|poll| poll.generation == generation)
                {
                    pending.take();
                }
            }

            let current = active.borrow().clone();
            if current.as_ref() != Some(&handle) {
                tracing::debug!(
                    scheduled = %handle,
                    active = ?current.as_ref().map(AccountHandle::as_str),
                    "Active account changed; skipping poll"
                );
                return;
            }

            on_fire(handle).await;
        });

        *pending = Some(PendingPoll { generation, task });
        true
    }

    /// Cancel the pending poll, if any
    pub fn cancel(&self) {
        if let Some(poll) = lock(&self.pending).take() {
            poll.task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const DELAY: Duration = Duration::from_millis(30);
    const SETTLE: Duration = Duration::from_millis(150);

    fn handle(raw: &str) -> AccountHandle {
        AccountHandle::parse(raw).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let fired = Arc::new(AtomicUsize::new(0));
        let read = fired.clone();
        (fired, move || read.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn fires_for_the_active_account() {
        let (_tx, rx) = watch::channel(Some(handle("alice")));
        let scheduler = PollScheduler::new(DELAY, rx);
        let (fired, count) = counter();

        assert!(scheduler.schedule(handle("alice"), move |_| async move {
            fired.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(scheduler.is_pending());

        tokio::time::sleep(SETTLE).await;
        assert_eq!(count(), 1);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test]
    async fn stale_poll_is_skipped_after_switching_accounts() {
        let (tx, rx) = watch::channel(Some(handle("alice")));
        let scheduler = PollScheduler::new(DELAY, rx);
        let (fired, count) = counter();

        scheduler.schedule(handle("alice"), move |_| async move {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        tx.send_replace(Some(handle("bob")));

        tokio::time::sleep(SETTLE).await;
        assert_eq!(count(), 0);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test]
    async fn at_most_one_poll_is_outstanding() {
        let (_tx, rx) = watch::channel(Some(handle("alice")));
        let scheduler = PollScheduler::new(DELAY, rx);
        let (fired, count) = counter();

        for _ in 0..3 {
            let fired = fired.clone();
            scheduler.schedule(handle("alice"), move |_| async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(SETTLE).await;
        assert_eq!(count(), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_the_fire() {
        let (_tx, rx) = watch::channel(Some(handle("alice")));
        let scheduler = PollScheduler::new(DELAY, rx);
        let (fired, count) = counter();

        scheduler.schedule(handle("alice"), move |_| async move {
            fired.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel();
        assert!(!scheduler.is_pending());

        tokio::time::sleep(SETTLE).await;
        assert_eq!(count(), 0);
    }

    #[tokio::test]
    async fn dropping_the_scheduler_cancels_the_poll() {
        let (_tx, rx) = watch::channel(Some(handle("alice")));
        let (fired, count) = counter();

        {
            let scheduler = PollScheduler::new(DELAY, rx);
            scheduler.schedule(handle("alice"), move |_| async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(SETTLE).await;
        assert_eq!(count(), 0);
    }
}
