//! Cancellable background lock acquisition.
//!
//! [`LockGrabber`] starts acquiring a lock on a separate task and lets the
//! caller wait for whichever comes first: the lock, or a stop signal. Release
//! is the guard's `Drop`, so a grab that completes after the caller stopped
//! waiting releases the lock immediately instead of leaking it.

use std::future::Future;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// How a [`LockGrabber`] wait ended
#[derive(Debug)]
pub enum GrabOutcome<G> {
    /// The lock was acquired; dropping the guard releases it.
    Acquired(G),
    /// The stop signal fired first. Nothing is held by the grabber.
    Stopped,
}

/// Background acquirer racing a lock against a stop signal
#[derive(Debug)]
pub struct LockGrabber<G> {
    acquired: oneshot::Receiver<G>,
    stop: CancellationToken,
}

impl<G: Send + 'static> LockGrabber<G> {
    /// Begin acquiring on a background task owned by `tracker`.
    ///
    /// `acquire` must be cancel-safe: it is dropped without completing when
    /// `stop` fires first. Waiting on `tracker` therefore also waits until
    /// the grab has left the lock's queue.
    pub fn spawn<F>(tracker: &TaskTracker, acquire: F, stop: CancellationToken) -> Self
    where
        F: Future<Output = G> + Send + 'static,
    {
        let (tx, acquired) = oneshot::channel();
        let task_stop = stop.clone();

        tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = task_stop.cancelled() => {}
                guard = acquire => {
                    // Receiver gone means the waiter already stopped; the
                    // returned guard is dropped here, releasing the lock.
                    let _ = tx.send(guard);
                }
            }
        });

        Self { acquired, stop }
    }

    /// Wait until the lock is acquired or the stop signal fires.
    ///
    /// If both are ready, acquisition wins so that a held guard is never
    /// reported as stopped.
    pub async fn lock_or_stop(self) -> GrabOutcome<G> {
        let Self { mut acquired, stop } = self;
        tokio::select! {
            biased;
            guard = &mut acquired => {
                return match guard {
                    Ok(guard) => GrabOutcome::Acquired(guard),
                    Err(_) => GrabOutcome::Stopped,
                };
            }
            _ = stop.cancelled() => {}
        }

        // A guard may have landed between the two polls.
        match acquired.try_recv() {
            Ok(guard) => GrabOutcome::Acquired(guard),
            Err(_) => GrabOutcome::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_lock::StateLock;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_acquires_free_lock() {
        let tracker = TaskTracker::new();
        let lock = StateLock::new();
        let grabber = LockGrabber::spawn(&tracker, lock.acquire_read(), CancellationToken::new());

        let outcome = timeout(Duration::from_secs(1), grabber.lock_or_stop()).await.unwrap();
        assert!(matches!(outcome, GrabOutcome::Acquired(_)));
        assert!(lock.try_write().is_none(), "read guard should still be held");

        drop(outcome);
        assert!(lock.try_write().is_some());
    }

    #[tokio::test]
    async fn test_stop_while_lock_is_held_elsewhere() {
        let tracker = TaskTracker::new();
        let lock = StateLock::new();
        let writer = lock.write().await;
        let stop = CancellationToken::new();
        let grabber = LockGrabber::spawn(&tracker, lock.acquire_read(), stop.clone());

        let waiter = tokio::spawn(grabber.lock_or_stop());
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();

        let outcome = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(matches!(outcome, GrabOutcome::Stopped));

        // The abandoned grab must not keep a reader queued or held.
        drop(writer);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(lock.try_write().is_some());
    }

    #[tokio::test]
    async fn test_already_stopped_does_not_wait() {
        let tracker = TaskTracker::new();
        let lock = StateLock::new();
        let _writer = lock.write().await;
        let stop = CancellationToken::new();
        stop.cancel();

        let grabber = LockGrabber::spawn(&tracker, lock.acquire_read(), stop);
        let outcome = timeout(Duration::from_secs(1), grabber.lock_or_stop()).await.unwrap();
        assert!(matches!(outcome, GrabOutcome::Stopped));
    }

    #[tokio::test]
    async fn test_acquire_preferred_when_both_ready() {
        let tracker = TaskTracker::new();
        let stop = CancellationToken::new();
        let grabber = LockGrabber::spawn(&tracker, async { 7u32 }, stop.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();

        match grabber.lock_or_stop().await {
            GrabOutcome::Acquired(value) => assert_eq!(value, 7),
            GrabOutcome::Stopped => panic!("completed acquisition reported as stopped"),
        }
    }

    #[tokio::test]
    async fn test_abandoned_grab_is_tracked_until_it_leaves_the_queue() {
        let tracker = TaskTracker::new();
        let lock = StateLock::new();
        let writer = lock.write().await;
        let stop = CancellationToken::new();

        let grabber = LockGrabber::spawn(&tracker, lock.acquire_read(), stop.clone());
        assert_eq!(tracker.len(), 1);

        stop.cancel();
        assert!(matches!(grabber.lock_or_stop().await, GrabOutcome::Stopped));

        tracker.close();
        timeout(Duration::from_secs(1), tracker.wait()).await.expect("grab task should exit");
        assert!(tracker.is_empty());

        // Nothing queued behind the writer any more
        drop(writer);
        assert!(lock.try_write().is_some());
    }
}
