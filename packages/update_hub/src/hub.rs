use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::state::Update;

/// Result of waiting for something newer than a known version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The hub holds a version past the caller's `last_seen`.
    Updated(Update),
    /// Nothing newer arrived in time; `last_seen` is handed back untouched so
    /// the caller can retry with the same value.
    TimedOut { last_seen: u64 },
}

/// Owner of the shared state.
///
/// Publishing replaces payload and version under a single lock, so readers
/// never see one without the other. Parked waiters are woken by the version
/// change itself; the hub never needs to know who is waiting.
pub struct NotificationHub {
    state: watch::Sender<Update>,
}

impl NotificationHub {
    pub fn new(initial_payload: impl Into<String>) -> Self {
        let (state, _) = watch::channel(Update::initial(initial_payload.into()));
        Self { state }
    }

    /// Replace the current payload, bump the version and wake every waiter
    /// whose `last_seen` is now behind. Returns the new version.
    pub fn publish(&self, payload: impl Into<String>) -> u64 {
        let payload = payload.into();
        let mut version = 0;
        self.state.send_modify(|update| {
            update.advance(payload);
            version = update.version;
        });
        debug!(version, waiters = self.waiting(), "Published update");
        version
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> Update {
        self.state.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Number of live waiter registrations.
    pub fn waiting(&self) -> usize {
        self.state.receiver_count()
    }

    /// Register a waiter for anything newer than `last_seen`.
    pub fn waiter(&self, last_seen: u64) -> Waiter {
        Waiter {
            last_seen,
            rx: self.state.subscribe(),
        }
    }

    /// Return the current state immediately if it is newer than `last_seen`,
    /// otherwise park until a publish passes it or `timeout` elapses.
    pub async fn wait_for_update(&self, last_seen: u64, timeout: Duration) -> WaitOutcome {
        self.waiter(last_seen).wait(timeout).await
    }
}

/// One parked consumer.
///
/// The registration lives exactly as long as the value: it is released when
/// [`Waiter::wait`] returns, or when the waiting future is dropped.
pub struct Waiter {
    last_seen: u64,
    rx: watch::Receiver<Update>,
}

impl Waiter {
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub async fn wait(mut self, timeout: Duration) -> WaitOutcome {
        let last_seen = self.last_seen;

        // wait_for checks the current value before parking, so a publish that
        // landed between registration and this call is still observed.
        let result =
            tokio::time::timeout(timeout, self.rx.wait_for(|u| u.is_newer_than(last_seen))).await;

        match result {
            Ok(Ok(update)) => WaitOutcome::Updated(Update::clone(&update)),
            Ok(Err(_)) => {
                trace!(last_seen, "Hub dropped while waiting");
                WaitOutcome::TimedOut { last_seen }
            }
            Err(_) => {
                trace!(last_seen, "Wait timed out");
                WaitOutcome::TimedOut { last_seen }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_returns_immediately_when_newer_exists() {
        let hub = NotificationHub::new("init");
        hub.publish("first");

        let outcome = hub.wait_for_update(0, Duration::from_secs(15)).await;
        match outcome {
            WaitOutcome::Updated(update) => {
                assert_eq!(update.payload, "first");
                assert_eq!(update.version, 1);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_many_publishes_coalesce_to_latest() {
        let hub = NotificationHub::new("init");
        for i in 1..=10 {
            hub.publish(format!("msg-{}", i));
        }

        let WaitOutcome::Updated(update) = hub.wait_for_update(0, Duration::from_secs(1)).await
        else {
            panic!("expected update");
        };
        assert_eq!(update.payload, "msg-10");
        assert_eq!(update.version, 10);
    }

    #[tokio::test]
    async fn test_same_payload_still_bumps_version() {
        let hub = NotificationHub::new("x");
        assert_eq!(hub.publish("x"), 1);
        assert_eq!(hub.publish("x"), 2);
        assert_eq!(hub.version(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_sentinel_after_full_duration() {
        let hub = NotificationHub::new("init");
        hub.publish("a");

        let start = tokio::time::Instant::now();
        let outcome = hub.wait_for_update(1, Duration::from_secs(15)).await;

        assert_eq!(outcome, WaitOutcome::TimedOut { last_seen: 1 });
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(15));
        assert!(elapsed < Duration::from_secs(15) + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_waiter_registration() {
        let hub = NotificationHub::new("init");
        assert_eq!(hub.waiting(), 0);

        let outcome = hub.wait_for_update(0, Duration::from_millis(50)).await;
        assert!(matches!(outcome, WaitOutcome::TimedOut { last_seen: 0 }));
        assert_eq!(hub.waiting(), 0);
    }

    #[tokio::test]
    async fn test_parked_waiter_released_only_by_newer_publish() {
        let hub = Arc::new(NotificationHub::new("init"));

        let hub_wait = hub.clone();
        let handle =
            tokio::spawn(async move { hub_wait.wait_for_update(0, Duration::from_secs(5)).await });

        while hub.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());

        hub.publish("wake");
        let outcome = handle.await.unwrap();
        assert!(matches!(
            outcome,
            WaitOutcome::Updated(Update { version: 1, .. })
        ));
        assert_eq!(hub.waiting(), 0);
    }

    #[tokio::test]
    async fn test_back_to_back_publishes_deliver_latest_to_parked_waiter() {
        let hub = Arc::new(NotificationHub::new("init"));

        let hub_wait = hub.clone();
        let handle =
            tokio::spawn(async move { hub_wait.wait_for_update(0, Duration::from_secs(5)).await });

        while hub.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        hub.publish("A");
        hub.publish("B");

        let WaitOutcome::Updated(update) = handle.await.unwrap() else {
            panic!("expected update");
        };
        assert_eq!(update.payload, "B");
        assert_eq!(update.version, 2);
    }

    #[tokio::test]
    async fn test_every_parked_waiter_is_released() {
        let hub = Arc::new(NotificationHub::new("init"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hub = hub.clone();
                tokio::spawn(async move { hub.wait_for_update(0, Duration::from_secs(5)).await })
            })
            .collect();

        while hub.waiting() < 8 {
            tokio::task::yield_now().await;
        }

        hub.publish("broadcast");
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(matches!(outcome, WaitOutcome::Updated(_)));
        }
    }

    #[tokio::test]
    async fn test_dropped_wait_future_deregisters() {
        let hub = NotificationHub::new("init");
        {
            let fut = hub.wait_for_update(0, Duration::from_secs(60));
            tokio::pin!(fut);
            let _ = tokio::time::timeout(Duration::from_millis(10), &mut fut).await;
            assert_eq!(hub.waiting(), 1);
        }
        assert_eq!(hub.waiting(), 0);
    }

    #[tokio::test]
    async fn test_waiter_keeps_last_seen() {
        let hub = NotificationHub::new("init");
        let waiter = hub.waiter(7);
        assert_eq!(waiter.last_seen(), 7);
        assert_eq!(hub.waiting(), 1);
        drop(waiter);
        assert_eq!(hub.waiting(), 0);
    }
}
