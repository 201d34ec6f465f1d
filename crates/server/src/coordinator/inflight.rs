use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;

use idemgate_common::time::now_ms;

use super::settings::CoordinatorSettings;
use crate::store::{IdempotencyRecord, RecordKey, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Resolved(IdempotencyRecord),
    Vanished,
    Stale,
    TimedOut,
}

#[derive(Default)]
struct Waiter {
    notify: Notify,
    count: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    waiters: Arc<DashMap<RecordKey, Arc<Waiter>>>,
}

struct WaitGuard {
    waiters: Arc<DashMap<RecordKey, Arc<Waiter>>>,
    key: RecordKey,
    waiter: Arc<Waiter>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.waiter.count.fetch_sub(1, Ordering::SeqCst);
        self.waiters.remove_if(&self.key, |_, w| {
            Arc::ptr_eq(w, &self.waiter) && w.count.load(Ordering::SeqCst) == 0
        });
    }
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, key: &RecordKey) -> WaitGuard {
        // The count is bumped while the entry's shard lock is held, so a
        // concurrent guard drop cannot remove a waiter that is being joined.
        let entry = self.waiters.entry(key.clone()).or_default();
        entry.count.fetch_add(1, Ordering::SeqCst);
        let waiter = Arc::clone(entry.value());
        drop(entry);
        WaitGuard {
            waiters: Arc::clone(&self.waiters),
            key: key.clone(),
            waiter,
        }
    }

    pub fn notify(&self, key: &RecordKey) {
        if let Some(w) = self.waiters.get(key) {
            w.notify.notify_waiters();
        }
    }

    pub fn watched_keys(&self) -> Vec<RecordKey> {
        self.waiters.iter().map(|e| e.key().clone()).collect()
    }

    pub fn waiting(&self, key: &RecordKey) -> usize {
        self.waiters
            .get(key)
            .map_or(0, |w| w.count.load(Ordering::SeqCst))
    }

    pub async fn wait<F, Fut>(
        &self,
        key: &RecordKey,
        settings: &CoordinatorSettings,
        mut read: F,
    ) -> Result<WaitOutcome, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<IdempotencyRecord>, StoreError>>,
    {
        let guard = self.register(key);
        let deadline = Instant::now() + settings.max_wait;
        let mut poll = settings.poll_interval;

        loop {
            let notified = guard.waiter.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match read().await? {
                None => return Ok(WaitOutcome::Vanished),
                Some(record) if record.state.is_terminal() => {
                    return Ok(WaitOutcome::Resolved(record))
                }
                Some(record) if record.is_stale(now_ms(), settings.stale_after) => {
                    return Ok(WaitOutcome::Stale)
                }
                Some(_) => {}
            }

            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(poll) => {
                    poll = (poll * 2).min(settings.max_poll_interval);
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RecordState, ResponseSnapshot};
    use idemgate_common::{Fingerprint, IdempotencyKey, Scope};
    use std::sync::Mutex;
    use std::time::Duration;

    fn key() -> RecordKey {
        RecordKey::new(
            Scope::resolve("alice", "POST", "/v1/reminders").unwrap(),
            IdempotencyKey::parse("k-1").unwrap(),
        )
    }

    fn pending() -> IdempotencyRecord {
        IdempotencyRecord::pending(
            &key(),
            &Fingerprint::of_bytes(b"a"),
            now_ms(),
            Duration::from_secs(60),
        )
    }

    fn settings(max_wait_ms: u64, poll_ms: u64) -> CoordinatorSettings {
        CoordinatorSettings {
            max_wait: Duration::from_millis(max_wait_ms),
            poll_interval: Duration::from_millis(poll_ms),
            max_poll_interval: Duration::from_millis(poll_ms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn notify_wakes_before_poll_tick() {
        let registry = InFlightRegistry::new();
        let shared = Arc::new(Mutex::new(Some(pending())));

        let waiter = {
            let registry = registry.clone();
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                registry
                    .wait(&key(), &settings(5_000, 60_000), || {
                        let snapshot = shared.lock().unwrap().clone();
                        async move { Ok(snapshot) }
                    })
                    .await
            })
        };

        while registry.waiting(&key()) == 0 {
            tokio::task::yield_now().await;
        }
        {
            let mut guard = shared.lock().unwrap();
            let rec = guard.as_mut().unwrap();
            rec.state = RecordState::Completed;
            rec.response = Some(ResponseSnapshot::new(201, "done"));
        }
        registry.notify(&key());

        let outcome = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Resolved(r) if r.state == RecordState::Completed));
        assert_eq!(registry.waiting(&key()), 0);
        assert!(registry.watched_keys().is_empty());
    }

    #[tokio::test]
    async fn polling_observes_external_completion() {
        let registry = InFlightRegistry::new();
        let reads = AtomicUsize::new(0);
        let outcome = registry
            .wait(&key(), &settings(5_000, 5), || {
                let n = reads.fetch_add(1, Ordering::SeqCst);
                let mut rec = pending();
                if n >= 3 {
                    rec.state = RecordState::Failed;
                }
                async move { Ok(Some(rec)) }
            })
            .await
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Resolved(r) if r.state == RecordState::Failed));
        assert!(reads.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn times_out_while_pending() {
        let registry = InFlightRegistry::new();
        let outcome = registry
            .wait(&key(), &settings(50, 10), || async { Ok(Some(pending())) })
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(registry.watched_keys().is_empty());
    }

    #[tokio::test]
    async fn vanished_record() {
        let registry = InFlightRegistry::new();
        let outcome = registry
            .wait(&key(), &settings(1_000, 10), || async { Ok(None) })
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Vanished);
    }

    #[tokio::test]
    async fn stale_pending_detected() {
        let registry = InFlightRegistry::new();
        let mut s = settings(1_000, 10);
        s.stale_after = Duration::from_millis(1);
        let mut old = pending();
        old.started_at_ms -= 10;
        let outcome = registry
            .wait(&key(), &s, || {
                let rec = old.clone();
                async move { Ok(Some(rec)) }
            })
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Stale);
    }

    #[tokio::test]
    async fn store_errors_propagate_and_release_waiter() {
        let registry = InFlightRegistry::new();
        let err = registry
            .wait(&key(), &settings(1_000, 10), || async {
                Err(StoreError::Unavailable("down".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(registry.waiting(&key()), 0);
    }

    #[tokio::test]
    async fn watched_while_waiting() {
        let registry = InFlightRegistry::new();
        let task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .wait(&key(), &settings(200, 10), || async { Ok(Some(pending())) })
                    .await
            })
        };
        while registry.waiting(&key()) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.watched_keys(), vec![key()]);
        assert_eq!(task.await.unwrap().unwrap(), WaitOutcome::TimedOut);
        assert!(registry.watched_keys().is_empty());
    }
}
