use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::fingerprint_store::{
    decide_begin, decide_transition, BeginDecision, BeginOutcome, BeginRequest, FingerprintStore,
    StoreError, Transition,
};
use super::record::{IdempotencyRecord, RecordKey, RecordState, ResponseSnapshot};

#[derive(Clone, Default)]
pub struct MemoryFingerprintStore {
    records: Arc<DashMap<RecordKey, IdempotencyRecord>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn transition(
        &self,
        key: &RecordKey,
        lease: Uuid,
        state: RecordState,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Transition {
        let Some(mut record) = self.records.get_mut(key) else {
            return Transition::Missing;
        };
        let transition = decide_transition(Some(&*record), lease);
        if transition == Transition::Applied {
            record.state = state;
            record.response = Some(response.clone());
            record.completed_at_ms = Some(now_ms);
        }
        transition
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn begin(&self, request: &BeginRequest) -> Result<BeginOutcome, StoreError> {
        let outcome = match self.records.entry(request.key.clone()) {
            Entry::Vacant(slot) => {
                let record = IdempotencyRecord::pending(
                    &request.key,
                    &request.fingerprint,
                    request.now_ms,
                    request.ttl,
                );
                let lease = record.lease;
                slot.insert(record);
                BeginOutcome::Began {
                    lease,
                    reclaimed: false,
                }
            }
            Entry::Occupied(mut slot) => match decide_begin(Some(slot.get()), request) {
                BeginDecision::Insert => {
                    let record = IdempotencyRecord::pending(
                        &request.key,
                        &request.fingerprint,
                        request.now_ms,
                        request.ttl,
                    );
                    let lease = record.lease;
                    slot.insert(record);
                    BeginOutcome::Began {
                        lease,
                        reclaimed: false,
                    }
                }
                BeginDecision::Reclaim => {
                    let record = slot.get_mut();
                    record.lease = Uuid::new_v4();
                    record.started_at_ms = request.now_ms;
                    BeginOutcome::Began {
                        lease: record.lease,
                        reclaimed: true,
                    }
                }
                BeginDecision::Existing(outcome) => outcome,
            },
        };
        Ok(outcome)
    }

    async fn complete(
        &self,
        key: &RecordKey,
        lease: Uuid,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError> {
        Ok(self.transition(key, lease, RecordState::Completed, response, now_ms))
    }

    async fn fail(
        &self,
        key: &RecordKey,
        lease: Uuid,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError> {
        Ok(self.transition(key, lease, RecordState::Failed, response, now_ms))
    }

    async fn get(
        &self,
        key: &RecordKey,
        now_ms: i64,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self
            .records
            .get(key)
            .filter(|r| !r.is_expired(now_ms))
            .map(|r| r.value().clone()))
    }

    async fn sweep_expired(&self, now_ms: i64, keep: &[RecordKey]) -> Result<u64, StoreError> {
        let keep: HashSet<&RecordKey> = keep.iter().collect();
        let mut purged = 0u64;
        self.records.retain(|k, r| {
            if r.is_expired(now_ms) && !keep.contains(k) {
                purged += 1;
                false
            } else {
                true
            }
        });
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idemgate_common::{Fingerprint, IdempotencyKey, Scope};
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);
    const STALE: Duration = Duration::from_secs(5);

    fn key(k: &str) -> RecordKey {
        RecordKey::new(
            Scope::resolve("user-1", "POST", "/v1/reminders").unwrap(),
            IdempotencyKey::parse(k).unwrap(),
        )
    }

    fn begin_req(k: &str, body: &[u8], now_ms: i64) -> BeginRequest {
        BeginRequest {
            key: key(k),
            fingerprint: Fingerprint::of_bytes(body),
            now_ms,
            ttl: TTL,
            stale_after: STALE,
        }
    }

    fn lease_of(outcome: BeginOutcome) -> Uuid {
        match outcome {
            BeginOutcome::Began { lease, .. } => lease,
            other => panic!("expected Began, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn begin_then_complete_then_replay() {
        let store = MemoryFingerprintStore::new();
        let lease = lease_of(store.begin(&begin_req("k-1", b"a", 0)).await.unwrap());

        let pending = store.begin(&begin_req("k-1", b"a", 10)).await.unwrap();
        assert!(matches!(pending, BeginOutcome::AlreadyPending(_)));

        let resp = ResponseSnapshot::new(201, "created");
        let t = store.complete(&key("k-1"), lease, &resp, 20).await.unwrap();
        assert_eq!(t, Transition::Applied);

        match store.begin(&begin_req("k-1", b"a", 30)).await.unwrap() {
            BeginOutcome::Completed(rec) => {
                assert_eq!(rec.state, RecordState::Completed);
                assert_eq!(rec.response, Some(resp));
                assert_eq!(rec.completed_at_ms, Some(20));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn double_completion_is_rejected() {
        let store = MemoryFingerprintStore::new();
        let lease = lease_of(store.begin(&begin_req("k-1", b"a", 0)).await.unwrap());
        let first = ResponseSnapshot::new(201, "first");
        let second = ResponseSnapshot::new(500, "second");

        assert_eq!(
            store.complete(&key("k-1"), lease, &first, 1).await.unwrap(),
            Transition::Applied
        );
        assert_eq!(
            store.fail(&key("k-1"), lease, &second, 2).await.unwrap(),
            Transition::NotPending
        );
        let rec = store.get(&key("k-1"), 3).await.unwrap().unwrap();
        assert_eq!(rec.state, RecordState::Completed);
        assert_eq!(rec.response, Some(first));
    }

    #[tokio::test]
    async fn fail_records_failed_state() {
        let store = MemoryFingerprintStore::new();
        let lease = lease_of(store.begin(&begin_req("k-1", b"a", 0)).await.unwrap());
        let resp = ResponseSnapshot::error(422, "invalid", "bad title");
        store.fail(&key("k-1"), lease, &resp, 5).await.unwrap();
        let rec = store.get(&key("k-1"), 6).await.unwrap().unwrap();
        assert_eq!(rec.state, RecordState::Failed);
        assert_eq!(rec.response, Some(resp));
    }

    #[tokio::test]
    async fn mismatch_does_not_overwrite() {
        let store = MemoryFingerprintStore::new();
        let lease = lease_of(store.begin(&begin_req("k-1", b"a", 0)).await.unwrap());
        let outcome = store.begin(&begin_req("k-1", b"b", 1)).await.unwrap();
        assert!(matches!(outcome, BeginOutcome::FingerprintMismatch(_)));
        let rec = store.get(&key("k-1"), 2).await.unwrap().unwrap();
        assert_eq!(rec.lease, lease);
        assert_eq!(rec.fingerprint, Fingerprint::of_bytes(b"a"));
    }

    #[tokio::test]
    async fn stale_pending_reclaimed_and_old_lease_rejected() {
        let store = MemoryFingerprintStore::new();
        let old = lease_of(store.begin(&begin_req("k-1", b"a", 0)).await.unwrap());

        let reclaimed = store.begin(&begin_req("k-1", b"a", 5_000)).await.unwrap();
        let new = match reclaimed {
            BeginOutcome::Began {
                lease,
                reclaimed: true,
            } => lease,
            other => panic!("expected reclaim, got {other:?}"),
        };
        assert_ne!(old, new);

        let late = ResponseSnapshot::new(201, "late");
        assert_eq!(
            store.complete(&key("k-1"), old, &late, 5_100).await.unwrap(),
            Transition::LeaseLost
        );
        let fresh = ResponseSnapshot::new(201, "fresh");
        assert_eq!(
            store.complete(&key("k-1"), new, &fresh, 5_200).await.unwrap(),
            Transition::Applied
        );
        let rec = store.get(&key("k-1"), 5_300).await.unwrap().unwrap();
        assert_eq!(rec.response, Some(fresh));
        assert_eq!(rec.created_at_ms, 0);
    }

    #[tokio::test]
    async fn completing_unknown_key_is_missing() {
        let store = MemoryFingerprintStore::new();
        let resp = ResponseSnapshot::new(200, "");
        assert_eq!(
            store.complete(&key("nope"), Uuid::new_v4(), &resp, 0).await.unwrap(),
            Transition::Missing
        );
    }

    #[tokio::test]
    async fn expired_records_read_absent_and_are_reusable() {
        let store = MemoryFingerprintStore::new();
        let lease = lease_of(store.begin(&begin_req("k-1", b"a", 0)).await.unwrap());
        store
            .complete(&key("k-1"), lease, &ResponseSnapshot::new(201, "x"), 1)
            .await
            .unwrap();

        let expiry = 60_000;
        assert!(store.get(&key("k-1"), expiry - 1).await.unwrap().is_some());
        assert!(store.get(&key("k-1"), expiry).await.unwrap().is_none());

        let again = store.begin(&begin_req("k-1", b"other", expiry)).await.unwrap();
        assert!(matches!(again, BeginOutcome::Began { reclaimed: false, .. }));
    }

    #[tokio::test]
    async fn sweep_purges_expired_except_kept() {
        let store = MemoryFingerprintStore::new();
        store.begin(&begin_req("old-1", b"a", 0)).await.unwrap();
        store.begin(&begin_req("old-2", b"a", 0)).await.unwrap();
        store.begin(&begin_req("new", b"a", 30_000)).await.unwrap();

        let purged = store.sweep_expired(60_000, &[key("old-2")]).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 2);
        assert!(store.records.contains_key(&key("old-2")));
        assert!(store.records.contains_key(&key("new")));

        let purged = store.sweep_expired(60_000, &[]).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_begins_elect_one_executor() {
        let store = MemoryFingerprintStore::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.begin(&begin_req("race", b"a", 1)).await.unwrap()
            }));
        }
        let mut began = 0;
        for h in handles {
            match h.await.unwrap() {
                BeginOutcome::Began { .. } => began += 1,
                BeginOutcome::AlreadyPending(_) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(began, 1);
    }
}
