use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use uuid::Uuid;

use idemgate_common::retry::{retry_async_when, RetryConfig};
use idemgate_common::time::now_ms;

use super::error::CoordinatorError;
use super::inflight::{InFlightRegistry, WaitOutcome};
use super::replay::{replay, Outcome};
use super::request::{IdempotentRequest, RequestParts};
use super::settings::CoordinatorSettings;
use super::sweeper::ExpirySweeper;
use crate::metrics::CoordinatorMetrics;
use crate::store::{
    BeginOutcome, BeginRequest, FingerprintStore, IdempotencyRecord, RecordKey, ResponseSnapshot,
    StoreError, Transition,
};

const MAX_ROUNDS: usize = 3;

enum Acquired {
    Lease(Uuid),
    Done(Outcome),
}

#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn FingerprintStore>,
    inflight: InFlightRegistry,
    settings: CoordinatorSettings,
    retry: RetryConfig,
    metrics: Arc<CoordinatorMetrics>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        settings: CoordinatorSettings,
        retry: RetryConfig,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            store,
            inflight: InFlightRegistry::new(),
            settings,
            retry,
            metrics,
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<CoordinatorMetrics> {
        &self.metrics
    }

    pub fn inflight(&self) -> &InFlightRegistry {
        &self.inflight
    }

    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::clone(&self.store),
            self.inflight.clone(),
            Arc::clone(&self.metrics),
        )
    }

    pub fn resolve(&self, parts: &RequestParts<'_>) -> Result<IdempotentRequest, CoordinatorError> {
        IdempotentRequest::resolve(parts).inspect_err(|e| {
            self.metrics.inc_validation_errors();
            tracing::warn!(route = parts.route, error = %e, "idempotent request rejected");
        })
    }

    pub async fn ping(&self) -> Result<(), CoordinatorError> {
        self.with_retry(|| self.store.ping())
            .await
            .map_err(CoordinatorError::from)
    }

    pub async fn execute<F, Fut>(
        &self,
        request: &IdempotentRequest,
        op: F,
    ) -> Result<Outcome, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResponseSnapshot>,
    {
        let key = request.record_key();
        match self.acquire(request, &key).await? {
            Acquired::Done(outcome) => Ok(outcome),
            Acquired::Lease(lease) => self.run(&key, lease, op).await,
        }
    }

    async fn acquire(
        &self,
        request: &IdempotentRequest,
        key: &RecordKey,
    ) -> Result<Acquired, CoordinatorError> {
        for round in 1..=MAX_ROUNDS {
            let begin = BeginRequest {
                key: key.clone(),
                fingerprint: request.fingerprint.clone(),
                now_ms: now_ms(),
                ttl: self.settings.ttl,
                stale_after: self.settings.stale_after,
            };
            let outcome = self
                .with_retry(|| self.store.begin(&begin))
                .await
                .map_err(|e| self.storage_failure("begin", key, e))?;

            match outcome {
                BeginOutcome::Began { lease, reclaimed } => {
                    if reclaimed {
                        self.metrics.inc_stale_reclaims();
                        tracing::warn!(
                            scope = %key.scope, key = %key.key, %lease,
                            "stale pending record reclaimed, re-executing"
                        );
                    } else {
                        tracing::debug!(scope = %key.scope, key = %key.key, "executing");
                    }
                    return Ok(Acquired::Lease(lease));
                }
                BeginOutcome::Completed(record) => {
                    return self.replayed(key, &record).map(Acquired::Done);
                }
                BeginOutcome::FingerprintMismatch(_) => {
                    self.metrics.inc_payload_mismatches();
                    tracing::warn!(
                        scope = %key.scope, key = %key.key,
                        "idempotency key reused with a different payload"
                    );
                    return Err(CoordinatorError::PayloadMismatch);
                }
                BeginOutcome::AlreadyPending(_) => {
                    self.metrics.inc_waits();
                    tracing::debug!(scope = %key.scope, key = %key.key, round, "waiting on in-flight request");
                    let waited = self
                        .inflight
                        .wait(key, &self.settings, || {
                            self.with_retry(|| self.store.get(key, now_ms()))
                        })
                        .await
                        .map_err(|e| self.storage_failure("get", key, e))?;

                    match waited {
                        WaitOutcome::Resolved(record)
                            if record.fingerprint == request.fingerprint =>
                        {
                            return self.replayed(key, &record).map(Acquired::Done);
                        }
                        WaitOutcome::Resolved(_) | WaitOutcome::Vanished | WaitOutcome::Stale => {
                            tracing::debug!(
                                scope = %key.scope, key = %key.key, round,
                                "in-flight record changed, retrying begin"
                            );
                        }
                        WaitOutcome::TimedOut => return Err(self.inflight_timeout(key)),
                    }
                }
            }
        }
        Err(self.inflight_timeout(key))
    }

    async fn run<F, Fut>(
        &self,
        key: &RecordKey,
        lease: Uuid,
        op: F,
    ) -> Result<Outcome, CoordinatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResponseSnapshot>,
    {
        self.metrics.inc_executions();
        let started = Instant::now();
        let response = match AssertUnwindSafe(async move { op().await })
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(_) => {
                tracing::error!(scope = %key.scope, key = %key.key, "operation panicked, recording failure");
                ResponseSnapshot::error(500, "internal_error", "operation panicked")
            }
        };
        self.metrics.record_operation_latency(started);

        let now = now_ms();
        let recorded = if response.is_failure() {
            self.with_retry(|| self.store.fail(key, lease, &response, now))
                .await
        } else {
            self.with_retry(|| self.store.complete(key, lease, &response, now))
                .await
        };
        self.inflight.notify(key);

        match recorded.map_err(|e| self.storage_failure("record", key, e))? {
            Transition::Applied => {
                tracing::debug!(
                    scope = %key.scope, key = %key.key, status = response.status_code,
                    "outcome recorded"
                );
                Ok(Outcome::Fresh(response))
            }
            rejected => {
                self.metrics.inc_rejected_completions();
                tracing::warn!(
                    scope = %key.scope, key = %key.key, %lease, transition = ?rejected,
                    "completion rejected, discarding result"
                );
                Err(CoordinatorError::StaleReclaim)
            }
        }
    }

    fn replayed(
        &self,
        key: &RecordKey,
        record: &IdempotencyRecord,
    ) -> Result<Outcome, CoordinatorError> {
        let outcome = replay(record).map_err(|e| self.storage_failure("replay", key, e))?;
        self.metrics.inc_replays();
        tracing::debug!(
            scope = %key.scope, key = %key.key, state = record.state.as_str(),
            "replaying stored response"
        );
        Ok(outcome)
    }

    fn inflight_timeout(&self, key: &RecordKey) -> CoordinatorError {
        self.metrics.inc_inflight_timeouts();
        tracing::warn!(scope = %key.scope, key = %key.key, "gave up waiting on in-flight request");
        CoordinatorError::InFlightTimeout {
            retry_after: self.settings.retry_after(),
        }
    }

    fn storage_failure(&self, step: &str, key: &RecordKey, e: StoreError) -> CoordinatorError {
        self.metrics.inc_storage_errors();
        tracing::error!(step, scope = %key.scope, key = %key.key, error = %e, "idempotency store failed");
        CoordinatorError::from(e)
    }

    async fn with_retry<T, F, Fut>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        retry_async_when(&self.retry, StoreError::is_transient, f).await
    }
}
