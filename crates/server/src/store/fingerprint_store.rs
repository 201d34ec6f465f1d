use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use idemgate_common::Fingerprint;

use super::record::{IdempotencyRecord, RecordKey, RecordState, ResponseSnapshot};

#[derive(Debug, Clone)]
pub struct BeginRequest {
    pub key: RecordKey,
    pub fingerprint: Fingerprint,
    pub now_ms: i64,
    pub ttl: Duration,
    pub stale_after: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    Began { lease: Uuid, reclaimed: bool },
    AlreadyPending(IdempotencyRecord),
    Completed(IdempotencyRecord),
    FingerprintMismatch(IdempotencyRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    NotPending,
    LeaseLost,
    Missing,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[async_trait]
pub trait FingerprintStore: Send + Sync {
    async fn begin(&self, request: &BeginRequest) -> Result<BeginOutcome, StoreError>;

    async fn complete(
        &self,
        key: &RecordKey,
        lease: Uuid,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError>;

    async fn fail(
        &self,
        key: &RecordKey,
        lease: Uuid,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError>;

    /// Expired records read as absent.
    async fn get(&self, key: &RecordKey, now_ms: i64)
        -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Deletes records with `expires_at <= now_ms`, except those listed in `keep`.
    async fn sweep_expired(&self, now_ms: i64, keep: &[RecordKey]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BeginDecision {
    Insert,
    Reclaim,
    Existing(BeginOutcome),
}

pub(crate) fn decide_begin(
    existing: Option<&IdempotencyRecord>,
    request: &BeginRequest,
) -> BeginDecision {
    let Some(record) = existing else {
        return BeginDecision::Insert;
    };
    if record.is_expired(request.now_ms) {
        return BeginDecision::Insert;
    }
    if record.fingerprint != request.fingerprint {
        return BeginDecision::Existing(BeginOutcome::FingerprintMismatch(record.clone()));
    }
    match record.state {
        RecordState::Pending if record.is_stale(request.now_ms, request.stale_after) => {
            BeginDecision::Reclaim
        }
        RecordState::Pending => BeginDecision::Existing(BeginOutcome::AlreadyPending(record.clone())),
        RecordState::Completed | RecordState::Failed => {
            BeginDecision::Existing(BeginOutcome::Completed(record.clone()))
        }
    }
}

pub(crate) fn decide_transition(existing: Option<&IdempotencyRecord>, lease: Uuid) -> Transition {
    match existing {
        None => Transition::Missing,
        Some(r) if r.lease != lease => Transition::LeaseLost,
        Some(r) if r.state.is_terminal() => Transition::NotPending,
        Some(_) => Transition::Applied,
    }
}
