use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    executions_total: AtomicU64,
    replays_total: AtomicU64,
    waits_total: AtomicU64,
    inflight_timeouts_total: AtomicU64,
    payload_mismatches_total: AtomicU64,
    stale_reclaims_total: AtomicU64,
    rejected_completions_total: AtomicU64,
    validation_errors_total: AtomicU64,
    storage_errors_total: AtomicU64,
    records_swept_total: AtomicU64,
    operation_latency_sum_us: AtomicU64,
    operation_latency_count: AtomicU64,
}

impl CoordinatorMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_executions(&self) {
        self.executions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_replays(&self) {
        self.replays_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_waits(&self) {
        self.waits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inflight_timeouts(&self) {
        self.inflight_timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_payload_mismatches(&self) {
        self.payload_mismatches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_reclaims(&self) {
        self.stale_reclaims_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_completions(&self) {
        self.rejected_completions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_validation_errors(&self) {
        self.validation_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_storage_errors(&self) {
        self.storage_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_swept(&self, n: u64) {
        self.records_swept_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_operation_latency(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.operation_latency_sum_us.fetch_add(us, Ordering::Relaxed);
        self.operation_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn executions_total(&self) -> u64 {
        self.executions_total.load(Ordering::Relaxed)
    }

    pub fn replays_total(&self) -> u64 {
        self.replays_total.load(Ordering::Relaxed)
    }

    pub fn waits_total(&self) -> u64 {
        self.waits_total.load(Ordering::Relaxed)
    }

    pub fn inflight_timeouts_total(&self) -> u64 {
        self.inflight_timeouts_total.load(Ordering::Relaxed)
    }

    pub fn payload_mismatches_total(&self) -> u64 {
        self.payload_mismatches_total.load(Ordering::Relaxed)
    }

    pub fn stale_reclaims_total(&self) -> u64 {
        self.stale_reclaims_total.load(Ordering::Relaxed)
    }

    pub fn rejected_completions_total(&self) -> u64 {
        self.rejected_completions_total.load(Ordering::Relaxed)
    }

    pub fn validation_errors_total(&self) -> u64 {
        self.validation_errors_total.load(Ordering::Relaxed)
    }

    pub fn storage_errors_total(&self) -> u64 {
        self.storage_errors_total.load(Ordering::Relaxed)
    }

    pub fn records_swept_total(&self) -> u64 {
        self.records_swept_total.load(Ordering::Relaxed)
    }

    pub fn operation_latency_vals(&self) -> (u64, u64) {
        (
            self.operation_latency_sum_us.load(Ordering::Relaxed),
            self.operation_latency_count.load(Ordering::Relaxed),
        )
    }
}
