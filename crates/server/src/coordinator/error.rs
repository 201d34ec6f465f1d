use std::time::Duration;

use thiserror::Error;

use idemgate_common::{KeyError, ScopeError};

use crate::store::StoreError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("invalid idempotent request: {0}")]
    Validation(String),
    #[error("an earlier request with this key is still being processed")]
    InFlightTimeout { retry_after: Duration },
    #[error("idempotency key was already used with a different request payload")]
    PayloadMismatch,
    #[error("execution lease was reclaimed by another request; result discarded")]
    StaleReclaim,
    #[error("idempotency store unavailable: {0}")]
    StorageUnavailable(String),
}

impl CoordinatorError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InFlightTimeout { .. } => "request_in_flight",
            Self::PayloadMismatch => "payload_mismatch",
            Self::StaleReclaim => "stale_reclaim",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<KeyError> for CoordinatorError {
    fn from(e: KeyError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ScopeError> for CoordinatorError {
    fn from(e: ScopeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}
