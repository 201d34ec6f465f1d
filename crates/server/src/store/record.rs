use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use idemgate_common::time::duration_ms;
use idemgate_common::{Fingerprint, IdempotencyKey, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    Pending,
    Completed,
    Failed,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json<T: Serialize>(status_code: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status_code, body).with_header("content-type", "application/json"),
            Err(e) => Self::error(500, "serialization_failed", &e.to_string()),
        }
    }

    pub fn error(status_code: u16, code: &str, message: &str) -> Self {
        let body = serde_json::json!({ "error": code, "message": message });
        Self::new(status_code, body.to_string()).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status_code >= 400
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub scope: Scope,
    pub key: IdempotencyKey,
}

impl RecordKey {
    pub fn new(scope: Scope, key: IdempotencyKey) -> Self {
        Self { scope, key }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    pub scope: Scope,
    pub key: IdempotencyKey,
    pub fingerprint: Fingerprint,
    pub state: RecordState,
    pub response: Option<ResponseSnapshot>,
    pub lease: Uuid,
    pub created_at_ms: i64,
    pub started_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    pub expires_at_ms: i64,
}

impl IdempotencyRecord {
    pub fn pending(key: &RecordKey, fingerprint: &Fingerprint, now_ms: i64, ttl: Duration) -> Self {
        Self {
            scope: key.scope.clone(),
            key: key.key.clone(),
            fingerprint: fingerprint.clone(),
            state: RecordState::Pending,
            response: None,
            lease: Uuid::new_v4(),
            created_at_ms: now_ms,
            started_at_ms: now_ms,
            completed_at_ms: None,
            expires_at_ms: now_ms.saturating_add(duration_ms(ttl)),
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_stale(&self, now_ms: i64, stale_after: Duration) -> bool {
        self.state == RecordState::Pending
            && now_ms.saturating_sub(self.started_at_ms) >= duration_ms(stale_after)
    }
}
