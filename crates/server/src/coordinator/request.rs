use idemgate_common::{Fingerprint, IdempotencyKey, Scope};

use super::error::CoordinatorError;
use crate::store::RecordKey;

#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub caller: &'a str,
    pub method: &'a str,
    /// Route template the request matched, e.g. `/v1/reminders/{id}`.
    pub route: &'a str,
    pub path_and_query: &'a str,
    pub key: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotentRequest {
    pub scope: Scope,
    pub key: IdempotencyKey,
    pub fingerprint: Fingerprint,
}

impl IdempotentRequest {
    pub fn resolve(parts: &RequestParts<'_>) -> Result<Self, CoordinatorError> {
        let key = IdempotencyKey::from_header(parts.key)?;
        let scope = Scope::resolve(parts.caller, parts.method, parts.route)?;
        let fingerprint = Fingerprint::of_request(parts.method, parts.path_and_query, parts.body);
        Ok(Self {
            scope,
            key,
            fingerprint,
        })
    }

    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(self.scope.clone(), self.key.clone())
    }
}
