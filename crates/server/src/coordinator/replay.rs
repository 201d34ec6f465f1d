use crate::store::{IdempotencyRecord, ResponseSnapshot, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Fresh(ResponseSnapshot),
    Replayed(ResponseSnapshot),
}

impl Outcome {
    pub fn snapshot(&self) -> &ResponseSnapshot {
        match self {
            Self::Fresh(s) | Self::Replayed(s) => s,
        }
    }

    pub fn into_snapshot(self) -> ResponseSnapshot {
        match self {
            Self::Fresh(s) | Self::Replayed(s) => s,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }
}

pub fn replay(record: &IdempotencyRecord) -> Result<Outcome, StoreError> {
    if !record.state.is_terminal() {
        return Err(StoreError::Corrupt(format!(
            "record {} is still {}",
            record.key,
            record.state.as_str()
        )));
    }
    record
        .response
        .clone()
        .map(Outcome::Replayed)
        .ok_or_else(|| {
            StoreError::Corrupt(format!(
                "{} record {} has no stored response",
                record.state.as_str(),
                record.key
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RecordKey, RecordState};
    use idemgate_common::{Fingerprint, IdempotencyKey, Scope};
    use std::time::Duration;

    fn record(state: RecordState, response: Option<ResponseSnapshot>) -> IdempotencyRecord {
        let key = RecordKey::new(
            Scope::resolve("alice", "POST", "/v1/reminders").unwrap(),
            IdempotencyKey::parse("k-1").unwrap(),
        );
        let mut rec =
            IdempotencyRecord::pending(&key, &Fingerprint::of_bytes(b""), 0, Duration::from_secs(1));
        rec.state = state;
        rec.response = response;
        rec
    }

    #[test]
    fn completed_replays_verbatim() {
        let snap = ResponseSnapshot::new(201, r#"{"id":"r-1"}"#).with_header("location", "/r-1");
        let outcome = replay(&record(RecordState::Completed, Some(snap.clone()))).unwrap();
        assert!(outcome.is_replay());
        assert_eq!(outcome.into_snapshot(), snap);
    }

    #[test]
    fn failed_replays_failure() {
        let snap = ResponseSnapshot::error(422, "invalid", "title required");
        let outcome = replay(&record(RecordState::Failed, Some(snap.clone()))).unwrap();
        assert_eq!(outcome, Outcome::Replayed(snap));
    }

    #[test]
    fn missing_response_is_corrupt() {
        let err = replay(&record(RecordState::Completed, None)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn pending_cannot_replay() {
        assert!(replay(&record(RecordState::Pending, None)).is_err());
    }
}
