use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REPLAY_HEADER: &str = "x-idempotency-replay";
pub const MAX_KEY_LEN: usize = 255;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("idempotency key is missing")]
    Missing,
    #[error("idempotency key exceeds {MAX_KEY_LEN} bytes")]
    TooLong,
    #[error("idempotency key has a non-printable or non-ASCII byte at offset {0}")]
    InvalidByte(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        if raw.is_empty() {
            return Err(KeyError::Missing);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong);
        }
        if let Some(pos) = raw.bytes().position(|b| !b.is_ascii_graphic()) {
            return Err(KeyError::InvalidByte(pos));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn from_header(value: Option<&str>) -> Result<Self, KeyError> {
        value.map_or(Err(KeyError::Missing), Self::parse)
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid() {
        let key = IdempotencyKey::parse("3f1c2a9e-8d6b-4c1e-9f7a-0b2d4e6f8a10").unwrap();
        assert_eq!(key.as_str(), "3f1c2a9e-8d6b-4c1e-9f7a-0b2d4e6f8a10");
    }

    #[test]
    fn empty_rejected() {
        assert_eq!(IdempotencyKey::parse(""), Err(KeyError::Missing));
        assert_eq!(IdempotencyKey::from_header(None), Err(KeyError::Missing));
    }

    #[test]
    fn too_long_rejected() {
        let raw = "k".repeat(MAX_KEY_LEN + 1);
        assert_eq!(IdempotencyKey::parse(&raw), Err(KeyError::TooLong));
        assert!(IdempotencyKey::parse(&"k".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[test]
    fn whitespace_and_unicode_rejected() {
        assert_eq!(IdempotencyKey::parse("ab cd"), Err(KeyError::InvalidByte(2)));
        assert_eq!(IdempotencyKey::parse(" abc"), Err(KeyError::InvalidByte(0)));
        assert!(matches!(
            IdempotencyKey::parse("clé"),
            Err(KeyError::InvalidByte(2))
        ));
    }

    #[test]
    fn generated_keys_are_distinct_and_valid() {
        let a = IdempotencyKey::generate();
        let b = IdempotencyKey::generate();
        assert_ne!(a, b);
        assert!(IdempotencyKey::parse(a.as_str()).is_ok());
    }

    #[test]
    fn serde_validates() {
        let key: IdempotencyKey = serde_json::from_str("\"abc-123\"").unwrap();
        assert_eq!(key.as_str(), "abc-123");
        assert!(serde_json::from_str::<IdempotencyKey>("\"\"").is_err());
    }
}
