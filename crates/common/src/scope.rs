use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("caller identity is empty")]
    EmptyCaller,
    #[error("operation route is empty")]
    EmptyRoute,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn resolve(caller: &str, method: &str, route: &str) -> Result<Self, ScopeError> {
        if caller.is_empty() {
            return Err(ScopeError::EmptyCaller);
        }
        if route.is_empty() {
            return Err(ScopeError::EmptyRoute);
        }
        Ok(Self(format!(
            "{caller}|{} {route}",
            method.to_ascii_uppercase()
        )))
    }

    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
