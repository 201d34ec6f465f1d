pub mod canonicalize;
pub mod fingerprint;
pub mod key;
pub mod retry;
pub mod scope;
pub mod time;
pub mod token;

pub use fingerprint::Fingerprint;
pub use key::{IdempotencyKey, KeyError, IDEMPOTENCY_KEY_HEADER, REPLAY_HEADER};
pub use scope::{Scope, ScopeError};
