mod auth;
mod extract;
mod health;
mod metrics;
mod notes;
mod reminders;
mod response;
mod router;

pub use auth::Caller;
pub use extract::Idempotent;
pub use response::ApiError;
pub use router::{router, AppState};
