mod error;
mod facade;
mod inflight;
mod replay;
mod request;
mod settings;
mod sweeper;

pub use error::CoordinatorError;
pub use facade::Coordinator;
pub use inflight::{InFlightRegistry, WaitOutcome};
pub use replay::{replay, Outcome};
pub use request::{IdempotentRequest, RequestParts};
pub use settings::CoordinatorSettings;
pub use sweeper::{ExpirySweeper, SweeperHandle};
