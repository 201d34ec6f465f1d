mod fingerprint_store;
mod memory;
pub mod migrator;
mod postgres;
mod record;
mod resource_record;
mod resource_store;

pub use fingerprint_store::{BeginOutcome, BeginRequest, FingerprintStore, StoreError, Transition};
pub use memory::MemoryFingerprintStore;
pub use postgres::PgFingerprintStore;
pub use record::{IdempotencyRecord, RecordKey, RecordState, ResponseSnapshot};
pub use resource_record::{Note, Owned, Reminder};
pub use resource_store::ResourceStore;
