pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod rest;
pub mod shutdown;
pub mod store;
