pub mod coordinator_metrics;
pub mod exposition;

pub use coordinator_metrics::CoordinatorMetrics;
pub use exposition::render_prometheus;
