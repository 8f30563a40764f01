pub mod metrics;

pub use metrics::{PassOutcome, SyncMetrics, SyncMetricsSnapshot};
