//! Run metrics
//!
//! Concurrent metric accumulation, snapshots and threshold evaluation.

mod sink;
pub mod snapshot;
pub mod threshold;
mod trend;

pub use sink::MetricsSink;
pub use snapshot::{
    check_metric_name, MetricsSnapshot, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
};
pub use threshold::{Threshold, ThresholdSpec};
