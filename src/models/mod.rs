//! Data models for price verification runs
//!
//! This module contains the data structures shared by the harness,
//! the metrics sink and the scheduler.

mod iteration;
mod test_case;

pub use iteration::{CheckResult, IterationRecord, Response, TransportFailure};
pub use test_case::{PriceQuery, TestCase};
