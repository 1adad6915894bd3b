//! Load scheduling
//!
//! Scenarios describe how many virtual users run over time; the runner
//! turns them into tokio tasks driving the harness.

mod runner;
pub mod scenario;

use thiserror::Error;

pub use runner::Runner;
pub use scenario::{parse_duration, predefined, Scenario};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid duration '{0}' (expected e.g. 30s, 1m30s, 500ms)")]
    InvalidDuration(String),

    #[error("Unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("Scenario '{name}' is invalid: {reason}")]
    InvalidScenario { name: String, reason: String },

    #[error("No scenarios to run")]
    NoScenarios,
}
