//! End-of-run summary
//!
//! Renders the snapshot for humans and persists it for tooling.

mod storage;
mod text;

pub use storage::{load, save, DEFAULT_RESULTS_FILE};
pub use text::{render_checks, render_summary, render_thresholds};
