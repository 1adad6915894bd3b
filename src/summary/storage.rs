//! Results artifact
//!
//! The full snapshot as pretty-printed JSON.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::metrics::MetricsSnapshot;

/// Default artifact name
pub const DEFAULT_RESULTS_FILE: &str = "performance-results.json";

/// Write the snapshot, creating parent directories as needed
pub fn save(path: &Path, snapshot: &MetricsSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create results file {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot).context("Failed to write results")?;

    info!("Saved results to {}", path.display());
    Ok(())
}

/// Read a snapshot written by [`save`]
pub fn load(path: &Path) -> Result<MetricsSnapshot> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open results file {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).context("Failed to parse results")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::checks::check_names;
    use crate::metrics::{threshold, MetricsSink, HTTP_REQ_DURATION};
    use crate::models::{CheckResult, IterationRecord, Response};
    use chrono::Utc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn recorded_snapshot() -> MetricsSnapshot {
        let sink = MetricsSink::new(check_names());
        for i in 0..20 {
            let response = Response::new(200, "{}", 10.0 + i as f64);
            sink.record(&IterationRecord {
                case_index: 0,
                case_name: "Test 1".to_string(),
                duration_ms: response.duration_ms,
                response,
                checks: check_names().map(|n| CheckResult::new(n, true)).collect(),
                timestamp: Utc::now(),
            });
        }
        let mut snap = sink.snapshot_over(Duration::from_secs(2));
        let thresholds = threshold::parse_all(&threshold::default_thresholds()).unwrap();
        threshold::apply(&mut snap, &thresholds);
        snap
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_RESULTS_FILE);
        let snap = recorded_snapshot();

        save(&path, &snap).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.total_requests(), 20);
        assert_eq!(
            loaded.value(HTTP_REQ_DURATION, "p(95)"),
            snap.value(HTTP_REQ_DURATION, "p(95)")
        );
        assert!(loaded.metrics[HTTP_REQ_DURATION].thresholds["p(95)<500"].ok);
    }

    #[test]
    fn test_artifact_uses_k6_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        save(&path, &recorded_snapshot()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["metrics"]["http_reqs"]["type"], "counter");
        assert_eq!(raw["metrics"]["http_reqs"]["values"]["count"], 20.0);
        assert!(raw["metrics"]["http_req_duration"]["values"]["p(95)"].is_number());
        assert!(raw["state"]["testRunDurationMs"].is_number());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open results file"));
    }
}
