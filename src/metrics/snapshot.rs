//! Metrics snapshot
//!
//! Point-in-time view of every named metric stream. This is the document
//! written to the results artifact and read back by `summary`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const CHECKS: &str = "checks";
pub const VUS_MAX: &str = "vus_max";

/// Name of the rate stream for one check
pub fn check_metric_name(check: &str) -> String {
    format!("check{{{check}}}")
}

/// Kind of a metric stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
    Gauge,
}

/// Outcome of one threshold expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub ok: bool,
    /// Observed value, absent when the metric had no observations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<f64>,
}

/// One named metric stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub values: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, ThresholdOutcome>,
}

impl Metric {
    pub fn new(kind: MetricKind, values: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            kind,
            values: values.into_iter().collect(),
            thresholds: BTreeMap::new(),
        }
    }

    pub fn counter(count: u64, elapsed_secs: f64) -> Self {
        Self::new(
            MetricKind::Counter,
            [
                ("count".to_string(), count as f64),
                ("rate".to_string(), per_second(count, elapsed_secs)),
            ],
        )
    }

    /// Rate stream where `passes` counts true observations
    pub fn rate(passes: u64, fails: u64) -> Self {
        let total = passes + fails;
        let rate = if total > 0 {
            passes as f64 / total as f64
        } else {
            0.0
        };
        Self::new(
            MetricKind::Rate,
            [
                ("rate".to_string(), rate),
                ("passes".to_string(), passes as f64),
                ("fails".to_string(), fails as f64),
            ],
        )
    }

    pub fn gauge(value: f64, min: f64, max: f64) -> Self {
        Self::new(
            MetricKind::Gauge,
            [
                ("value".to_string(), value),
                ("min".to_string(), min),
                ("max".to_string(), max),
            ],
        )
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Whether any threshold on this metric failed
    pub fn thresholds_failed(&self) -> bool {
        self.thresholds.values().any(|t| !t.ok)
    }
}

fn per_second(count: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        count as f64 / elapsed_secs
    } else {
        0.0
    }
}

/// Run-level state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub test_run_duration_ms: f64,
}

/// Every metric stream at one point in time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub state: RunState,
    pub metrics: BTreeMap<String, Metric>,
}

impl MetricsSnapshot {
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn value(&self, metric: &str, key: &str) -> Option<f64> {
        self.metric(metric).and_then(|m| m.value(key))
    }

    /// Total HTTP requests issued
    pub fn total_requests(&self) -> u64 {
        self.value(HTTP_REQS, "count").unwrap_or(0.0) as u64
    }

    /// Requests counted as failed
    pub fn failed_requests(&self) -> u64 {
        self.value(HTTP_REQ_FAILED, "passes").unwrap_or(0.0) as u64
    }

    /// Whether every evaluated threshold held
    pub fn thresholds_ok(&self) -> bool {
        !self.metrics.values().any(Metric::thresholds_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_rate() {
        let metric = Metric::counter(1000, 10.0);
        assert_eq!(metric.value("count"), Some(1000.0));
        assert_eq!(metric.value("rate"), Some(100.0));
        assert_eq!(Metric::counter(5, 0.0).value("rate"), Some(0.0));
    }

    #[test]
    fn test_rate_metric() {
        let metric = Metric::rate(50, 950);
        assert_eq!(metric.value("rate"), Some(0.05));
        assert_eq!(metric.value("passes"), Some(50.0));
        assert_eq!(metric.value("fails"), Some(950.0));
        assert_eq!(Metric::rate(0, 0).value("rate"), Some(0.0));
    }

    #[test]
    fn test_metric_serializes_with_type_tag() {
        let json = serde_json::to_value(Metric::rate(1, 3)).unwrap();
        assert_eq!(json["type"], "rate");
        assert_eq!(json["values"]["rate"], 0.25);
        assert!(json.get("thresholds").is_none());
    }

    #[test]
    fn test_check_metric_name() {
        assert_eq!(check_metric_name("status is 200"), "check{status is 200}");
    }
}
