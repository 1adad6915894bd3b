//! Trend statistics
//!
//! Percentiles and summary statistics over duration samples.

use serde::{Deserialize, Serialize};

/// Summary statistics for a trend stream (values in milliseconds)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    #[serde(rename = "p(90)")]
    pub p90: f64,
    #[serde(rename = "p(95)")]
    pub p95: f64,
    pub count: usize,
}

impl TrendStats {
    /// Calculate statistics from unsorted samples
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = sorted.iter().sum();

        Self {
            avg: sum / sorted.len() as f64,
            min: sorted[0],
            med: percentile(&sorted, 50.0),
            max: sorted[sorted.len() - 1],
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            count: sorted.len(),
        }
    }

    /// Values keyed the way thresholds and the snapshot name them
    pub fn values(&self) -> Vec<(String, f64)> {
        vec![
            ("avg".to_string(), self.avg),
            ("min".to_string(), self.min),
            ("med".to_string(), self.med),
            ("max".to_string(), self.max),
            ("p(90)".to_string(), self.p90),
            ("p(95)".to_string(), self.p95),
        ]
    }
}

/// Percentile over sorted samples, linear interpolation between ranks
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let fraction = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}
