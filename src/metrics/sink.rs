//! Concurrent metrics sink
//!
//! Shared by every virtual user. Counters are atomics; duration samples
//! sit behind a mutex that is held only for a push or a copy.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::snapshot::{
    check_metric_name, Metric, MetricKind, MetricsSnapshot, RunState, CHECKS, HTTP_REQS,
    HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS, ITERATION_DURATION, VUS_MAX,
};
use super::threshold::percentile_key;
use super::trend::{percentile, TrendStats};
use crate::models::IterationRecord;

/// Pass/fail counters for one named check
struct CheckCounter {
    name: &'static str,
    passes: AtomicU64,
    fails: AtomicU64,
}

/// Thread-safe accumulator for every metric stream of a run
pub struct MetricsSink {
    http_reqs: AtomicU64,
    http_req_failed: AtomicU64,
    iterations: AtomicU64,
    http_durations: Mutex<Vec<f64>>,
    iteration_durations: Mutex<Vec<f64>>,
    checks: Vec<CheckCounter>,
    active_vus: AtomicU64,
    vus_max: AtomicU64,
    extra_percentiles: Vec<f64>,
}

impl MetricsSink {
    /// Create a sink that tracks the given checks
    pub fn new(check_names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            http_reqs: AtomicU64::new(0),
            http_req_failed: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            http_durations: Mutex::new(Vec::new()),
            iteration_durations: Mutex::new(Vec::new()),
            checks: check_names
                .into_iter()
                .map(|name| CheckCounter {
                    name,
                    passes: AtomicU64::new(0),
                    fails: AtomicU64::new(0),
                })
                .collect(),
            active_vus: AtomicU64::new(0),
            vus_max: AtomicU64::new(0),
            extra_percentiles: Vec::new(),
        }
    }

    /// Also report these percentiles on trend streams
    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.extra_percentiles = percentiles;
        self
    }

    /// Record one completed iteration
    pub fn record(&self, record: &IterationRecord) {
        self.http_reqs.fetch_add(1, Ordering::Relaxed);
        if record.response.is_failed_request() {
            self.http_req_failed.fetch_add(1, Ordering::Relaxed);
        }
        push(&self.http_durations, record.response.duration_ms);

        for result in &record.checks {
            match self.checks.iter().find(|c| c.name == result.name) {
                Some(counter) if result.passed => {
                    counter.passes.fetch_add(1, Ordering::Relaxed);
                }
                Some(counter) => {
                    counter.fails.fetch_add(1, Ordering::Relaxed);
                }
                None => debug!("Ignoring untracked check '{}'", result.name),
            }
        }

        push(&self.iteration_durations, record.duration_ms);
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// A virtual user became active
    pub fn vu_started(&self) {
        let active = self.active_vus.fetch_add(1, Ordering::SeqCst) + 1;
        self.vus_max.fetch_max(active, Ordering::SeqCst);
    }

    /// A virtual user stopped
    pub fn vu_stopped(&self) {
        // Saturate rather than wrap on unbalanced calls
        let _ = self
            .active_vus
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    #[cfg(test)]
    pub fn active_vus(&self) -> u64 {
        self.active_vus.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.http_reqs.load(Ordering::Relaxed)
    }

    /// Snapshot with rates over a nominal one-second run
    #[cfg(test)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_over(Duration::from_secs(1))
    }

    /// Snapshot with rates computed over `elapsed`
    pub fn snapshot_over(&self, elapsed: Duration) -> MetricsSnapshot {
        let elapsed_secs = elapsed.as_secs_f64();
        let mut metrics = BTreeMap::new();

        let reqs = self.http_reqs.load(Ordering::Relaxed);
        let failed = self.http_req_failed.load(Ordering::Relaxed);
        metrics.insert(HTTP_REQS.to_string(), Metric::counter(reqs, elapsed_secs));
        metrics.insert(
            HTTP_REQ_FAILED.to_string(),
            Metric::rate(failed, reqs.saturating_sub(failed)),
        );
        metrics.insert(
            HTTP_REQ_DURATION.to_string(),
            self.trend_metric(copy(&self.http_durations)),
        );

        let iterations = self.iterations.load(Ordering::Relaxed);
        metrics.insert(
            ITERATIONS.to_string(),
            Metric::counter(iterations, elapsed_secs),
        );
        metrics.insert(
            ITERATION_DURATION.to_string(),
            self.trend_metric(copy(&self.iteration_durations)),
        );

        let (mut all_passes, mut all_fails) = (0, 0);
        for counter in &self.checks {
            let passes = counter.passes.load(Ordering::Relaxed);
            let fails = counter.fails.load(Ordering::Relaxed);
            all_passes += passes;
            all_fails += fails;
            metrics.insert(check_metric_name(counter.name), Metric::rate(passes, fails));
        }
        metrics.insert(CHECKS.to_string(), Metric::rate(all_passes, all_fails));

        let vus_max = self.vus_max.load(Ordering::SeqCst) as f64;
        metrics.insert(VUS_MAX.to_string(), Metric::gauge(vus_max, 0.0, vus_max));

        MetricsSnapshot {
            timestamp: Utc::now(),
            state: RunState {
                test_run_duration_ms: elapsed_secs * 1000.0,
            },
            metrics,
        }
    }

    fn trend_metric(&self, mut samples: Vec<f64>) -> Metric {
        samples.sort_by(|a, b| a.total_cmp(b));
        let mut values = TrendStats::from_samples(&samples).values();
        for p in &self.extra_percentiles {
            values.push((percentile_key(*p), percentile(&samples, *p)));
        }
        Metric::new(MetricKind::Trend, values)
    }
}

fn push(samples: &Mutex<Vec<f64>>, value: f64) {
    samples
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(value);
}

fn copy(samples: &Mutex<Vec<f64>>) -> Vec<f64> {
    samples
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
