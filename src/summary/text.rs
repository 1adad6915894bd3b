//! Text rendering of a run snapshot
//!
//! The summary block has a fixed layout that downstream tooling greps,
//! so its line labels never change.

use crate::metrics::{
    check_metric_name, MetricsSnapshot, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
};

/// Shown instead of a percentage when no request was made
pub const NO_REQUESTS: &str = "N/A (no requests)";

/// Fixed-point with two decimals, `0.00` for anything non-finite
fn fixed2(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.2}"),
        _ => "0.00".to_string(),
    }
}

/// Success rate as printed, e.g. `95.00%`
pub fn success_rate(snapshot: &MetricsSnapshot) -> String {
    if snapshot.total_requests() == 0 {
        return NO_REQUESTS.to_string();
    }
    let fail_rate = snapshot.value(HTTP_REQ_FAILED, "rate").unwrap_or(0.0);
    format!("{}%", fixed2(Some((1.0 - fail_rate) * 100.0)))
}

/// The end-of-run summary block
pub fn render_summary(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    output.push_str("\n=== PERFORMANCE TEST SUMMARY ===\n");
    output.push_str(&format!("Total Requests: {}\n", snapshot.total_requests()));
    output.push_str(&format!("Failed Requests: {}\n", snapshot.failed_requests()));
    output.push_str(&format!("Success Rate: {}\n", success_rate(snapshot)));
    output.push_str(&format!(
        "Average Response Time: {}ms\n",
        fixed2(snapshot.value(HTTP_REQ_DURATION, "avg"))
    ));
    output.push_str(&format!(
        "95th Percentile: {}ms\n",
        fixed2(snapshot.value(HTTP_REQ_DURATION, "p(95)"))
    ));
    output.push_str(&format!(
        "Requests per Second: {}\n",
        fixed2(snapshot.value(HTTP_REQS, "rate"))
    ));
    output.push_str("===============================\n");

    output
}

/// Pass/fail tally per check, in the given order
pub fn render_checks<'a>(
    snapshot: &MetricsSnapshot,
    names: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut output = String::new();

    for name in names {
        let metric = check_metric_name(name);
        let passes = snapshot.value(&metric, "passes").unwrap_or(0.0) as u64;
        let fails = snapshot.value(&metric, "fails").unwrap_or(0.0) as u64;
        let symbol = if fails == 0 { "✓" } else { "✗" };
        output.push_str(&format!(
            "  {symbol} {name:<28} {passes:>8} passed {fails:>8} failed\n"
        ));
    }

    output
}

/// Threshold outcomes, one line per expression
pub fn render_thresholds(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    for (name, metric) in &snapshot.metrics {
        for (source, outcome) in &metric.thresholds {
            let symbol = if outcome.ok { "✓" } else { "✗" };
            let observed = outcome
                .observed
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "n/a".to_string());
            output.push_str(&format!(
                "  {symbol} {name}: {source} (observed {observed})\n"
            ));
        }
    }

    output
}
