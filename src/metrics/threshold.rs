//! Threshold expressions
//!
//! Pass/fail rules over aggregated metrics, written the k6 way:
//! `p(95)<500`, `rate<0.1`, `count>=100`.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::snapshot::{MetricKind, MetricsSnapshot, ThresholdOutcome};

#[derive(Error, Debug, PartialEq)]
pub enum ThresholdError {
    #[error("Invalid threshold expression '{0}'")]
    Parse(String),

    #[error("Threshold on unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Aggregation '{aggregation}' is not available on {kind:?} metric '{metric}'")]
    UnsupportedAggregation {
        metric: String,
        aggregation: String,
        kind: MetricKind,
    },
}

/// Value of a metric a threshold looks at
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Med,
    Max,
    Percentile(f64),
    Rate,
    Count,
    Value,
}

impl Aggregation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "med" => Some(Self::Med),
            "max" => Some(Self::Max),
            "rate" => Some(Self::Rate),
            "count" => Some(Self::Count),
            "value" => Some(Self::Value),
            _ => {
                let inner = s.strip_prefix("p(")?.strip_suffix(')')?;
                let p: f64 = inner.trim().parse().ok()?;
                (0.0..=100.0).contains(&p).then_some(Self::Percentile(p))
            }
        }
    }

    /// Key of this aggregation in a metric's values
    pub fn key(&self) -> String {
        match self {
            Self::Avg => "avg".to_string(),
            Self::Min => "min".to_string(),
            Self::Med => "med".to_string(),
            Self::Max => "max".to_string(),
            Self::Percentile(p) => percentile_key(*p),
            Self::Rate => "rate".to_string(),
            Self::Count => "count".to_string(),
            Self::Value => "value".to_string(),
        }
    }

    fn supported_by(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Trend => matches!(
                self,
                Self::Avg | Self::Min | Self::Med | Self::Max | Self::Percentile(_)
            ),
            MetricKind::Rate => matches!(self, Self::Rate),
            MetricKind::Counter => matches!(self, Self::Count | Self::Rate),
            MetricKind::Gauge => matches!(self, Self::Value | Self::Min | Self::Max),
        }
    }
}

/// Snapshot key for a percentile, e.g. `p(95)` or `p(99.9)`
pub fn percentile_key(p: f64) -> String {
    format!("p({p})")
}

/// Comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Op {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Op::Lt => lhs < rhs,
            Op::Le => lhs <= rhs,
            Op::Gt => lhs > rhs,
            Op::Ge => lhs >= rhs,
            Op::Eq => lhs == rhs,
            Op::Ne => lhs != rhs,
        }
    }
}

/// A parsed threshold on one metric
#[derive(Clone, Debug, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub source: String,
    pub aggregation: Aggregation,
    pub op: Op,
    pub bound: f64,
}

impl Threshold {
    pub fn parse(metric: impl Into<String>, source: &str) -> Result<Self, ThresholdError> {
        let parse_err = || ThresholdError::Parse(source.to_string());
        let compact: String = source.chars().filter(|c| !c.is_whitespace()).collect();

        // Two-character operators first so `<=` is not read as `<`
        let (pos, op, width) = [
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("==", Op::Eq),
            ("!=", Op::Ne),
            ("<", Op::Lt),
            (">", Op::Gt),
        ]
        .iter()
        .find_map(|(token, op)| compact.find(token).map(|pos| (pos, *op, token.len())))
        .ok_or_else(parse_err)?;

        let aggregation = Aggregation::parse(&compact[..pos]).ok_or_else(parse_err)?;
        let bound: f64 = compact[pos + width..].parse().map_err(|_| parse_err())?;
        if !bound.is_finite() {
            return Err(parse_err());
        }

        Ok(Self {
            metric: metric.into(),
            source: source.to_string(),
            aggregation,
            op,
            bound,
        })
    }

    /// Check the metric exists and offers this aggregation
    pub fn validate(&self, snapshot: &MetricsSnapshot) -> Result<(), ThresholdError> {
        let metric = snapshot
            .metric(&self.metric)
            .ok_or_else(|| ThresholdError::UnknownMetric(self.metric.clone()))?;

        if !self.aggregation.supported_by(metric.kind) {
            return Err(ThresholdError::UnsupportedAggregation {
                metric: self.metric.clone(),
                aggregation: self.aggregation.key(),
                kind: metric.kind,
            });
        }
        Ok(())
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdOutcome {
        let observed = snapshot.value(&self.metric, &self.aggregation.key());
        ThresholdOutcome {
            ok: observed.is_some_and(|v| self.op.apply(v, self.bound)),
            observed,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.source)
    }
}

/// Threshold declarations keyed by metric, as written in config files
pub type ThresholdSpec = BTreeMap<String, Vec<String>>;

/// The thresholds the reference traffic mix gates on
pub fn default_thresholds() -> ThresholdSpec {
    let mut spec = ThresholdSpec::new();
    spec.insert("http_req_duration".to_string(), vec!["p(95)<500".to_string()]);
    spec.insert("http_req_failed".to_string(), vec!["rate<0.1".to_string()]);
    spec
}

/// Parse every configured expression
pub fn parse_all(spec: &ThresholdSpec) -> Result<Vec<Threshold>, ThresholdError> {
    spec.iter()
        .flat_map(|(metric, exprs)| exprs.iter().map(move |e| Threshold::parse(metric, e)))
        .collect()
}

/// Percentiles the thresholds need beyond the standard trend values
pub fn required_percentiles(thresholds: &[Threshold]) -> Vec<f64> {
    let mut percentiles: Vec<f64> = thresholds
        .iter()
        .filter_map(|t| match t.aggregation {
            Aggregation::Percentile(p) => Some(p),
            _ => None,
        })
        .collect();
    percentiles.sort_by(|a, b| a.total_cmp(b));
    percentiles.dedup();
    percentiles
}

/// Evaluate thresholds and attach outcomes to the snapshot
///
/// Returns the thresholds that failed.
pub fn apply(snapshot: &mut MetricsSnapshot, thresholds: &[Threshold]) -> Vec<Threshold> {
    let mut failed = Vec::new();

    for threshold in thresholds {
        let outcome = threshold.evaluate(snapshot);
        if !outcome.ok {
            failed.push(threshold.clone());
        }
        if let Some(metric) = snapshot.metrics.get_mut(&threshold.metric) {
            metric.thresholds.insert(threshold.source.clone(), outcome);
        }
    }

    failed
}
