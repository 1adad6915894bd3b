//! Per-iteration models
//!
//! Response, check outcome and iteration record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code recorded when the request never produced an HTTP response
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Why a request failed below the HTTP layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    Timeout,
    Connect,
    Body,
    Request,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Connect => write!(f, "connection error"),
            TransportFailure::Body => write!(f, "body read error"),
            TransportFailure::Request => write!(f, "request error"),
        }
    }
}

/// Response observed for one iteration
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub duration_ms: f64,
    pub failure: Option<TransportFailure>,
}

impl Response {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>, duration_ms: f64) -> Self {
        Self {
            status_code,
            body: body.into(),
            duration_ms,
            failure: None,
        }
    }

    /// Response-shaped transport failure
    pub fn transport_failure(failure: TransportFailure, duration_ms: f64) -> Self {
        Self {
            status_code: TRANSPORT_FAILURE_STATUS,
            body: Vec::new(),
            duration_ms,
            failure: Some(failure),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Whether the request counts as failed in `http_req_failed`
    pub fn is_failed_request(&self) -> bool {
        self.is_transport_failure() || !(200..400).contains(&self.status_code)
    }
}

/// Outcome of one named check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
}

impl CheckResult {
    pub fn new(name: &'static str, passed: bool) -> Self {
        Self { name, passed }
    }

    pub fn symbol(&self) -> &'static str {
        if self.passed {
            "✓"
        } else {
            "✗"
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol(), self.name)
    }
}

/// Everything one iteration hands to the metrics sink
#[derive(Clone, Debug)]
pub struct IterationRecord {
    pub case_index: usize,
    pub case_name: String,
    pub response: Response,
    pub checks: Vec<CheckResult>,
    /// Select-to-checks time; pacing is not included
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl IterationRecord {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    #[cfg(test)]
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_request_classification() {
        assert!(!Response::new(200, "{}", 1.0).is_failed_request());
        assert!(!Response::new(302, "", 1.0).is_failed_request());
        assert!(Response::new(404, "", 1.0).is_failed_request());
        assert!(Response::new(503, "", 1.0).is_failed_request());
        assert!(Response::transport_failure(TransportFailure::Timeout, 30.0).is_failed_request());
    }

    #[test]
    fn test_transport_failure_shape() {
        let resp = Response::transport_failure(TransportFailure::Connect, 2.5);
        assert_eq!(resp.status_code, TRANSPORT_FAILURE_STATUS);
        assert!(resp.body.is_empty());
        assert_eq!(resp.duration_ms, 2.5);
        assert!(resp.is_transport_failure());
    }

    #[test]
    fn test_check_result_display() {
        assert_eq!(CheckResult::new("status is 200", true).to_string(), "✓ status is 200");
        assert_eq!(CheckResult::new("status is 200", false).to_string(), "✗ status is 200");
    }
}
