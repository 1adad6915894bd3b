//! Response checks
//!
//! Four named predicates, evaluated unconditionally and in order. An
//! error inside one predicate only fails that predicate.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{CheckResult, Response, TestCase};

pub const STATUS_CHECK: &str = "status is 200";
pub const LATENCY_CHECK: &str = "response time < 500ms";
pub const JSON_CHECK: &str = "has valid JSON response";
pub const PRICE_CHECK: &str = "correct price returned";

/// Field the price API returns the applicable price in
pub const FINAL_PRICE_FIELD: &str = "finalPrice";

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Field '{0}' is missing")]
    MissingField(&'static str),

    #[error("Field '{0}' is not a number")]
    NotNumeric(&'static str),
}

/// Tunable bounds for the checks
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    /// Latency check passes strictly below this bound
    pub latency_bound_ms: f64,
    /// Price check passes when the difference is strictly below this
    pub price_tolerance: f64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            latency_bound_ms: 500.0,
            price_tolerance: 0.01,
        }
    }
}

type Predicate = fn(&Response, &TestCase, &CheckSettings) -> Result<bool, CheckError>;

/// One named predicate
#[derive(Clone, Copy)]
pub struct Check {
    pub name: &'static str,
    predicate: Predicate,
}

impl Check {
    /// Run the predicate; any error counts as a failure
    pub fn evaluate(
        &self,
        response: &Response,
        case: &TestCase,
        settings: &CheckSettings,
    ) -> CheckResult {
        let passed = match (self.predicate)(response, case, settings) {
            Ok(passed) => passed,
            Err(e) => {
                debug!("Check '{}' failed for {}: {}", self.name, case.name, e);
                false
            }
        };
        CheckResult::new(self.name, passed)
    }
}

/// The checks every iteration runs, in reporting order
pub static CHECKS: [Check; 4] = [
    Check {
        name: STATUS_CHECK,
        predicate: status_is_200,
    },
    Check {
        name: LATENCY_CHECK,
        predicate: latency_within_bound,
    },
    Check {
        name: JSON_CHECK,
        predicate: body_is_json,
    },
    Check {
        name: PRICE_CHECK,
        predicate: price_matches,
    },
];

/// Names of all checks, in order
pub fn check_names() -> impl Iterator<Item = &'static str> {
    CHECKS.iter().map(|c| c.name)
}

/// Evaluate every check against one response
pub fn evaluate(response: &Response, case: &TestCase, settings: &CheckSettings) -> Vec<CheckResult> {
    CHECKS
        .iter()
        .map(|check| check.evaluate(response, case, settings))
        .collect()
}

fn status_is_200(response: &Response, _: &TestCase, _: &CheckSettings) -> Result<bool, CheckError> {
    Ok(response.status_code == 200)
}

fn latency_within_bound(
    response: &Response,
    _: &TestCase,
    settings: &CheckSettings,
) -> Result<bool, CheckError> {
    Ok(response.duration_ms < settings.latency_bound_ms)
}

fn body_is_json(response: &Response, _: &TestCase, _: &CheckSettings) -> Result<bool, CheckError> {
    serde_json::from_slice::<serde_json::Value>(&response.body)?;
    Ok(true)
}

fn price_matches(
    response: &Response,
    case: &TestCase,
    settings: &CheckSettings,
) -> Result<bool, CheckError> {
    // Non-200 is already counted by the status check
    if response.status_code != 200 {
        return Ok(true);
    }

    let body: serde_json::Value = serde_json::from_slice(&response.body)?;
    let final_price = body
        .get(FINAL_PRICE_FIELD)
        .ok_or(CheckError::MissingField(FINAL_PRICE_FIELD))?
        .as_f64()
        .ok_or(CheckError::NotNumeric(FINAL_PRICE_FIELD))?;

    Ok((final_price - case.expected_price).abs() < settings.price_tolerance)
}
