//! Price query test cases
//!
//! A test case pairs one price query with the price the API is expected
//! to return for it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format used for `applicationDate` in query strings
pub const APPLICATION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Query parameters sent to the price endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuery {
    /// Local date-time the price must be applicable at
    pub application_date: NaiveDateTime,
    /// Product identifier
    pub product_id: i64,
    /// Brand identifier
    pub brand_id: i32,
}

impl PriceQuery {
    pub fn new(application_date: NaiveDateTime, product_id: i64, brand_id: i32) -> Self {
        Self {
            application_date,
            product_id,
            brand_id,
        }
    }

    /// `applicationDate` rendered the way the API expects it
    pub fn application_date_param(&self) -> String {
        self.application_date
            .format(APPLICATION_DATE_FORMAT)
            .to_string()
    }
}

/// A named request / expected-price pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub params: PriceQuery,
    pub expected_price: f64,
}

impl TestCase {
    pub fn new(name: impl Into<String>, params: PriceQuery, expected_price: f64) -> Self {
        Self {
            name: name.into(),
            params,
            expected_price,
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (date={}, product={}, brand={}, expected={:.2})",
            self.name,
            self.params.application_date_param(),
            self.params.product_id,
            self.params.brand_id,
            self.expected_price
        )
    }
}
