//! Request invoker
//!
//! Turns a test case into a price query and always yields a Response,
//! even when the transport fails.

use tracing::debug;

use crate::http::HttpClient;
use crate::models::{PriceQuery, Response, TestCase};

/// Path of the price query endpoint
pub const PRICE_QUERY_PATH: &str = "/api/v1/prices/query";

/// Build the query URL for one case against `host` (`name[:port]`)
pub fn build_url(host: &str, query: &PriceQuery) -> String {
    format!(
        "http://{}{}?applicationDate={}&productId={}&brandId={}",
        host.trim_end_matches('/'),
        PRICE_QUERY_PATH,
        query.application_date_param(),
        query.product_id,
        query.brand_id
    )
}

/// Issues one GET per iteration
#[derive(Clone)]
pub struct RequestInvoker {
    client: HttpClient,
    host: String,
}

impl RequestInvoker {
    pub fn new(client: HttpClient, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn invoke(&self, case: &TestCase) -> Response {
        let url = build_url(&self.host, &case.params);

        match self.client.get(&url).await {
            Ok(resp) => Response::new(resp.status_code, resp.body, resp.duration_ms),
            Err((err, elapsed_ms)) => {
                debug!("{} failed: {}", case.name, err);
                Response::transport_failure(err.failure_kind(), elapsed_ms)
            }
        }
    }
}
