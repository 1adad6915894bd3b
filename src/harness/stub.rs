//! Stub price service for tests
//!
//! Serves `/api/v1/prices/query` on a local port and answers with the
//! reference price for the requested date, optionally skewed.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::catalog::Catalog;
use super::invoker::PRICE_QUERY_PATH;

/// How the stub answers
#[derive(Clone, Debug)]
pub enum StubBehavior {
    /// Reference price plus an offset
    Price { offset: f64 },
    /// Fixed status with a fixed body
    Raw { status: u16, body: &'static str },
}

#[derive(Clone)]
struct StubState {
    behavior: StubBehavior,
    catalog: Catalog,
    hits: Arc<AtomicU64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceParams {
    application_date: String,
    product_id: i64,
    brand_id: i32,
}

pub struct StubPriceService {
    addr: SocketAddr,
    hits: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl StubPriceService {
    pub async fn start(offset: f64) -> Self {
        Self::start_with(StubBehavior::Price { offset }).await
    }

    pub async fn start_with(behavior: StubBehavior) -> Self {
        let hits = Arc::new(AtomicU64::new(0));
        let state = StubState {
            behavior,
            catalog: Catalog::reference(),
            hits: hits.clone(),
        };
        let app = Router::new()
            .route(PRICE_QUERY_PATH, get(query_price))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve stub");
        });

        Self { addr, hits, handle }
    }

    /// `host:port` as the invoker expects it
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Requests that reached the price route
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubPriceService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn query_price(
    State(state): State<StubState>,
    Query(params): Query<PriceParams>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let offset = match state.behavior {
        StubBehavior::Raw { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, body).into_response();
        }
        StubBehavior::Price { offset } => offset,
    };

    let price = state
        .catalog
        .iter()
        .find(|c| {
            c.params.application_date_param() == params.application_date
                && c.params.product_id == params.product_id
                && c.params.brand_id == params.brand_id
        })
        .map(|c| c.expected_price);

    match price {
        Some(price) => Json(serde_json::json!({
            "productId": params.product_id,
            "brandId": params.brand_id,
            "finalPrice": price + offset,
            "currency": "EUR"
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::build_url;
    use crate::http::HttpClient;
    use crate::models::PriceQuery;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serves_reference_prices_by_query() {
        let stub = StubPriceService::start(0.5).await;
        let client = HttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let case = Catalog::reference().iter().nth(1).cloned().unwrap();

        let resp = client
            .get(&build_url(&stub.host(), &case.params))
            .await
            .unwrap();
        assert_eq!(resp.status_code, 200);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["finalPrice"], case.expected_price + 0.5);
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn test_unknown_query_is_not_found() {
        let stub = StubPriceService::start(0.0).await;
        let client = HttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let case = Catalog::reference().iter().next().cloned().unwrap();
        let other_product = PriceQuery::new(case.params.application_date, 1, 1);

        let resp = client
            .get(&build_url(&stub.host(), &other_product))
            .await
            .unwrap();
        assert_eq!(resp.status_code, 404);

        let missing = format!("http://{}{}?productId=1", stub.host(), PRICE_QUERY_PATH);
        assert_eq!(client.get(&missing).await.unwrap().status_code, 400);
    }
}
