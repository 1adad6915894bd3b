//! One virtual user's iteration loop
//!
//! select → invoke → check → record → pace. Everything except the
//! metrics sink is private to the virtual user.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::catalog::CaseSelector;
use super::checks::{self, CheckSettings};
use super::invoker::RequestInvoker;
use super::pacer::Pacer;
use crate::metrics::MetricsSink;
use crate::models::IterationRecord;

/// Parts of the harness shared by every virtual user
pub struct Harness {
    pub invoker: RequestInvoker,
    pub settings: CheckSettings,
    pub pacer: Pacer,
    pub sink: Arc<MetricsSink>,
}

impl Harness {
    pub fn new(
        invoker: RequestInvoker,
        settings: CheckSettings,
        pacer: Pacer,
        sink: Arc<MetricsSink>,
    ) -> Self {
        Self {
            invoker,
            settings,
            pacer,
            sink,
        }
    }
}

/// A logical user repeatedly running iterations
pub struct VirtualUser {
    id: usize,
    selector: CaseSelector,
    harness: Arc<Harness>,
}

impl VirtualUser {
    pub fn new(id: usize, selector: CaseSelector, harness: Arc<Harness>) -> Self {
        Self {
            id,
            selector,
            harness,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run exactly one iteration
    ///
    /// Never fails: transport and check errors end up as failed checks.
    pub async fn run_iteration(&mut self) -> IterationRecord {
        let start = Instant::now();
        let (case_index, case) = self.selector.select();

        let response = self.harness.invoker.invoke(case).await;
        let checks = checks::evaluate(&response, case, &self.harness.settings);

        let record = IterationRecord {
            case_index,
            case_name: case.name.clone(),
            response,
            checks,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
        };
        debug!(
            "VU {} case #{} {} at {}: status={} {:.2}ms all_passed={}",
            self.id,
            record.case_index,
            record.case_name,
            record.timestamp.format("%H:%M:%S%.3f"),
            record.response.status_code,
            record.response.duration_ms,
            record.all_passed()
        );

        self.harness.sink.record(&record);
        self.harness.pacer.pace().await;

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::catalog::Catalog;
    use crate::harness::checks::{check_names, PRICE_CHECK, STATUS_CHECK};
    use crate::harness::stub::StubPriceService;
    use crate::http::HttpClient;
    use crate::metrics::HTTP_REQS;
    use std::time::Duration;

    fn harness(host: String, sink: Arc<MetricsSink>) -> Arc<Harness> {
        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        Arc::new(Harness::new(
            RequestInvoker::new(client, host),
            CheckSettings::default(),
            Pacer::new(Duration::ZERO),
            sink,
        ))
    }

    #[tokio::test]
    async fn test_exact_prices_pass_every_reference_case() {
        let stub = StubPriceService::start(0.0).await;
        let sink = Arc::new(MetricsSink::new(check_names()));
        let harness = harness(stub.host(), sink.clone());
        let catalog = Catalog::reference();

        let mut vu = VirtualUser::new(0, CaseSelector::seeded(catalog, 11), harness);
        let mut seen = [false; 5];
        for _ in 0..60 {
            let record = vu.run_iteration().await;
            assert_eq!(record.checks.len(), 4);
            assert!(record.check(PRICE_CHECK).unwrap().passed, "{}", record.case_name);
            assert!(record.check(STATUS_CHECK).unwrap().passed);
            seen[record.case_index] = true;
        }

        assert!(seen.iter().all(|s| *s));
        assert_eq!(sink.snapshot().value(HTTP_REQS, "count"), Some(60.0));
    }

    #[tokio::test]
    async fn test_off_by_two_cents_fails_every_reference_case() {
        let stub = StubPriceService::start(0.02).await;
        let sink = Arc::new(MetricsSink::new(check_names()));
        let harness = harness(stub.host(), sink);
        let catalog = Catalog::reference();

        let mut vu = VirtualUser::new(0, CaseSelector::seeded(catalog, 3), harness);
        let mut seen = [false; 5];
        for _ in 0..60 {
            let record = vu.run_iteration().await;
            assert!(!record.check(PRICE_CHECK).unwrap().passed, "{}", record.case_name);
            assert!(record.check(STATUS_CHECK).unwrap().passed);
            seen[record.case_index] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[tokio::test]
    async fn test_unreachable_host_still_produces_four_checks() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        drop(listener);

        let sink = Arc::new(MetricsSink::new(check_names()));
        let mut vu = VirtualUser::new(
            0,
            CaseSelector::new(Catalog::reference()),
            harness(host, sink.clone()),
        );

        let record = vu.run_iteration().await;
        assert_eq!(record.checks.len(), 4);
        assert!(!record.check(STATUS_CHECK).unwrap().passed);
        assert!(record.check(PRICE_CHECK).unwrap().passed);
        assert_eq!(sink.snapshot().failed_requests(), 1);
    }
}
