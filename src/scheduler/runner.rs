//! Scenario runner
//!
//! Spawns one tokio task per virtual user and keeps the number of active
//! users of every scenario on its executor's target.

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::scenario::Scenario;
use super::ScheduleError;
use crate::harness::{CaseSelector, Catalog, Harness, VirtualUser};
use crate::metrics::MetricsSink;

/// How often ramping targets are re-evaluated
pub const CONTROLLER_TICK: Duration = Duration::from_millis(100);

/// Outcome of a completed run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub elapsed: Duration,
    /// Virtual users started per scenario, in scenario order
    pub vus_started: Vec<(String, usize)>,
    /// Virtual users that did not finish within their graceful stop
    pub aborted: usize,
}

/// A running virtual user task
struct VuHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl VuHandle {
    fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Keeps the active gauge balanced even when a task is aborted
struct ActiveGuard(Arc<MetricsSink>);

impl ActiveGuard {
    fn enter(sink: Arc<MetricsSink>) -> Self {
        sink.vu_started();
        Self(sink)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.vu_stopped();
    }
}

/// Drives scenarios against a shared harness
pub struct Runner {
    harness: Arc<Harness>,
    catalog: Catalog,
    seed: Option<u64>,
    tick: Duration,
}

impl Runner {
    pub fn new(harness: Arc<Harness>, catalog: Catalog) -> Self {
        Self {
            harness,
            catalog,
            seed: None,
            tick: CONTROLLER_TICK,
        }
    }

    /// Make case selection reproducible
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Set controller tick
    #[cfg(test)]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run every scenario concurrently until all have stopped
    pub async fn run(&self, scenarios: &[Scenario]) -> Result<RunReport, ScheduleError> {
        if scenarios.is_empty() {
            return Err(ScheduleError::NoScenarios);
        }
        for scenario in scenarios {
            scenario.validate()?;
        }

        info!(
            "Starting {} scenario(s) against {}",
            scenarios.len(),
            self.harness.invoker.host()
        );
        let start = Instant::now();

        let tasks = scenarios.iter().enumerate().map(|(index, scenario)| {
            let ctx = ScenarioContext {
                index,
                scenario: scenario.clone(),
                harness: self.harness.clone(),
                catalog: self.catalog.clone(),
                seed: self.seed,
                tick: self.tick,
            };
            tokio::spawn(ctx.run())
        });

        let mut report = RunReport {
            elapsed: Duration::ZERO,
            vus_started: Vec::with_capacity(scenarios.len()),
            aborted: 0,
        };
        for (scenario, outcome) in scenarios.iter().zip(join_all(tasks).await) {
            match outcome {
                Ok(outcome) => {
                    report.vus_started.push((scenario.name.clone(), outcome.started));
                    report.aborted += outcome.aborted;
                }
                Err(e) => {
                    warn!("Scenario '{}' task failed: {}", scenario.name, e);
                    report.vus_started.push((scenario.name.clone(), 0));
                }
            }
        }
        report.elapsed = start.elapsed();

        info!(
            "All scenarios finished in {:.1}s ({} requests)",
            report.elapsed.as_secs_f64(),
            self.harness.sink.request_count()
        );
        Ok(report)
    }
}

struct ScenarioOutcome {
    started: usize,
    aborted: usize,
}

struct ScenarioContext {
    index: usize,
    scenario: Scenario,
    harness: Arc<Harness>,
    catalog: Catalog,
    seed: Option<u64>,
    tick: Duration,
}

impl ScenarioContext {
    async fn run(self) -> ScenarioOutcome {
        if !self.scenario.start_time.is_zero() {
            sleep(self.scenario.start_time).await;
        }
        info!("Scenario {} started", self.scenario);

        let executor = &self.scenario.executor;
        let total = executor.total_duration();
        let start = Instant::now();

        let mut active: Vec<VuHandle> = Vec::new();
        let mut stopping: Vec<VuHandle> = Vec::new();
        let mut started = 0;

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }

            let target = executor.target_at(elapsed) as usize;
            while active.len() < target {
                active.push(self.spawn_vu(started));
                started += 1;
            }
            while active.len() > target {
                if let Some(vu) = active.pop() {
                    vu.request_stop();
                    stopping.push(vu);
                }
            }
        }

        for vu in active.drain(..) {
            vu.request_stop();
            stopping.push(vu);
        }
        let aborted = graceful_stop(stopping, self.scenario.graceful_stop).await;
        if aborted > 0 {
            warn!(
                "Scenario '{}': aborted {} virtual user(s) after graceful stop",
                self.scenario.name, aborted
            );
        }

        info!(
            "Scenario '{}' finished: {} virtual user(s) started",
            self.scenario.name, started
        );
        ScenarioOutcome { started, aborted }
    }

    fn spawn_vu(&self, vu_index: usize) -> VuHandle {
        let selector = CaseSelector::for_vu(self.catalog.clone(), self.seed, self.index, vu_index);
        let mut vu = VirtualUser::new(vu_index, selector, self.harness.clone());
        let stop = Arc::new(AtomicBool::new(false));

        let flag = stop.clone();
        let sink = self.harness.sink.clone();
        let scenario = self.scenario.name.clone();
        let handle = tokio::spawn(async move {
            let _active = ActiveGuard::enter(sink);
            debug!("Scenario '{}': VU {} started", scenario, vu.id());
            while !flag.load(Ordering::SeqCst) {
                vu.run_iteration().await;
            }
            debug!("Scenario '{}': VU {} stopped", scenario, vu.id());
        });

        VuHandle { stop, handle }
    }
}

/// Wait for stopping users, aborting whatever is left after `grace`
///
/// Returns the number of aborted tasks.
async fn graceful_stop(vus: Vec<VuHandle>, grace: Duration) -> usize {
    let aborts: Vec<AbortHandle> = vus.iter().map(|vu| vu.handle.abort_handle()).collect();
    let handles = vus.into_iter().map(|vu| vu.handle);

    if timeout(grace, join_all(handles)).await.is_ok() {
        return 0;
    }

    let mut aborted = 0;
    for abort in aborts {
        if !abort.is_finished() {
            abort.abort();
            aborted += 1;
        }
    }
    aborted
}
