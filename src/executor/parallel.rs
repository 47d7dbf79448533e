//! Parallel test execution
//!
//! A fixed pool of workers pulls units from one shared queue until it is
//! drained. Unit to worker assignment is dynamic: the first idle worker takes
//! the next queued unit, so slow files do not hold up a static partition.
//!
//! The queue, the aggregate counters and the fail-fast flag sit behind a
//! single mutex. Dequeueing checks the flag and recording a completion
//! updates the counters, notifies the progress sink and may set the flag,
//! each inside one critical section.

use futures::future::join_all;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::progress::ProgressSink;
use super::runner::UnitRunner;
use crate::error::Result;
use crate::models::{RunResult, Unit};
use crate::parser::PhpUnitParser;

/// Running totals observed by the progress sink
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
}

/// State shared by all workers of one dispatch
struct PoolState {
    queue: VecDeque<Unit>,
    progress: Progress,
    cancelled: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    fail_fast: bool,
    parser: PhpUnitParser,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next queued unit, or `None` once drained or cancelled
    fn next_unit(&self) -> Option<Unit> {
        let mut state = self.lock();
        if state.cancelled {
            return None;
        }
        state.queue.pop_front()
    }

    fn record(&self, result: &RunResult) {
        let (passed, failed) = self.parser.parse_case_counts(result);

        let mut state = self.lock();
        state.progress.completed += 1;
        state.progress.passed_cases += passed;
        state.progress.failed_cases += failed;

        if let Some(sink) = &self.sink {
            let progress = state.progress;
            let notified = catch_unwind(AssertUnwindSafe(|| {
                sink.update(
                    progress.completed,
                    progress.passed_cases,
                    progress.failed_cases,
                )
            }));
            if notified.is_err() {
                warn!("Progress sink panicked during update; continuing");
            }
        }

        if self.fail_fast && !result.success && !state.cancelled {
            state.cancelled = true;
            info!(
                "Fail-fast: {} failed, no further files will be started ({} left in queue)",
                result.unit,
                state.queue.len()
            );
        }
    }

    fn finish(&self) {
        if let Some(sink) = &self.sink {
            if catch_unwind(AssertUnwindSafe(|| sink.finish())).is_err() {
                warn!("Progress sink panicked during finish");
            }
        }
    }
}

/// Worker pool dispatching units to a runner
pub struct Dispatcher {
    workers: usize,
    runner: Arc<dyn UnitRunner>,
    parser: PhpUnitParser,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Dispatcher {
    /// Pool of `max(1, workers)` workers
    pub fn new(workers: usize, runner: Arc<dyn UnitRunner>) -> Self {
        Self {
            workers: workers.max(1),
            runner,
            parser: PhpUnitParser::new(),
            sink: None,
        }
    }

    /// Parser used to derive per-unit case counts
    pub fn with_parser(mut self, parser: PhpUnitParser) -> Self {
        self.parser = parser;
        self
    }

    /// Attach or detach the progress sink used by later dispatches
    pub fn set_progress(&mut self, sink: Option<Arc<dyn ProgressSink>>) {
        self.sink = sink;
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every unit; no early termination
    pub async fn execute(&self, units: Vec<Unit>) -> Result<(Vec<RunResult>, Duration)> {
        self.execute_with_options(units, false).await
    }

    /// Run units, optionally stopping new dispatch after the first failure.
    ///
    /// With `fail_fast`, units already in flight when the failure is
    /// recorded still complete and are returned; units never started are
    /// dropped silently. Results come back in completion order.
    pub async fn execute_with_options(
        &self,
        units: Vec<Unit>,
        fail_fast: bool,
    ) -> Result<(Vec<RunResult>, Duration)> {
        if units.is_empty() {
            return Ok((Vec::new(), Duration::ZERO));
        }

        info!(
            "Dispatching {} files across {} workers{}",
            units.len(),
            self.workers,
            if fail_fast { " (fail-fast)" } else { "" }
        );

        let start = Instant::now();
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: units.into(),
                progress: Progress::default(),
                cancelled: false,
            }),
            fail_fast,
            parser: self.parser.clone(),
            sink: self.sink.clone(),
        });

        let handles: Vec<_> = (1..=self.workers)
            .map(|worker_id| {
                let shared = shared.clone();
                let runner = self.runner.clone();
                tokio::spawn(async move { run_worker(worker_id, shared, runner).await })
            })
            .collect();

        let mut results = Vec::new();
        for joined in join_all(handles).await {
            results.extend(joined?);
        }

        shared.finish();

        let elapsed = start.elapsed();
        let progress = shared.lock().progress;
        info!(
            "Dispatch completed in {}ms - {} files, {} cases passed, {} cases failed",
            elapsed.as_millis(),
            progress.completed,
            progress.passed_cases,
            progress.failed_cases
        );

        Ok((results, elapsed))
    }
}

async fn run_worker(
    worker_id: usize,
    shared: Arc<Shared>,
    runner: Arc<dyn UnitRunner>,
) -> Vec<RunResult> {
    let mut results = Vec::new();

    while let Some(unit) = shared.next_unit() {
        let result = runner.run(&unit, worker_id).await;
        shared.record(&result);
        results.push(result);
    }

    debug!("Worker {} exiting after {} files", worker_id, results.len());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::Rng;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    /// Runner scripted per path: delay in ms and pass/fail
    #[derive(Default)]
    struct ScriptedRunner {
        delays: HashMap<String, u64>,
        failing: HashSet<String>,
        output: String,
        active_workers: Mutex<HashSet<usize>>,
        overlap: AtomicBool,
        started: AtomicUsize,
        max_worker_id: AtomicUsize,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self::default()
        }

        fn failing(mut self, path: &str) -> Self {
            self.failing.insert(path.to_string());
            self
        }

        fn delay(mut self, path: &str, ms: u64) -> Self {
            self.delays.insert(path.to_string(), ms);
            self
        }

        fn output(mut self, output: &str) -> Self {
            self.output = output.to_string();
            self
        }
    }

    #[async_trait]
    impl UnitRunner for ScriptedRunner {
        async fn run(&self, unit: &Unit, worker_id: usize) -> RunResult {
            let path = unit.display_path();
            self.started.fetch_add(1, Ordering::SeqCst);
            self.max_worker_id.fetch_max(worker_id, Ordering::SeqCst);
            if !self.active_workers.lock().unwrap().insert(worker_id) {
                self.overlap.store(true, Ordering::SeqCst);
            }

            let delay = self.delays.get(&path).copied().unwrap_or(0);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.active_workers.lock().unwrap().remove(&worker_id);
            let success = !self.failing.contains(&path);
            RunResult::completed(
                unit.clone(),
                success,
                self.output.clone(),
                Duration::from_millis(delay),
            )
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<(usize, usize, usize)>>,
        finished: AtomicUsize,
    }

    impl ProgressSink for RecordingSink {
        fn update(&self, completed: usize, passed: usize, failed: usize) {
            self.updates.lock().unwrap().push((completed, passed, failed));
        }

        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingSink;

    impl ProgressSink for PanickingSink {
        fn update(&self, _: usize, _: usize, _: usize) {
            panic!("sink is broken");
        }

        fn finish(&self) {
            panic!("sink is broken");
        }
    }

    fn units(n: usize) -> Vec<Unit> {
        (0..n)
            .map(|i| Unit::file(format!("tests/Unit{i}Test.php")))
            .collect()
    }

    #[test]
    fn test_dispatcher_clamps_workers() {
        let dispatcher = Dispatcher::new(0, Arc::new(ScriptedRunner::new()));
        assert_eq!(dispatcher.workers(), 1);

        let dispatcher = Dispatcher::new(8, Arc::new(ScriptedRunner::new()));
        assert_eq!(dispatcher.workers(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_execute_runs_every_unit_once() {
        let runner = Arc::new(ScriptedRunner::new().failing("tests/Unit3Test.php"));
        let dispatcher = Dispatcher::new(4, runner.clone());

        let input = units(25);
        let (results, _) = assert_ok!(dispatcher.execute(input.clone()).await);

        assert_eq!(results.len(), input.len());
        let seen: HashSet<_> = results.iter().map(|r| r.unit.clone()).collect();
        assert_eq!(seen, input.into_iter().collect::<HashSet<_>>());
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
        assert!(!runner.overlap.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = Dispatcher::new(4, Arc::new(ScriptedRunner::new()));
        dispatcher.set_progress(Some(sink.clone()));

        let (results, elapsed) = dispatcher.execute(Vec::new()).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(elapsed, Duration::ZERO);
        assert!(sink.updates.lock().unwrap().is_empty());
        assert_eq!(sink.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_still_drains_queue() {
        let runner = Arc::new(ScriptedRunner::new());
        let dispatcher = Dispatcher::new(0, runner.clone());

        let (results, _) = dispatcher.execute(units(5)).await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(runner.max_worker_id.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_single_worker_stops_after_failure() {
        let runner = Arc::new(ScriptedRunner::new().failing("tests/Unit2Test.php"));
        let dispatcher = Dispatcher::new(1, runner.clone());

        let (results, _) = dispatcher
            .execute_with_options(units(10), true)
            .await
            .unwrap();

        let paths: Vec<_> = results.iter().map(|r| r.unit.display_path()).collect();
        assert_eq!(
            paths,
            [
                "tests/Unit0Test.php",
                "tests/Unit1Test.php",
                "tests/Unit2Test.php"
            ]
        );
        assert_eq!(runner.started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fail_fast_keeps_in_flight_results() {
        let mut runner = ScriptedRunner::new().failing("tests/Unit0Test.php");
        for i in 1..40 {
            runner = runner.delay(&format!("tests/Unit{i}Test.php"), 20);
        }
        let runner = Arc::new(runner);
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = Dispatcher::new(4, runner.clone());
        dispatcher.set_progress(Some(sink.clone()));

        let (results, _) = dispatcher
            .execute_with_options(units(40), true)
            .await
            .unwrap();

        // Only units already running when the failure landed can follow it.
        assert!(!results.is_empty() && results.len() <= 4);
        assert!(results
            .iter()
            .any(|r| r.unit.display_path() == "tests/Unit0Test.php" && !r.success));
        assert_eq!(runner.started.load(Ordering::SeqCst), results.len());
        assert_eq!(sink.updates.lock().unwrap().len(), results.len());
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_normal_mode_ignores_failures() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .failing("tests/Unit0Test.php")
                .failing("tests/Unit1Test.php"),
        );
        let dispatcher = Dispatcher::new(3, runner);

        let (results, _) = dispatcher
            .execute_with_options(units(12), false)
            .await
            .unwrap();
        assert_eq!(results.len(), 12);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_case_counts_feed_progress() {
        let runner = Arc::new(ScriptedRunner::new().output("OK (3 tests, 7 assertions)"));
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = Dispatcher::new(2, runner);
        dispatcher.set_progress(Some(sink.clone()));

        dispatcher.execute(units(6)).await.unwrap();

        let updates = sink.updates.lock().unwrap();
        assert_eq!(updates.last(), Some(&(6, 18, 0)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_broken_sink_does_not_abort_run() {
        let mut dispatcher = Dispatcher::new(4, Arc::new(ScriptedRunner::new()));
        dispatcher.set_progress(Some(Arc::new(PanickingSink)));

        let (results, _) = dispatcher.execute(units(10)).await.unwrap();
        assert_eq!(results.len(), 10);
    }

    struct PanickingRunner;

    #[async_trait]
    impl UnitRunner for PanickingRunner {
        async fn run(&self, _unit: &Unit, _worker_id: usize) -> RunResult {
            panic!("runner blew up");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runner_panic_is_reported() {
        let dispatcher = Dispatcher::new(2, Arc::new(PanickingRunner));
        let err = assert_err!(dispatcher.execute(units(3)).await);
        assert!(matches!(err, crate::error::Error::WorkerPanicked(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_stress_500_units_8_workers() {
        let mut rng = rand::rng();
        let mut runner = ScriptedRunner::new();
        for i in 0..500 {
            let delay = rng.random_range(0..4);
            runner = runner.delay(&format!("tests/Unit{i}Test.php"), delay);
        }
        let runner = Arc::new(runner);
        let sink = Arc::new(RecordingSink::default());
        let mut dispatcher = Dispatcher::new(8, runner.clone());
        dispatcher.set_progress(Some(sink.clone()));

        let (results, _) = assert_ok!(dispatcher.execute(units(500)).await);

        assert_eq!(results.len(), 500);
        let distinct: HashSet<_> = results.iter().map(|r| r.unit.clone()).collect();
        assert_eq!(distinct.len(), 500);

        let updates = sink.updates.lock().unwrap();
        let completed: Vec<usize> = updates.iter().map(|u| u.0).collect();
        assert_eq!(completed, (1..=500).collect::<Vec<_>>());
        assert!(completed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
        assert!(!runner.overlap.load(Ordering::SeqCst));
        assert!(runner.max_worker_id.load(Ordering::SeqCst) <= 8);
    }
}
