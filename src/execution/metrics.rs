use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How a tab finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabResult {
    Tabular,
    Graphical,
    Failed,
}

/// Real-time metrics for an ingestion run.
///
/// The orchestrator updates these counters while tabs are processed; callers can snapshot them
/// at any time. Counters describe the latest run only: [`Self::begin_run`] resets them.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    started_at: Mutex<Option<Instant>>,
    elapsed_ns: AtomicU64,

    tabs_started: AtomicU64,
    tabs_finished: AtomicU64,
    tabs_tabular: AtomicU64,
    tabs_graphical: AtomicU64,
    tabs_failed: AtomicU64,

    active_tabs: AtomicUsize,
    max_active_tabs: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            started_at: Mutex::new(None),
            elapsed_ns: AtomicU64::new(0),
            tabs_started: AtomicU64::new(0),
            tabs_finished: AtomicU64::new(0),
            tabs_tabular: AtomicU64::new(0),
            tabs_graphical: AtomicU64::new(0),
            tabs_failed: AtomicU64::new(0),
            active_tabs: AtomicUsize::new(0),
            max_active_tabs: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut started) = self.started_at.lock() {
            *started = Some(Instant::now());
        }

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.tabs_started.store(0, Ordering::SeqCst);
        self.tabs_finished.store(0, Ordering::SeqCst);
        self.tabs_tabular.store(0, Ordering::SeqCst);
        self.tabs_graphical.store(0, Ordering::SeqCst);
        self.tabs_failed.store(0, Ordering::SeqCst);
        self.active_tabs.store(0, Ordering::SeqCst);
        self.max_active_tabs.store(0, Ordering::SeqCst);
    }

    /// Start a run that ends when the returned guard is dropped, on every exit path.
    pub fn start_run(&self) -> RunGuard<'_> {
        self.begin_run();
        RunGuard {
            metrics: self,
            started: Instant::now(),
        }
    }

    /// Record the run's duration. Tabs still marked active were abandoned and are cleared.
    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().clamp(1, u64::MAX as u128) as u64, Ordering::SeqCst);
        self.active_tabs.store(0, Ordering::SeqCst);
    }

    pub fn on_tab_start(&self) {
        let _ = self.tabs_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_tabs.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_tabs, now);
    }

    pub fn on_tab_end(&self, result: TabResult) {
        let _ = self.tabs_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_tabs.fetch_sub(1, Ordering::SeqCst);
        let counter = match result {
            TabResult::Tabular => &self.tabs_tabular,
            TabResult::Graphical => &self.tabs_graphical,
            TabResult::Failed => &self.tabs_failed,
        };
        let _ = counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            tabs_started: self.tabs_started.load(Ordering::SeqCst),
            tabs_finished: self.tabs_finished.load(Ordering::SeqCst),
            tabs_tabular: self.tabs_tabular.load(Ordering::SeqCst),
            tabs_graphical: self.tabs_graphical.load(Ordering::SeqCst),
            tabs_failed: self.tabs_failed.load(Ordering::SeqCst),
            active_tabs: self.active_tabs.load(Ordering::SeqCst),
            max_active_tabs: self.max_active_tabs.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionMetrics").field(&self.snapshot()).finish()
    }
}

/// Ends a run started by [`ExecutionMetrics::start_run`] when dropped.
#[must_use = "the run ends when the guard is dropped"]
pub struct RunGuard<'a> {
    metrics: &'a ExecutionMetrics,
    started: Instant,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.metrics.end_run(self.started.elapsed());
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    loop {
        let cur = dst.load(Ordering::SeqCst);
        if now <= cur {
            break;
        }
        if dst
            .compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub tabs_started: u64,
    pub tabs_finished: u64,
    pub tabs_tabular: u64,
    pub tabs_graphical: u64,
    pub tabs_failed: u64,
    pub active_tabs: usize,
    pub max_active_tabs: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, tabs={}/{}, tabular={}, graphical={}, failed={}, active_tabs={}, max_active_tabs={}, \
             elapsed={:?}",
            self.run_id,
            self.tabs_finished,
            self.tabs_started,
            self.tabs_tabular,
            self.tabs_graphical,
            self.tabs_failed,
            self.active_tabs,
            self.max_active_tabs,
            self.elapsed
        )
    }
}
