//! Execution of per-tab work with bounded concurrency.
//!
//! This module sits below [`crate::ingestion`] and provides:
//!
//! - [`run_ordered`]: runs one future per item, at most `limit` at a time, and returns the
//!   outputs in input order
//! - [`ExecutionMetrics`]: real-time counters for a run

mod metrics;

use std::future::Future;

use futures::stream::{self, StreamExt};

pub use metrics::{ExecutionMetrics, ExecutionMetricsSnapshot, RunGuard, TabResult};

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// Outputs keep the order of `items` regardless of completion order. A `limit` of `1` runs the
/// items strictly one after another; `0` is treated as `1`.
pub async fn run_ordered<I, F, Fut>(items: I, limit: usize, f: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    stream::iter(items).map(f).buffered(limit.max(1)).collect().await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::run_ordered;

    async fn tracked(
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        delay_ms: u64,
        value: usize,
    ) -> usize {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        active.fetch_sub(1, Ordering::SeqCst);
        value
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_input_order_under_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        // Later items finish first.
        let out = run_ordered(0..6usize, 3, |i| {
            tracked(Arc::clone(&active), Arc::clone(&max_active), 60 - 10 * i as u64, i)
        })
        .await;

        assert_eq!(out, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(max_active.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_one_is_sequential() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let out = run_ordered(vec![5usize, 6, 7], 1, |i| {
            tracked(Arc::clone(&active), Arc::clone(&max_active), 5, i)
        })
        .await;

        assert_eq!(out, vec![5, 6, 7]);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_limit_still_runs() {
        let out = run_ordered(vec!["a", "b"], 0, |s| async move { s.len() }).await;
        assert_eq!(out, vec![1, 1]);
    }
}
