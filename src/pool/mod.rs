//! Fixed-width concurrent task executor with a sliding admission window.
//!
//! [`TaskPool`] runs an ordered sequence of deferred asynchronous tasks with
//! at most `width` in flight at once. Whenever any in-flight task settles,
//! the next not-yet-started task is admitted immediately, so the pool never
//! idles below `width` while work remains. Results are buffered at their
//! submission index and returned in submission order, independent of
//! completion order.
//!
//! The pool knows nothing about what the tasks do; the mirror orchestrator
//! binds it to per-item download tasks.
//!
//! # Concurrency Model
//!
//! Tasks are driven as interleaved futures on the calling task via
//! [`FuturesUnordered`] - cooperative concurrency on one logical thread,
//! not parallel execution. Nothing is spawned, so task futures need not be
//! `Send` and task outcomes cannot be lost to a panicked worker thread.
//!
//! # Cancellation
//!
//! [`StopHandle::stop`] is cooperative: tasks that have not started will
//! never start, tasks already in flight run to completion, and `run_all`
//! returns once the in-flight tail settles. Because admission is strictly
//! sequential, the settled results after a stop are always a prefix of the
//! submission order.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::debug;

/// Minimum allowed window width.
const MIN_WIDTH: usize = 1;

/// Maximum allowed window width.
const MAX_WIDTH: usize = 100;

/// Default window width if not specified.
pub const DEFAULT_WIDTH: usize = 10;

/// Error type for pool construction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Invalid window width provided.
    #[error("invalid width value {value}: must be between {MIN_WIDTH} and {MAX_WIDTH}")]
    InvalidWidth {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Cooperative stop signal for a [`TaskPool`].
///
/// Cloneable and shareable; flipping it prevents any not-yet-started task
/// from being admitted. It never interrupts a task already in flight.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// Creates a fresh, un-stopped handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that no further tasks be started.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Fixed-width sliding-window executor.
///
/// # Example
///
/// ```
/// use mirror_core::pool::TaskPool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = TaskPool::new(4)?;
/// let tasks: Vec<_> = (0..10).map(|n| move || async move { n * 2 }).collect();
/// let results = pool.run_all(tasks).await;
/// assert_eq!(results[3], 6);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaskPool {
    width: usize,
    stop: StopHandle,
}

/// Pairs a task's output with its submission index so settled results can
/// be slotted back into submission order. A shared helper (rather than two
/// inline `async` blocks) keeps the admission sites producing one future
/// type for the [`FuturesUnordered`] set.
async fn indexed<T, Fut>(index: usize, fut: Fut) -> (usize, T)
where
    Fut: Future<Output = T>,
{
    (index, fut.await)
}

impl TaskPool {
    /// Creates a pool with the given window width.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidWidth`] if the value is outside the
    /// valid range (1-100).
    pub fn new(width: usize) -> Result<Self, PoolError> {
        if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
            return Err(PoolError::InvalidWidth { value: width });
        }
        Ok(Self {
            width,
            stop: StopHandle::new(),
        })
    }

    /// Returns the configured window width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns a handle that can stop admission of further tasks.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs `tasks` with at most `width` in flight, returning settled
    /// results in submission order.
    ///
    /// Each task is a deferred unit of work: it is not invoked until the
    /// window admits it. Tasks report failure through their output value;
    /// a task whose output is an error still settles normally and never
    /// blocks admission of later tasks.
    ///
    /// After [`StopHandle::stop`], the returned vector holds the settled
    /// prefix only; unstarted tasks are simply absent.
    pub async fn run_all<T, F, Fut>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let total = tasks.len();
        let mut pending = tasks.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut slots: Vec<Option<T>> = Vec::with_capacity(total);

        // Eagerly admit the first `width` tasks.
        while in_flight.len() < self.width {
            if self.stop.is_stopped() {
                break;
            }
            let Some((index, task)) = pending.next() else {
                break;
            };
            slots.push(None);
            in_flight.push(indexed(index, task()));
        }

        debug!(total, width = self.width, "task pool started");

        // Sliding window: every settlement admits the next unstarted task.
        while let Some((index, value)) = in_flight.next().await {
            slots[index] = Some(value);
            if !self.stop.is_stopped() {
                if let Some((next_index, task)) = pending.next() {
                    slots.push(None);
                    in_flight.push(indexed(next_index, task()));
                }
            }
        }

        let settled = slots.len();
        debug!(settled, skipped = total - settled, "task pool drained");

        // Admission is sequential, so every slot that exists has settled.
        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_pool_new_valid_width() {
        assert_eq!(TaskPool::new(1).unwrap().width(), 1);
        assert_eq!(TaskPool::new(10).unwrap().width(), 10);
        assert_eq!(TaskPool::new(100).unwrap().width(), 100);
    }

    #[test]
    fn test_pool_new_invalid_width() {
        assert!(matches!(
            TaskPool::new(0),
            Err(PoolError::InvalidWidth { value: 0 })
        ));
        assert!(matches!(
            TaskPool::new(101),
            Err(PoolError::InvalidWidth { value: 101 })
        ));
    }

    #[test]
    fn test_pool_error_display() {
        let msg = PoolError::InvalidWidth { value: 0 }.to_string();
        assert!(msg.contains("invalid width"));
        assert!(msg.contains('0'));
    }

    #[tokio::test]
    async fn test_run_all_empty_task_list() {
        let pool = TaskPool::new(3).unwrap();
        let tasks: Vec<fn() -> std::future::Ready<u32>> = Vec::new();
        let results = pool.run_all(tasks).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_run_all_width_larger_than_task_count() {
        let pool = TaskPool::new(50).unwrap();
        let tasks: Vec<_> = (0..4u32).map(|n| move || async move { n }).collect();
        let results = pool.run_all(tasks).await;
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_submission_order_not_completion_order() {
        let pool = TaskPool::new(3).unwrap();

        // Task 0 is the slowest; later tasks complete first.
        let delays_ms = [50u64, 5, 1, 20, 2];
        let tasks: Vec<_> = delays_ms
            .iter()
            .enumerate()
            .map(|(i, &delay)| {
                move || async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    i
                }
            })
            .collect();

        let results = pool.run_all(tasks).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_width() {
        let width = 3;
        let pool = TaskPool::new(width).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                move || async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();

        pool.run_all(tasks).await;
        assert!(
            peak.load(Ordering::SeqCst) <= width,
            "peak concurrency {} exceeded width {width}",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_window_admits_on_each_completion() {
        // With width 2 and one task that never yields quickly, a batch
        // barrier would stall admission; a sliding window keeps going.
        let pool = TaskPool::new(2).unwrap();
        let started = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6u64)
            .map(|i| {
                let started = Arc::clone(&started);
                move || async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    // First task holds a window slot for the whole run.
                    let delay = if i == 0 { 1000 } else { 1 };
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            })
            .collect();

        let start = tokio::time::Instant::now();
        pool.run_all(tasks).await;
        // Five short tasks funnel through the free slot while the long one
        // occupies the other: well under two sequential long-task periods.
        assert!(start.elapsed() < Duration::from_millis(1100));
        assert_eq!(started.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_unstarted_tasks() {
        let pool = TaskPool::new(2).unwrap();
        let stop = pool.stop_handle();
        let started = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10u64)
            .map(|_| {
                let started = Arc::clone(&started);
                let stop = stop.clone();
                move || async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    // Each admitted task requests a stop; in-flight peers
                    // still finish.
                    stop.stop();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    true
                }
            })
            .collect();

        let results = pool.run_all(tasks).await;
        // The initial window (2 tasks) was admitted before any stop; no
        // further admission happened.
        assert_eq!(results.len(), 2);
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert!(results.iter().all(|&settled| settled));
    }

    #[tokio::test]
    async fn test_stop_before_run_starts_nothing() {
        let pool = TaskPool::new(4).unwrap();
        pool.stop_handle().stop();

        let tasks: Vec<_> = (0..5u32).map(|n| move || async move { n }).collect();
        let results = pool.run_all(tasks).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_failing_task_does_not_block_later_tasks() {
        let pool = TaskPool::new(2).unwrap();
        let tasks: Vec<_> = (0..6u32)
            .map(|n| {
                move || async move {
                    if n % 2 == 0 {
                        Err(format!("task {n} failed"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .collect();

        let results = pool.run_all(tasks).await;
        assert_eq!(results.len(), 6);
        assert_eq!(results[1], Ok(1));
        assert!(results[4].is_err());
    }
}
