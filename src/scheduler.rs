//! Bounded-concurrency fan-out with per-item failure capture.
//!
//! [`run_all`] starts `limit` lanes that share one cursor over the input. Each
//! lane claims the next unprocessed index, runs the worker, and records either
//! the value or the failure reason. A failing (or panicking) item never stops
//! its siblings; deciding whether the batch as a whole failed is left to the
//! caller.
//!
//! Lanes are polled on the caller's task rather than spawned, so workers may
//! borrow from the caller's stack.

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use futures_util::future::join_all;
use tracing::{debug, warn};

/// One item that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure<T> {
    /// Position of the item in the input.
    pub index: usize,
    /// The item itself.
    pub item: T,
    /// Worker error or panic message.
    pub reason: String,
}

/// Results of a batch run.
#[derive(Debug)]
pub struct BatchOutcome<T, R> {
    /// One slot per input item; `None` where the item failed.
    pub results: Vec<Option<R>>,
    /// Failed items in input order.
    pub failures: Vec<ItemFailure<T>>,
}

impl<T, R> BatchOutcome<T, R> {
    /// Number of items that produced a value.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|slot| slot.is_some()).count()
    }

    /// Consumes the outcome, returning successful values in input order and
    /// the failures.
    #[must_use]
    pub fn into_parts(self) -> (Vec<R>, Vec<ItemFailure<T>>) {
        (self.results.into_iter().flatten().collect(), self.failures)
    }
}

/// Clamps a requested lane count to `[1, min(limit, item_count)]`.
#[must_use]
pub fn clamp_concurrency(limit: usize, item_count: usize) -> usize {
    limit.min(item_count).max(1)
}

enum Slot<R> {
    Done(R),
    Failed(String),
}

/// Runs `worker` over every item with at most `limit` in flight.
pub async fn run_all<T, R, E, F, Fut>(items: Vec<T>, limit: usize, worker: F) -> BatchOutcome<T, R>
where
    T: Clone,
    E: Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let lanes = clamp_concurrency(limit, items.len());
    let cursor = AtomicUsize::new(0);
    debug!(items = items.len(), lanes, "starting batch");

    let lane = |lane_id: usize| {
        let items = &items;
        let cursor = &cursor;
        let worker = &worker;
        async move {
            let mut finished = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(item) = items.get(index) else {
                    break;
                };
                let outcome = AssertUnwindSafe(worker(item.clone())).catch_unwind().await;
                let slot = match outcome {
                    Ok(Ok(value)) => Slot::Done(value),
                    Ok(Err(error)) => Slot::Failed(error.to_string()),
                    Err(panic) => Slot::Failed(panic_message(panic.as_ref())),
                };
                if let Slot::Failed(reason) = &slot {
                    warn!(lane = lane_id, index, error = %reason, "item failed");
                }
                finished.push((index, slot));
            }
            finished
        }
    };

    let lane_results = join_all((0..lanes).map(lane)).await;

    let mut slots: Vec<Option<Slot<R>>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (index, slot) in lane_results.into_iter().flatten() {
        if let Some(target) = slots.get_mut(index) {
            *target = Some(slot);
        }
    }

    let mut results = Vec::with_capacity(items.len());
    let mut failures = Vec::new();
    for (index, (slot, item)) in slots.into_iter().zip(items).enumerate() {
        match slot {
            Some(Slot::Done(value)) => results.push(Some(value)),
            Some(Slot::Failed(reason)) => {
                results.push(None);
                failures.push(ItemFailure { index, item, reason });
            }
            None => {
                results.push(None);
                failures.push(ItemFailure {
                    index,
                    item,
                    reason: "item was never processed".to_string(),
                });
            }
        }
    }
    BatchOutcome { results, failures }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("worker panicked: {detail}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clamp_concurrency() {
        assert_eq!(clamp_concurrency(3, 10), 3);
        assert_eq!(clamp_concurrency(12, 4), 4);
        assert_eq!(clamp_concurrency(0, 10), 1);
        assert_eq!(clamp_concurrency(6, 0), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_siblings() {
        let items: Vec<u32> = (0..10).collect();
        let outcome = run_all(items, 3, |n| async move {
            tokio::time::sleep(Duration::from_millis(u64::from(n % 3))).await;
            if n == 4 { Err(format!("item {n} broke")) } else { Ok(n * 10) }
        })
        .await;

        assert_eq!(outcome.succeeded(), 9);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 4);
        assert_eq!(outcome.failures[0].item, 4);
        assert_eq!(outcome.failures[0].reason, "item 4 broke");
        assert!(outcome.results[4].is_none());
        assert_eq!(outcome.results[9], Some(90));
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let outcome = run_all((0..20).collect::<Vec<u32>>(), 4, |_| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        })
        .await;

        assert_eq!(outcome.succeeded(), 20);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_recorded_as_failure() {
        let outcome = run_all(vec![1, 2, 3], 2, |n: i32| async move {
            assert!(n != 2, "bad item");
            Ok::<_, String>(n)
        })
        .await;

        let (values, failures) = outcome.into_parts();
        assert_eq!(values, [1, 3]);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("bad item"));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = run_all(Vec::<u8>::new(), 6, |n| async move { Ok::<_, String>(n) }).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
