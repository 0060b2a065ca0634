//! Bounded fan-out over independent units of work

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

/// Run `work` for every item with at most `limit` in flight, returning the
/// results in item order once all of them have finished.
pub(crate) async fn fan_out<I, T, F, Fut>(items: Vec<I>, limit: usize, work: F) -> Vec<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    let semaphore = Semaphore::new(limit.max(1));
    let mut tasks = FuturesUnordered::new();
    let count = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = &semaphore;
        let task = work(item);
        tasks.push(async move {
            // Never closed, so acquisition only waits.
            let _permit = semaphore.acquire().await;
            (index, task.await)
        });
    }

    let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
    while let Some((index, result)) = tasks.next().await {
        results[index] = Some(result);
    }
    results.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_item_order() {
        let results = fan_out(vec![30u64, 10, 20], 3, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay
        })
        .await;
        assert_eq!(results, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight_count = AtomicUsize::new(0);
        let peak_count = AtomicUsize::new(0);
        let (in_flight, peak) = (&in_flight_count, &peak_count);

        fan_out((0..10).collect(), 2, move |_: i32| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })
        .await;

        assert!(peak_count.load(Ordering::SeqCst) <= 2);
        assert!(peak_count.load(Ordering::SeqCst) >= 1);
    }
}
