//! Bounded fork-join worker pool.
//!
//! Used for dev releases of independent repositories and for batch test runs.
//! Each task owns its inputs; results come back in input order.

use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `task` over every item with at most `jobs` tasks in flight
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, jobs: usize, task: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let count = items.len();
    let mut join_set = JoinSet::new();

    for (idx, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = task(item);
        join_set.spawn(async move {
            // The semaphore is never closed, so acquiring only waits
            let _permit = semaphore.acquire_owned().await;
            (idx, work.await)
        });
    }

    let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (idx, result) =
            joined.map_err(|e| anyhow::anyhow!("worker task join error: {}", e))?;
        slots[idx] = Some(result);
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_input_order() {
        let out = run_bounded(vec![30u64, 10, 20], 3, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms * 2
        })
        .await
        .unwrap();
        assert_eq!(out, vec![60, 20, 40]);
    }

    #[tokio::test]
    async fn never_exceeds_pool_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_bounded((0..8).collect::<Vec<u32>>(), 2, |_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
