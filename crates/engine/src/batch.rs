//! Bounded-concurrency batch executor shared by every pipeline that needs
//! to process many independent items (batch enrichment, bookshelf scans,
//! CSV import rows) with partial failure tolerance and progress reporting.

use std::future::Future;
use std::sync::Arc;

use book_gateway_core::error::GatewayError;
use futures::stream::{self, StreamExt};

/// Default concurrency cap for a batch run when the caller doesn't
/// override it.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;

/// One unit of batch work: `label` identifies it for progress reporting
/// (e.g. an ISBN or a photo index), `input` is handed to the worker
/// closure.
pub struct BatchItem<I> {
    pub label: String,
    pub input: I,
}

impl<I> BatchItem<I> {
    pub fn new(label: impl Into<String>, input: I) -> Self {
        Self {
            label: label.into(),
            input,
        }
    }
}

/// Runs `work` over every item with at most `concurrency` in flight at
/// once. Results preserve the input order regardless of completion order.
/// A failing item does not cancel the rest of the batch: its slot in the
/// returned `Vec` holds the error. `on_progress(completed, total, label,
/// had_error)` fires once per item as it completes.
pub async fn run_batch<I, T, F, Fut>(
    items: Vec<BatchItem<I>>,
    concurrency: usize,
    work: F,
    on_progress: impl Fn(usize, usize, &str, bool) + Send + Sync + 'static,
) -> Vec<Result<T, GatewayError>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, GatewayError>> + Send,
{
    let total = items.len();
    let concurrency = concurrency.max(1);
    let work = Arc::new(work);
    let on_progress = Arc::new(on_progress);

    let indexed: Vec<(usize, String, I)> = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| (i, item.label, item.input))
        .collect();

    let mut completed = stream::iter(indexed)
        .map(|(index, label, input)| {
            let work = work.clone();
            async move {
                let result = work(input).await;
                (index, label, result)
            }
        })
        .buffer_unordered(concurrency);

    let mut slots: Vec<Option<Result<T, GatewayError>>> = (0..total).map(|_| None).collect();
    let mut finished = 0usize;

    while let Some((index, label, result)) = completed.next().await {
        finished += 1;
        let had_error = result.is_err();
        on_progress(finished, total, &label, had_error);
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(GatewayError::Internal("batch slot never completed".to_string()))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn results_preserve_input_order_regardless_of_completion_order() {
        let items: Vec<BatchItem<u64>> = (0..5)
            .map(|i| BatchItem::new(format!("item-{i}"), (4 - i) as u64))
            .collect();

        let results = run_batch(
            items,
            3,
            |delay_ms| async move {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                Ok::<u64, GatewayError>(delay_ms)
            },
            |_, _, _, _| {},
        )
        .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn per_item_errors_do_not_abort_the_batch() {
        let items: Vec<BatchItem<i32>> = (0..4).map(|i| BatchItem::new(format!("item-{i}"), i)).collect();

        let results = run_batch(
            items,
            2,
            |n| async move {
                if n == 2 {
                    Err(GatewayError::Validation("bad item".to_string()))
                } else {
                    Ok(n * 10)
                }
            },
            |_, _, _, _| {},
        )
        .await;

        assert!(results[0].is_ok());
        assert!(results[2].is_err());
        assert!(results[3].is_ok());
    }

    #[tokio::test]
    async fn progress_callback_fires_once_per_item() {
        let items: Vec<BatchItem<i32>> = (0..6).map(|i| BatchItem::new(format!("item-{i}"), i)).collect();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let seen_errors = Arc::new(Mutex::new(Vec::new()));
        let seen_errors_clone = seen_errors.clone();

        let results = run_batch(
            items,
            4,
            |n| async move {
                if n % 2 == 0 {
                    Err(GatewayError::Internal("even".to_string()))
                } else {
                    Ok(n)
                }
            },
            move |_completed, _total, _label, had_error| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                seen_errors_clone.lock().unwrap().push(had_error);
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(results.len(), 6);
        let errors = seen_errors.lock().unwrap();
        assert_eq!(errors.iter().filter(|e| **e).count(), 3);
    }

    #[tokio::test]
    async fn respects_concurrency_cap() {
        let items: Vec<BatchItem<()>> = (0..10).map(|i| BatchItem::new(format!("item-{i}"), ())).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let in_flight_clone = in_flight.clone();
        let max_seen_clone = max_seen.clone();

        run_batch(
            items,
            3,
            move |_| {
                let in_flight = in_flight_clone.clone();
                let max_seen = max_seen_clone.clone();
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), GatewayError>(())
                }
            },
            |_, _, _, _| {},
        )
        .await;

        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }
}
