//! Bounded-concurrency execution of async callbacks over a sequence.
//!
//! Callbacks start in input order and at most `concurrency` of them are
//! unsettled at any time. Completion order is unspecified.
//!
//! The first callback error is returned as soon as it settles. Callbacks
//! still in flight at that point are dropped, which cancels them at their
//! next suspension point; no further items are pulled.

use crate::options::default_concurrency;
use futures::future::FutureExt;
use futures::stream::{self, FuturesUnordered, Stream, StreamExt};
use std::future::Future;
use std::pin::pin;
use tracing::{debug, trace};

async fn drive<S, F, Fut, T, E>(
    items: S,
    mut callback: F,
    concurrency: Option<usize>,
    mut settled: impl FnMut(usize, T),
) -> Result<(), E>
where
    S: Stream,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let limit = concurrency.unwrap_or_else(default_concurrency).max(1);
    let mut items = pin!(items.fuse());
    let mut running = FuturesUnordered::new();
    let mut next_index = 0usize;
    let mut exhausted = false;
    debug!(limit, "executor started");

    loop {
        tokio::select! {
            biased;
            Some((index, result)) = running.next(), if !running.is_empty() => match result {
                Ok(value) => {
                    trace!(index, "callback settled");
                    settled(index, value);
                }
                Err(err) => {
                    debug!(index, in_flight = running.len(), "callback failed; dropping in-flight work");
                    return Err(err);
                }
            },
            item = items.next(), if !exhausted && running.len() < limit => match item {
                Some(item) => {
                    let index = next_index;
                    next_index += 1;
                    running.push(callback(item, index).map(move |result| (index, result)));
                }
                None => exhausted = true,
            },
            else => break,
        }
    }
    debug!(items = next_index, "executor finished");
    Ok(())
}

/// Run `callback(item, index)` for every item of `items`, keeping at most
/// `concurrency` calls in flight (default: the number of CPUs).
///
/// # Errors
/// The first error returned by `callback`.
pub async fn for_each_async<S, F, Fut, E>(items: S, callback: F, concurrency: Option<usize>) -> Result<(), E>
where
    S: Stream,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    drive(items, callback, concurrency, |_, ()| {}).await
}

/// [`for_each_async`] over a synchronous sequence.
///
/// # Errors
/// The first error returned by `callback`.
pub async fn for_each_async_iter<I, F, Fut, E>(items: I, callback: F, concurrency: Option<usize>) -> Result<(), E>
where
    I: IntoIterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    for_each_async(stream::iter(items), callback, concurrency).await
}

/// Like [`for_each_async`], collecting every callback result in input order.
///
/// # Errors
/// The first error returned by `callback`.
pub async fn map_async<S, F, Fut, T, E>(items: S, callback: F, concurrency: Option<usize>) -> Result<Vec<T>, E>
where
    S: Stream,
    F: FnMut(S::Item, usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut slots: Vec<Option<T>> = Vec::new();
    drive(items, callback, concurrency, |index, value| {
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }
        slots[index] = Some(value);
    })
    .await?;
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_sequence_never_calls_back() {
        let calls = AtomicUsize::new(0);
        for_each_async_iter(Vec::<u32>::new(), |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ()>(()) }
        }, Some(2))
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn limit_of_one_serializes() {
        let log = Mutex::new(Vec::new());
        for_each_async_iter(0..4, |item, _| {
            let log = &log;
            async move {
                log.lock().unwrap().push(("start", item));
                tokio::time::sleep(Duration::from_millis(2)).await;
                log.lock().unwrap().push(("end", item));
                Ok::<_, ()>(())
            }
        }, Some(1))
        .await
        .unwrap();
        let log = log.into_inner().unwrap();
        let expected: Vec<_> = (0..4).flat_map(|i| [("start", i), ("end", i)]).collect();
        assert_eq!(log, expected);
    }

    #[tokio::test]
    async fn map_async_keeps_input_order() {
        let out = map_async(stream::iter([30u64, 10, 20]), |ms, index| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, ()>((index, ms))
        }, Some(3))
        .await
        .unwrap();
        assert_eq!(out, vec![(0, 30), (1, 10), (2, 20)]);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let out = map_async(stream::iter([1, 2]), |x, _| async move { Ok::<_, ()>(x * 2) }, Some(0))
            .await
            .unwrap();
        assert_eq!(out, vec![2, 4]);
    }
}
