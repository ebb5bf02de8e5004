//! Adapters that turn plain Rust values into roles.

use crate::error::StreamError;
use crate::stream::role::{Sink, Source, Transform};
use futures::stream::{self, Stream, StreamExt};
use std::fmt::Display;
use std::future::Future;

/// Wrap any stream as a [`Source`].
pub fn wrap_source<S>(stream: S) -> Source<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    Source::from_stream(stream)
}

/// Source over the items of an iterator.
pub fn from_iter<T, It>(items: It) -> Source<T>
where
    T: Send + 'static,
    It: IntoIterator<Item = T>,
    It::IntoIter: Send + 'static,
{
    Source::from_stream(stream::iter(items))
}

/// Source yielding exactly one item.
pub fn from_value<T: Send + 'static>(value: T) -> Source<T> {
    from_iter([value])
}

/// Transform applying an async fallible function to every item, in order.
///
/// The first error ends the transform as [`StreamError::ItemCallback`].
pub fn wrap_transform<I, O, E, F, Fut>(f: F) -> Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Display,
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    Transform::from_stream_fn(move |inbox| {
        stream::unfold(Some((inbox, f, 0usize)), |state| async move {
            let (mut inbox, mut f, index) = state?;
            match inbox.next().await? {
                Ok(item) => match f(item).await {
                    Ok(out) => Some((Ok(out), Some((inbox, f, index + 1)))),
                    Err(err) => Some((
                        Err(StreamError::ItemCallback {
                            index,
                            message: err.to_string(),
                        }),
                        None,
                    )),
                },
                Err(err) => Some((Err(err), None)),
            }
        })
    })
}

/// Sink calling an async fallible function on every item, one at a time.
pub fn wrap_sink<I, E, F, Fut>(mut f: F) -> Sink<I>
where
    I: Send + 'static,
    E: Display,
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Sink::from_consumer_fn(move |mut inbox| async move {
        let mut index = 0usize;
        while let Some(item) = inbox.next().await {
            f(item?).await.map_err(|err| StreamError::ItemCallback {
                index,
                message: err.to_string(),
            })?;
            index += 1;
        }
        Ok(())
    })
}
