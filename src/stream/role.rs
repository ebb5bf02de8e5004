//! The three stream roles: [`Source`], [`Transform`] and [`Sink`].
//!
//! Every role owns exactly one underlying stream or channel. Items travel as
//! [`Item<T>`](crate::Item); the first `Err` item ends the stream carrying it.
//!
//! Roles are lazy: a [`Source`] does nothing until it is polled, and piping a
//! role into another only attaches a *feeder* future to the downstream side.
//! Feeders are polled whenever their downstream is polled, so an entire
//! chain advances from whichever end the caller drives.

use crate::error::{Item, StreamError};
use crate::options::StreamOptions;
use crate::stream::compose::{Downstream, Merge};
use crate::stream::operator::{run_operator, Operator};
use futures::future::{self, BoxFuture, Either};
use futures::stream::{self, BoxStream, FusedStream, FuturesUnordered, Stream, StreamExt, TryStreamExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Input side of a role, as handed to its operator.
pub type Inbox<I> = ReceiverStream<Item<I>>;

/// Future that moves items from an upstream role into a downstream input.
pub(crate) type Feeder = BoxFuture<'static, ()>;

/// Read size for [`Source::from_reader`].
const READ_CHUNK: usize = 64 * 1024;

/// Tag naming the three roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Source,
    Transform,
    Sink,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Transform => "transform",
            Self::Sink => "sink",
        })
    }
}

/// Implemented by every role so composition can name what it connects.
pub trait Role {
    const KIND: RoleKind;
}

impl<O> Role for Source<O> {
    const KIND: RoleKind = RoleKind::Source;
}

impl<I, O> Role for Transform<I, O> {
    const KIND: RoleKind = RoleKind::Transform;
}

impl<I> Role for Sink<I> {
    const KIND: RoleKind = RoleKind::Sink;
}

// ---------------------------------------------------------------------------
// Inlet
// ---------------------------------------------------------------------------

/// Writable side of a [`Transform`] or [`Sink`].
///
/// `write` suspends while the role's buffer is full, which is how
/// backpressure reaches a caller that pushes items by hand.
pub struct Inlet<I> {
    tx: Option<mpsc::Sender<Item<I>>>,
}

impl<I> Inlet<I> {
    pub(crate) fn new(tx: mpsc::Sender<Item<I>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Push one item, waiting for buffer space.
    ///
    /// # Errors
    /// [`StreamError::Closed`] once the input has ended or the role has
    /// stopped reading (for example after it failed).
    pub async fn write(&mut self, item: I) -> Result<(), StreamError> {
        self.send(Ok(item)).await
    }

    /// Push a terminal error and end the input.
    ///
    /// # Errors
    /// [`StreamError::Closed`] if the role no longer reads its input.
    pub async fn abort(&mut self, err: StreamError) -> Result<(), StreamError> {
        let sent = self.send(Err(err)).await;
        self.end();
        sent
    }

    /// Signal end-of-input. Further writes fail with [`StreamError::Closed`].
    pub fn end(&mut self) {
        self.tx = None;
    }

    /// True once the input has ended or nothing reads it anymore.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    async fn send(&mut self, item: Item<I>) -> Result<(), StreamError> {
        match &self.tx {
            Some(tx) => tx.send(item).await.map_err(|_| StreamError::Closed),
            None => Err(StreamError::Closed),
        }
    }

    pub(crate) fn take(&mut self) -> Option<mpsc::Sender<Item<I>>> {
        self.tx.take()
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Lazy, single-pass, ordered producer of `O`.
///
/// A `Source` is a [`Stream`] of `Item<O>`. It ends after yielding the first
/// error, and dropping it drops everything feeding it.
#[must_use = "sources do nothing unless polled, piped or merged"]
pub struct Source<O> {
    stream: BoxStream<'static, Item<O>>,
    feeders: FuturesUnordered<Feeder>,
    done: bool,
}

impl<O: Send + 'static> Source<O> {
    /// Wrap a stream that already yields `Item<O>`.
    pub fn from_results<S>(stream: S) -> Self
    where
        S: Stream<Item = Item<O>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            feeders: FuturesUnordered::new(),
            done: false,
        }
    }

    /// Wrap a fallible stream; the first error ends the source.
    pub fn from_try_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        E: Into<StreamError>,
    {
        Self::from_results(stream.map(|item| item.map_err(Into::into)))
    }

    /// Wrap an infallible stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = O> + Send + 'static,
    {
        Self::from_results(stream.map(Ok))
    }

    /// A source that yields a single error and ends.
    pub fn failed(err: StreamError) -> Self {
        Self::from_results(stream::once(future::ready(Err(err))))
    }

    pub(crate) fn attach(&mut self, feeder: Feeder) {
        self.feeders.push(feeder);
    }

    /// Connect this source to `downstream` and return `downstream`.
    pub fn pipe<D: Downstream<O>>(self, downstream: D) -> D {
        crate::stream::compose::pipe(self, downstream)
    }

    /// Connect this source to `downstream` and return the pair as one role.
    pub fn merge<D>(self, downstream: D) -> <Self as Merge<D>>::Output
    where
        Self: Merge<D>,
    {
        Merge::merge(self, downstream)
    }

    /// Drain into a `Vec`, failing on the first error.
    ///
    /// # Errors
    /// The first error yielded by the source.
    pub async fn collect_vec(self) -> Result<Vec<O>, StreamError> {
        self.try_collect().await
    }
}

impl Source<Vec<u8>> {
    /// Read an [`AsyncRead`] in chunks of up to 64 KiB.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::from_results(stream::unfold(Some(reader), |state| async move {
            let mut reader = state?;
            let mut buf = vec![0u8; READ_CHUNK];
            match reader.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(buf), Some(reader)))
                }
                Err(err) => Some((Err(StreamError::Io(err)), None)),
            }
        }))
    }
}

impl<O: AsRef<[u8]> + Send + 'static> Source<O> {
    /// Concatenate every chunk.
    ///
    /// # Errors
    /// The first error yielded by the source.
    pub async fn to_bytes(self) -> Result<Vec<u8>, StreamError> {
        self.try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(chunk.as_ref());
            Ok(acc)
        })
        .await
    }

    /// Concatenate every chunk and decode it as UTF-8.
    ///
    /// # Errors
    /// The first error yielded by the source, or [`StreamError::Decode`].
    pub async fn to_text(self) -> Result<String, StreamError> {
        let bytes = self.to_bytes().await?;
        String::from_utf8(bytes).map_err(|err| StreamError::Decode(err.to_string()))
    }
}

impl<O> Stream for Source<O> {
    type Item = Item<O>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        // Feeders only make progress here; they finish once upstream ends.
        while let Poll::Ready(Some(())) = this.feeders.poll_next_unpin(cx) {}

        match this.stream.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(err))) => {
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            other => other,
        }
    }
}

impl<O> Source<O> {
    fn finish(&mut self) {
        self.done = true;
        self.feeders.clear();
    }
}

impl<O> FusedStream for Source<O> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Consumer of `I` and producer of `O`, with a bounded buffer in between.
#[must_use = "transforms do nothing unless polled, piped or merged"]
pub struct Transform<I, O> {
    pub(crate) input: Inlet<I>,
    pub(crate) output: Source<O>,
}

impl<I: Send + 'static, O: Send + 'static> Transform<I, O> {
    /// Build a transform from a function over its input stream.
    ///
    /// The function must forward `Err` items it receives; [`run_operator`]
    /// and the function wrappers already do.
    pub fn from_stream_fn<F, S>(op: F) -> Self
    where
        F: FnOnce(Inbox<I>) -> S,
        S: Stream<Item = Item<O>> + Send + 'static,
    {
        Self::from_stream_fn_with(StreamOptions::default(), op)
    }

    /// [`Transform::from_stream_fn`] with explicit buffering.
    pub fn from_stream_fn_with<F, S>(options: StreamOptions, op: F) -> Self
    where
        F: FnOnce(Inbox<I>) -> S,
        S: Stream<Item = Item<O>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(options.capacity());
        Self {
            input: Inlet::new(tx),
            output: Source::from_results(op(ReceiverStream::new(rx))),
        }
    }

    /// Build a transform from a stateful [`Operator`].
    pub fn from_operator<Op>(op: Op) -> Self
    where
        Op: Operator<I, O>,
    {
        Self::from_stream_fn(|inbox| run_operator(inbox, op))
    }

    pub(crate) fn from_parts(input: Inlet<I>, output: Source<O>) -> Self {
        Self { input, output }
    }

    /// Write one item into the input side, waiting for buffer space.
    ///
    /// # Errors
    /// [`StreamError::Closed`] once the input ended or the transform stopped.
    pub async fn write(&mut self, item: I) -> Result<(), StreamError> {
        self.input.write(item).await
    }

    /// Signal end-of-input.
    pub fn end(&mut self) {
        self.input.end();
    }

    /// Split into the writable side and the readable side.
    pub fn into_parts(self) -> (Inlet<I>, Source<O>) {
        (self.input, self.output)
    }

    /// Readable side only; the input is closed.
    pub fn into_source(self) -> Source<O> {
        self.output
    }

    /// Connect this transform to `downstream` and return `downstream`.
    ///
    /// The input side is closed, so this is meant for transforms that were
    /// already fed by a pipe or merge.
    pub fn pipe<D: Downstream<O>>(self, downstream: D) -> D {
        crate::stream::compose::pipe(self, downstream)
    }

    /// Connect this transform to `downstream` and return the pair as one role.
    pub fn merge<D>(self, downstream: D) -> <Self as Merge<D>>::Output
    where
        Self: Merge<D>,
    {
        Merge::merge(self, downstream)
    }

    /// Close the input and drain the output into a `Vec`.
    ///
    /// # Errors
    /// The first error yielded by the output.
    pub async fn collect_vec(self) -> Result<Vec<O>, StreamError> {
        self.into_source().collect_vec().await
    }
}

impl<I, O> Stream for Transform<I, O> {
    type Item = Item<O>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().output.poll_next_unpin(cx)
    }
}

impl<I, O> FusedStream for Transform<I, O> {
    fn is_terminated(&self) -> bool {
        self.output.is_terminated()
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Completion signal of a [`Sink`]: resolves once its upstream ended and every
/// item was consumed, or with the first error.
#[must_use = "a sink does nothing unless its completion is awaited"]
pub struct Completion {
    fut: BoxFuture<'static, Result<(), StreamError>>,
}

impl Completion {
    fn new(fut: impl Future<Output = Result<(), StreamError>> + Send + 'static) -> Self {
        Self { fut: Box::pin(fut) }
    }

    pub(crate) fn failed(err: StreamError) -> Self {
        Self::new(future::ready(Err(err)))
    }

    /// Run `feeder` alongside the consumer. The consumer's result wins: once
    /// it settles the feeder is dropped, which releases the upstream.
    fn attach(&mut self, feeder: Feeder) {
        let consumer = std::mem::replace(&mut self.fut, Box::pin(future::ready(Ok(()))));
        self.fut = Box::pin(async move {
            match future::select(consumer, feeder).await {
                Either::Left((result, _feeder)) => result,
                Either::Right(((), consumer)) => consumer.await,
            }
        });
    }
}

impl Future for Completion {
    type Output = Result<(), StreamError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.fut.as_mut().poll(cx)
    }
}

/// Consumer of `I` that drains its input to completion.
#[must_use = "a sink does nothing unless its completion is awaited"]
pub struct Sink<I> {
    pub(crate) input: Inlet<I>,
    pub(crate) completion: Completion,
}

impl<I: Send + 'static> Sink<I> {
    /// Build a sink from a function that consumes its input stream.
    pub fn from_consumer_fn<F, Fut>(consume: F) -> Self
    where
        F: FnOnce(Inbox<I>) -> Fut,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        Self::from_consumer_fn_with(StreamOptions::default(), consume)
    }

    /// [`Sink::from_consumer_fn`] with explicit buffering.
    pub fn from_consumer_fn_with<F, Fut>(options: StreamOptions, consume: F) -> Self
    where
        F: FnOnce(Inbox<I>) -> Fut,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(options.capacity());
        Self {
            input: Inlet::new(tx),
            completion: Completion::new(consume(ReceiverStream::new(rx))),
        }
    }

    /// Call a synchronous fallible function on every item.
    pub fn for_each<F, E>(mut f: F) -> Self
    where
        F: FnMut(I) -> Result<(), E> + Send + 'static,
        E: fmt::Display,
    {
        Self::from_consumer_fn(move |mut inbox| async move {
            let mut index = 0usize;
            while let Some(item) = inbox.next().await {
                f(item?).map_err(|err| StreamError::ItemCallback {
                    index,
                    message: err.to_string(),
                })?;
                index += 1;
            }
            Ok(())
        })
    }

    pub(crate) fn from_parts(input: Inlet<I>, completion: Completion) -> Self {
        Self { input, completion }
    }

    pub(crate) fn attach(&mut self, feeder: Feeder) {
        self.completion.attach(feeder);
    }

    /// Write one item, waiting for buffer space.
    ///
    /// # Errors
    /// [`StreamError::Closed`] once the input ended or the sink stopped.
    pub async fn write(&mut self, item: I) -> Result<(), StreamError> {
        self.input.write(item).await
    }

    /// Signal end-of-input.
    pub fn end(&mut self) {
        self.input.end();
    }

    /// Split into the writable side and the completion signal.
    pub fn into_parts(self) -> (Inlet<I>, Completion) {
        (self.input, self.completion)
    }

    /// Close the input and return the completion signal.
    pub fn finished(self) -> Completion {
        self.completion
    }
}

impl<I: AsRef<[u8]> + Send + 'static> Sink<I> {
    /// Write every chunk to an [`AsyncWrite`], then flush and shut it down.
    pub fn from_writer<W>(mut writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::from_consumer_fn(move |mut inbox| async move {
            while let Some(chunk) = inbox.next().await {
                writer.write_all(chunk?.as_ref()).await?;
            }
            writer.flush().await?;
            writer.shutdown().await?;
            Ok(())
        })
    }
}
