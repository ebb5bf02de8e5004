//! `pipe` and `merge` over the role combination table.
//!
//! | upstream  | downstream | `pipe` returns | `merge` returns |
//! |-----------|------------|----------------|-----------------|
//! | Source    | Transform  | the Transform  | Source          |
//! | Source    | Sink       | the Sink       | -               |
//! | Transform | Transform  | the downstream | Transform       |
//! | Transform | Sink       | the Sink       | Sink            |
//!
//! Both operations are total over this table; any other pairing is rejected
//! by the type checker.

use crate::error::{Item, StreamError};
use crate::stream::role::{Completion, Feeder, Role, Sink, Source, Transform};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Roles whose output can be connected to a downstream role.
pub trait Upstream<T>: Role {
    /// The readable side. For a transform this closes its input.
    fn into_source(self) -> Source<T>;
}

impl<T> Upstream<T> for Source<T> {
    fn into_source(self) -> Source<T> {
        self
    }
}

impl<I: Send + 'static, T: Send + 'static> Upstream<T> for Transform<I, T> {
    fn into_source(self) -> Source<T> {
        Transform::into_source(self)
    }
}

/// Roles whose input can be fed from an upstream role.
pub trait Downstream<T>: Role {
    /// Start feeding `upstream` into this role's input.
    fn connect(&mut self, upstream: Source<T>);
}

impl<T: Send + 'static, O: Send + 'static> Downstream<T> for Transform<T, O> {
    fn connect(&mut self, upstream: Source<T>) {
        match self.input.take() {
            Some(tx) => self.output.attach(feed(upstream, tx)),
            None => {
                self.output = Source::failed(already_connected::<Self>());
            }
        }
    }
}

impl<T: Send + 'static> Downstream<T> for Sink<T> {
    fn connect(&mut self, upstream: Source<T>) {
        match self.input.take() {
            Some(tx) => self.attach(feed(upstream, tx)),
            None => {
                self.completion = Completion::failed(already_connected::<Self>());
            }
        }
    }
}

fn already_connected<R: Role>() -> StreamError {
    StreamError::Composition(format!("{} input is already connected", R::KIND))
}

/// Move every item of `upstream` into `tx`, stopping after an error or once
/// the receiving side is gone.
fn feed<T: Send + 'static>(mut upstream: Source<T>, tx: mpsc::Sender<Item<T>>) -> Feeder {
    Box::pin(async move {
        while let Some(item) = upstream.next().await {
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                trace!("downstream closed; releasing upstream");
                return;
            }
            if failed {
                return;
            }
        }
    })
}

/// Connect `upstream`'s output to `downstream`'s input and return `downstream`.
pub fn pipe<T, U, D>(upstream: U, mut downstream: D) -> D
where
    U: Upstream<T>,
    D: Downstream<T>,
{
    debug!(from = %U::KIND, to = %D::KIND, "pipe");
    downstream.connect(upstream.into_source());
    downstream
}

/// Composition that yields a new role representing both operands.
pub trait Merge<D> {
    type Output;

    fn merge(self, downstream: D) -> Self::Output;
}

impl<O, T> Merge<Transform<O, T>> for Source<O>
where
    O: Send + 'static,
    T: Send + 'static,
{
    type Output = Source<T>;

    fn merge(self, downstream: Transform<O, T>) -> Source<T> {
        debug!("merge source + transform");
        pipe(self, downstream).into_source()
    }
}

impl<I, O> Merge<Sink<O>> for Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Output = Sink<I>;

    fn merge(self, mut downstream: Sink<O>) -> Sink<I> {
        debug!("merge transform + sink");
        let (input, output) = self.into_parts();
        downstream.connect(output);
        Sink::from_parts(input, downstream.completion)
    }
}

impl<I, O, T> Merge<Transform<O, T>> for Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    T: Send + 'static,
{
    type Output = Transform<I, T>;

    fn merge(self, mut downstream: Transform<O, T>) -> Transform<I, T> {
        debug!("merge transform + transform");
        let (input, output) = self.into_parts();
        downstream.connect(output);
        Transform::from_parts(input, downstream.output)
    }
}

/// Connect `a` and `b` and return the composite role.
pub fn merge<A, B>(a: A, b: B) -> A::Output
where
    A: Merge<B>,
{
    a.merge(b)
}

/// Drain `upstream` into `sink` and wait for the sink to finish.
///
/// # Errors
/// The first error raised anywhere in the chain.
pub async fn run<T, U>(upstream: U, sink: Sink<T>) -> Result<(), StreamError>
where
    T: Send + 'static,
    U: Upstream<T>,
{
    pipe(upstream, sink).finished().await
}
