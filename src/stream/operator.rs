//! Stateful item-to-items operators and the function-backed transforms built on them.

use crate::error::{Item, StreamError};
use crate::stream::role::{Inbox, Transform};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::marker::PhantomData;

/// Synchronous, stateful step behind a [`Transform`].
///
/// `transform` is called once per input item and `flush` once at
/// end-of-input. Both append outputs to `out`. Returning an error ends the
/// transform after the outputs already appended have been delivered.
pub trait Operator<I, O>: Send + 'static {
    fn transform(&mut self, item: I, out: &mut Vec<O>) -> Result<(), StreamError>;

    fn flush(&mut self, _out: &mut Vec<O>) -> Result<(), StreamError> {
        Ok(())
    }
}

struct OperatorState<I, O, Op> {
    inbox: Option<Inbox<I>>,
    op: Op,
    scratch: Vec<O>,
    ready: VecDeque<Item<O>>,
}

/// Drive `op` over `inbox`, forwarding upstream errors.
pub fn run_operator<I, O, Op>(inbox: Inbox<I>, op: Op) -> impl Stream<Item = Item<O>> + Send + 'static
where
    I: Send + 'static,
    O: Send + 'static,
    Op: Operator<I, O>,
{
    let state = OperatorState {
        inbox: Some(inbox),
        op,
        scratch: Vec::new(),
        ready: VecDeque::new(),
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(next) = st.ready.pop_front() {
                return Some((next, st));
            }
            let inbox = st.inbox.as_mut()?;
            let step = match inbox.next().await {
                Some(Ok(item)) => st.op.transform(item, &mut st.scratch),
                Some(Err(err)) => Err(err),
                None => {
                    st.inbox = None;
                    st.op.flush(&mut st.scratch)
                }
            };
            st.ready.extend(st.scratch.drain(..).map(Ok));
            if let Err(err) = step {
                // Dropping the inbox rejects further writes.
                st.inbox = None;
                st.ready.push_back(Err(err));
            }
        }
    })
}

struct MapOp<F, E> {
    f: F,
    index: usize,
    _e: PhantomData<fn() -> E>,
}

impl<I, O, E, F> Operator<I, O> for MapOp<F, E>
where
    F: FnMut(I) -> Result<Option<O>, E> + Send + 'static,
    E: Display + 'static,
{
    fn transform(&mut self, item: I, out: &mut Vec<O>) -> Result<(), StreamError> {
        let index = self.index;
        self.index += 1;
        match (self.f)(item) {
            Ok(Some(value)) => {
                out.push(value);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(StreamError::ItemCallback {
                index,
                message: err.to_string(),
            }),
        }
    }
}

/// Transform applying a synchronous fallible function to every item.
pub fn map_transform<I, O, E, F>(mut f: F) -> Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Result<O, E> + Send + 'static,
    E: Display + 'static,
{
    filter_map_transform(move |item| f(item).map(Some))
}

/// Transform applying a function that may drop items by returning `Ok(None)`.
pub fn filter_map_transform<I, O, E, F>(f: F) -> Transform<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Result<Option<O>, E> + Send + 'static,
    E: Display + 'static,
{
    Transform::from_operator(MapOp {
        f,
        index: 0,
        _e: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::from_iter;

    struct Pairs {
        held: Option<u32>,
    }

    impl Operator<u32, (u32, u32)> for Pairs {
        fn transform(&mut self, item: u32, out: &mut Vec<(u32, u32)>) -> Result<(), StreamError> {
            match self.held.take() {
                Some(first) => out.push((first, item)),
                None => self.held = Some(item),
            }
            Ok(())
        }

        fn flush(&mut self, out: &mut Vec<(u32, u32)>) -> Result<(), StreamError> {
            if let Some(last) = self.held.take() {
                out.push((last, 0));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn operator_flushes_held_state() {
        let out = from_iter([1u32, 2, 3])
            .merge(Transform::from_operator(Pairs { held: None }))
            .collect_vec()
            .await
            .unwrap();
        assert_eq!(out, vec![(1, 2), (3, 0)]);
    }

    #[tokio::test]
    async fn map_error_reports_item_index() {
        let t = map_transform(|x: u32| if x == 2 { Err("boom") } else { Ok(x) });
        let err = from_iter([0u32, 1, 2, 3]).merge(t).collect_vec().await.unwrap_err();
        match err {
            StreamError::ItemCallback { index, message } => {
                assert_eq!(index, 2);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
