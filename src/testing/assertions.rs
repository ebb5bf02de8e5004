//! Assertion helpers for stream outputs and executor behaviour.

use crate::error::StreamError;
use crate::stream::Source;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use ironstream::testing::assert_records_equal;
///
/// assert_records_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_records_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected count: {}\n  Actual count: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Record mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two collections contain the same elements, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in content (ignoring order).
///
/// # Example
///
/// ```
/// use ironstream::testing::assert_records_unordered_equal;
///
/// assert_records_unordered_equal(&[3, 1, 2], &[1, 2, 3]);
/// ```
pub fn assert_records_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );

    let actual_set: HashSet<_> = actual.iter().collect();
    let expected_set: HashSet<_> = expected.iter().collect();
    if actual_set != expected_set {
        let missing: Vec<_> = expected_set.difference(&actual_set).collect();
        let extra: Vec<_> = actual_set.difference(&expected_set).collect();
        panic!(
            "Record content mismatch:\n  Missing: {missing:?}\n  Extra: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Drain `source` and assert it yields exactly `expected`, in order.
///
/// # Panics
///
/// Panics if the source fails or yields anything else.
pub async fn assert_stream_yields<T>(source: Source<T>, expected: Vec<T>)
where
    T: Debug + PartialEq + Send + 'static,
{
    match source.collect_vec().await {
        Ok(actual) => assert_records_equal(&actual, &expected),
        Err(err) => panic!("Stream failed: {err}\n  Expected: {expected:?}"),
    }
}

/// Drain `source`, assert it fails, and return the error.
///
/// # Panics
///
/// Panics if the source ends without an error.
pub async fn assert_stream_fails<T>(source: Source<T>) -> StreamError
where
    T: Debug + Send + 'static,
{
    match source.collect_vec().await {
        Ok(items) => panic!("Stream ended without an error after {} items: {items:?}", items.len()),
        Err(err) => err,
    }
}

/// Tracks how many operations are in flight and the peak reached.
///
/// ```
/// use ironstream::testing::ConcurrencyProbe;
///
/// let probe = ConcurrencyProbe::default();
/// {
///     let _a = probe.enter();
///     let _b = probe.enter();
/// }
/// assert_eq!(probe.peak(), 2);
/// assert_eq!(probe.current(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    /// Mark one operation as started; it ends when the guard drops.
    pub fn enter(&self) -> ProbeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard { probe: self }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Returned by [`ConcurrencyProbe::enter`].
#[must_use = "the operation ends when the guard is dropped"]
pub struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}
