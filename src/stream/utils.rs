//! Small general-purpose transforms.

use crate::error::StreamError;
use crate::stream::operator::{filter_map_transform, map_transform, Operator};
use crate::stream::role::{Source, Transform};
use crate::stream::split::{split, Delimiter};
use std::convert::Infallible;
use std::marker::PhantomData;

/// Forward every item unchanged.
pub fn pass_through<T: Send + 'static>() -> Transform<T, T> {
    Transform::from_stream_fn(|inbox| inbox)
}

struct Flatten<C>(PhantomData<fn(C)>);

impl<C, T> Operator<C, T> for Flatten<C>
where
    C: IntoIterator<Item = T> + 'static,
{
    fn transform(&mut self, item: C, out: &mut Vec<T>) -> Result<(), StreamError> {
        out.extend(item);
        Ok(())
    }
}

/// Emit the elements of every collection item, in order.
pub fn flatten<C, T>() -> Transform<C, T>
where
    C: IntoIterator<Item = T> + Send + 'static,
    T: Send + 'static,
{
    Transform::from_operator(Flatten(PhantomData))
}

/// Drop empty strings.
pub fn skip_empty_lines() -> Transform<String, String> {
    filter_map_transform(|line: String| Ok::<_, Infallible>((!line.is_empty()).then_some(line)))
}

/// Copy text or byte chunks into owned byte buffers.
pub fn as_bytes<C>() -> Transform<C, Vec<u8>>
where
    C: AsRef<[u8]> + Send + 'static,
{
    map_transform(|chunk: C| Ok::<_, Infallible>(chunk.as_ref().to_vec()))
}

/// Split a UTF-8 byte or text source into records, newline-delimited by default.
///
/// # Errors
/// [`StreamError::InvalidDelimiter`] if `delimiter` is rejected by [`split`].
pub fn as_lines<C>(source: Source<C>, delimiter: Option<Delimiter>) -> Result<Source<String>, StreamError>
where
    C: AsRef<[u8]> + Send + 'static,
{
    let splitter = split(delimiter, None)?;
    Ok(source.merge(splitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::from_iter;

    #[tokio::test]
    async fn flatten_preserves_order() {
        let out = from_iter([vec![1, 2], vec![], vec![3]])
            .merge(flatten())
            .collect_vec()
            .await
            .unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn skip_empty_lines_keeps_whitespace() {
        let lines = ["a", "", " ", "b"].map(String::from);
        let out = from_iter(lines).merge(skip_empty_lines()).collect_vec().await.unwrap();
        assert_eq!(out, vec!["a", " ", "b"]);
    }

    #[tokio::test]
    async fn as_lines_defaults_to_newline() {
        let lines = as_lines(from_iter(["x\ny", "\nz"]), None).unwrap();
        assert_eq!(lines.collect_vec().await.unwrap(), vec!["x", "y", "z"]);
    }
}
