//! Delimiter-based record splitting.
//!
//! Two algorithms share one contract: records come out in input order with
//! the delimiter removed, independent of how the input was chunked.
//!
//! - **Byte scan** handles a single ASCII delimiter over an ASCII-compatible
//!   encoding. Raw bytes accumulate until [`SplitOptions::threshold`] is
//!   reached or input ends; the buffer is then scanned once and records are
//!   decoded only as they are emitted.
//! - **Decode and match** handles everything else: text is decoded
//!   incrementally, appended to the carried-over remainder, and split on a
//!   literal or a regular expression.
//!
//! Which one runs is decided when the splitter is built.

use crate::error::StreamError;
use crate::options::SplitOptions;
use crate::stream::decode::{Decoder, Encoding};
use crate::stream::operator::Operator;
use crate::stream::role::Transform;
use regex::Regex;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Largest byte value (exclusive) accepted as a [`Delimiter::Byte`].
pub const MAX_BYTE_DELIMITER: u8 = 0x7f;

/// What separates two records.
#[derive(Clone, Debug)]
pub enum Delimiter {
    /// A single ASCII byte below [`MAX_BYTE_DELIMITER`].
    Byte(u8),
    /// A non-empty literal string.
    Literal(String),
    /// A regular expression that never matches the empty string.
    Pattern(Regex),
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::Byte(b'\n')
    }
}

impl From<u8> for Delimiter {
    fn from(byte: u8) -> Self {
        Self::Byte(byte)
    }
}

impl From<&str> for Delimiter {
    fn from(literal: &str) -> Self {
        Self::Literal(literal.to_owned())
    }
}

impl From<String> for Delimiter {
    fn from(literal: String) -> Self {
        Self::Literal(literal)
    }
}

impl From<Regex> for Delimiter {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

enum Matcher {
    Literal(String),
    Pattern(Regex),
}

impl Matcher {
    /// Split `text`, returning every complete record and the trailing piece.
    fn split<'t>(&self, text: &'t str) -> (Vec<&'t str>, &'t str) {
        let mut pieces: Vec<&str> = match self {
            Self::Literal(literal) => text.split(literal.as_str()).collect(),
            Self::Pattern(pattern) => pattern.split(text).collect(),
        };
        let last = pieces.pop().unwrap_or_default();
        (pieces, last)
    }
}

enum Plan {
    Scan(u8),
    Match(Matcher),
}

fn plan(delimiter: Delimiter, encoding: Encoding) -> Result<Plan, StreamError> {
    let plan = match delimiter {
        Delimiter::Byte(byte) if byte >= MAX_BYTE_DELIMITER => {
            return Err(StreamError::InvalidDelimiter(format!(
                "byte delimiter must be below {MAX_BYTE_DELIMITER:#04x}, got {byte:#04x}"
            )));
        }
        Delimiter::Byte(byte) if encoding.is_ascii_compatible() => Plan::Scan(byte),
        Delimiter::Byte(byte) => Plan::Match(Matcher::Literal(char::from(byte).to_string())),
        Delimiter::Literal(literal) if literal.is_empty() => {
            return Err(StreamError::InvalidDelimiter("literal delimiter is empty".into()));
        }
        Delimiter::Literal(literal) => match literal.as_bytes() {
            [byte] if *byte < MAX_BYTE_DELIMITER && encoding.is_ascii_compatible() => Plan::Scan(*byte),
            _ => Plan::Match(Matcher::Literal(literal)),
        },
        Delimiter::Pattern(pattern) if pattern.is_match("") => {
            return Err(StreamError::InvalidDelimiter(format!(
                "pattern `{pattern}` matches the empty string"
            )));
        }
        Delimiter::Pattern(pattern) => Plan::Match(Matcher::Pattern(pattern)),
    };
    Ok(plan)
}

/// Split chunks of text or bytes into records.
///
/// `None` picks the defaults: a `\n` byte delimiter and UTF-8.
///
/// # Errors
/// [`StreamError::InvalidDelimiter`] for a byte at or above
/// [`MAX_BYTE_DELIMITER`], an empty literal, or a pattern matching the empty
/// string.
pub fn split<C>(delimiter: Option<Delimiter>, encoding: Option<Encoding>) -> Result<Transform<C, String>, StreamError>
where
    C: AsRef<[u8]> + Send + 'static,
{
    split_with(delimiter.unwrap_or_default(), encoding.unwrap_or_default(), SplitOptions::default())
}

/// [`split`] with explicit options.
///
/// # Errors
/// See [`split`].
pub fn split_with<C>(
    delimiter: impl Into<Delimiter>,
    encoding: Encoding,
    options: SplitOptions,
) -> Result<Transform<C, String>, StreamError>
where
    C: AsRef<[u8]> + Send + 'static,
{
    let transform = match plan(delimiter.into(), encoding)? {
        Plan::Scan(byte) => {
            debug!(delimiter = byte, %encoding, threshold = options.threshold, "byte-scan splitter");
            Transform::from_operator(ByteScan::new(byte, encoding, options))
        }
        Plan::Match(matcher) => {
            debug!(%encoding, "decode-and-match splitter");
            Transform::from_operator(DecodeMatch {
                matcher,
                decoder: encoding.decoder(),
                remainder: String::new(),
                keep_trailing_empty: options.keep_trailing_empty,
                seen_input: false,
                _chunk: PhantomData,
            })
        }
    };
    Ok(transform)
}

/// Newline-delimited UTF-8 records.
pub fn lines<C>() -> Transform<C, String>
where
    C: AsRef<[u8]> + Send + 'static,
{
    Transform::from_operator(ByteScan::new(b'\n', Encoding::Utf8, SplitOptions::default()))
}

struct ByteScan<C> {
    delimiter: u8,
    encoding: Encoding,
    threshold: usize,
    keep_trailing_empty: bool,
    // Unterminated tail followed by bytes not yet scanned.
    buffer: Vec<u8>,
    unscanned: usize,
    seen_input: bool,
    _chunk: PhantomData<fn(C)>,
}

impl<C> ByteScan<C> {
    fn new(delimiter: u8, encoding: Encoding, options: SplitOptions) -> Self {
        Self {
            delimiter,
            encoding,
            threshold: options.threshold.max(1),
            keep_trailing_empty: options.keep_trailing_empty,
            buffer: Vec::new(),
            unscanned: 0,
            seen_input: false,
            _chunk: PhantomData,
        }
    }

    fn scan(&mut self, out: &mut Vec<String>) {
        // The tail holds no delimiter, so only new bytes are searched.
        let from = self.buffer.len() - self.unscanned;
        let mut start = 0;
        for (offset, _) in self.buffer[from..]
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == self.delimiter)
        {
            let end = from + offset;
            out.push(self.encoding.decode_lossy(&self.buffer[start..end]));
            start = end + 1;
        }
        trace!(scanned = self.unscanned, records = out.len(), "batch scan");
        self.buffer.drain(..start);
        self.unscanned = 0;
    }
}

impl<C: AsRef<[u8]> + 'static> Operator<C, String> for ByteScan<C> {
    fn transform(&mut self, chunk: C, out: &mut Vec<String>) -> Result<(), StreamError> {
        let bytes = chunk.as_ref();
        self.seen_input |= !bytes.is_empty();
        self.buffer.extend_from_slice(bytes);
        self.unscanned += bytes.len();
        if self.unscanned >= self.threshold {
            self.scan(out);
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<String>) -> Result<(), StreamError> {
        self.scan(out);
        if !self.buffer.is_empty() || (self.keep_trailing_empty && self.seen_input) {
            out.push(self.encoding.decode_lossy(&self.buffer));
        }
        self.buffer.clear();
        Ok(())
    }
}

struct DecodeMatch<C> {
    matcher: Matcher,
    decoder: Decoder,
    remainder: String,
    keep_trailing_empty: bool,
    seen_input: bool,
    _chunk: PhantomData<fn(C)>,
}

impl<C> DecodeMatch<C> {
    fn push_text(&mut self, text: &str, out: &mut Vec<String>) {
        if text.is_empty() {
            return;
        }
        self.remainder.push_str(text);
        let (records, last) = self.matcher.split(&self.remainder);
        if records.is_empty() {
            return;
        }
        out.extend(records.into_iter().map(str::to_owned));
        self.remainder = last.to_owned();
    }
}

impl<C: AsRef<[u8]> + 'static> Operator<C, String> for DecodeMatch<C> {
    fn transform(&mut self, chunk: C, out: &mut Vec<String>) -> Result<(), StreamError> {
        let bytes = chunk.as_ref();
        self.seen_input |= !bytes.is_empty();
        let text = self.decoder.write(bytes);
        self.push_text(&text, out);
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<String>) -> Result<(), StreamError> {
        let text = self.decoder.finish();
        self.push_text(&text, out);
        let last = std::mem::take(&mut self.remainder);
        if !last.is_empty() || (self.keep_trailing_empty && self.seen_input) {
            out.push(last);
        }
        Ok(())
    }
}
