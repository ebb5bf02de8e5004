//! # Ironstream
//!
//! Asynchronous **stream plumbing** for Rust: bounded-concurrency iteration,
//! composable Source/Transform/Sink roles with backpressure, a delimiter
//! splitter with a fast byte-scan path, and subprocesses used as transforms.
//!
//! ## Key Features
//!
//! - **Bounded concurrency** - run an async callback over a sequence with at most K in flight
//! - **Composable roles** - `pipe` and `merge` sources, transforms and sinks into pipelines
//! - **Backpressure** - every role is fed through a bounded channel
//! - **Splitting** - byte, literal or regex delimiters over any supported text encoding
//! - **Processes as transforms** - stream chunks through a command's stdin and stdout
//! - **Data files** - read, decompress and parse CSV, TSV, NDJSON or plain lines
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironstream::*;
//! # use anyhow::Result;
//!
//! # async fn demo() -> Result<()> {
//! // Upper-case every line of a byte stream through `tr`
//! let chunks = from_iter(vec![b"hello\nwor".to_vec(), b"ld\n".to_vec()]);
//! let lines = chunks
//!     .merge(spawn_transform("tr", ["a-z", "A-Z"]))
//!     .merge(lines())
//!     .collect_vec()
//!     .await?;
//! assert_eq!(lines, vec!["HELLO", "WORLD"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Roles
//!
//! A [`Source`] yields items, a [`Sink`] consumes them and a [`Transform`]
//! does both. Roles are lazy: nothing moves until the last role in a chain is
//! drained, either by polling a source or by awaiting a sink's [`Completion`].
//!
//! - [`pipe`] - connect an upstream to a downstream and return the downstream
//! - [`merge`] - collapse two roles into one whose input is the first's input
//!   and whose output is the second's output
//! - [`run`] - pipe a source into a sink and await completion
//!
//! ### Items and errors
//!
//! Every role carries [`Item<T>`], a `Result<T, StreamError>`. The first
//! error ends the stream and propagates downstream.
//!
//! ### Executor
//!
//! - [`for_each_async`] - run a callback over every item with bounded concurrency
//! - [`map_async`] - the same, collecting results in input order
//!
//! ## I/O
//!
//! ```no_run
//! use ironstream::io::{read_data_file, DataFileOptions, Format};
//! # use anyhow::Result;
//!
//! # async fn demo() -> Result<()> {
//! // Compression is detected from the extension
//! let records = read_data_file("events.ndjson.gz", &DataFileOptions::new(Format::Ndjson))
//!     .await?
//!     .collect_vec()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `io-http` - read `http(s)://` locations with reqwest
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz` - in-process codecs
//!
//! ## Module Overview
//!
//! - [`executor`] - bounded-concurrency iteration
//! - [`stream`] - roles, composition, splitting and process transforms
//! - [`io`] - byte sources, compression codecs, record parsers and data files
//! - [`options`] - tunables shared by the roles
//! - [`testing`] - assertions and fixtures for tests

pub mod error;
pub mod executor;
pub mod io;
pub mod options;
pub mod stream;
pub mod testing;

// General re-exports
pub use error::{Item, StreamError};
pub use executor::{for_each_async, for_each_async_iter, map_async};
pub use options::{default_concurrency, SplitOptions, StreamOptions, DEFAULT_CHANNEL_CAPACITY, DEFAULT_SPLIT_THRESHOLD};
pub use stream::{
    as_bytes, as_lines, filter_map_transform, flatten, from_iter, from_value, lines, map_transform, merge,
    pass_through, pipe, run, skip_empty_lines, spawn_transform, spawn_transform_with, split, split_with,
    wrap_sink, wrap_source, wrap_transform, Completion, Delimiter, Encoding, Sink, Source, Transform,
};
