//! Testing utilities for ironstream pipelines.
//!
//! - **Assertions**: compare drained streams with expected records, check
//!   that a stream fails, measure callback concurrency
//! - **Fixtures**: sample datasets, chunking helpers and temporary files in
//!   plain or compressed form
//!
//! # Quick Start
//!
//! ```ignore
//! use ironstream::stream::{from_iter, lines};
//! use ironstream::testing::*;
//!
//! #[tokio::test]
//! async fn splits_lines() -> anyhow::Result<()> {
//!     let source = from_iter(chunked(b"a\nb\nc", 2)).merge(lines());
//!     assert_stream_yields(source, vec!["a".to_string(), "b".into(), "c".into()]).await;
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
