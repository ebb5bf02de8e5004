//! Stream roles and the building blocks composed from them.
//!
//! - [`role`]: [`Source`], [`Transform`], [`Sink`] and their plumbing
//! - [`compose`]: [`pipe`], [`merge`] and [`run`]
//! - [`operator`]: synchronous stateful operators and function-backed transforms
//! - [`wrap`]: adapters from streams, iterators and async functions
//! - [`split`]: delimiter splitting with incremental decoding
//! - [`spawn`]: external processes as transforms
//! - [`utils`]: small general-purpose transforms

pub mod compose;
pub mod decode;
pub mod operator;
pub mod role;
pub mod spawn;
pub mod split;
pub mod utils;
pub mod wrap;

pub use compose::{merge, pipe, run, Downstream, Merge, Upstream};
pub use decode::Encoding;
pub use operator::{filter_map_transform, map_transform, run_operator, Operator};
pub use role::{Completion, Inbox, Inlet, Role, RoleKind, Sink, Source, Transform};
pub use spawn::{spawn_transform, spawn_transform_with};
pub use split::{lines, split, split_with, Delimiter, MAX_BYTE_DELIMITER};
pub use utils::{as_bytes, as_lines, flatten, pass_through, skip_empty_lines};
pub use wrap::{from_iter, from_value, wrap_sink, wrap_source, wrap_transform};
