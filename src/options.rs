//! Tunables shared across the crate.

use serde::{Deserialize, Serialize};

/// Default number of items buffered on the input side of a role.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Default accumulation threshold for the byte-scan splitter (16 MiB).
pub const DEFAULT_SPLIT_THRESHOLD: usize = 16 * 1024 * 1024;

/// Parallelism hint used when no concurrency limit is given.
#[must_use]
pub fn default_concurrency() -> usize {
    num_cpus::get().max(1)
}

/// Buffering options for channel-backed roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Items a role accepts before `write` suspends.
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { channel_capacity: DEFAULT_CHANNEL_CAPACITY }
    }
}

impl StreamOptions {
    pub(crate) fn capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

/// Options for [`split_with`](crate::stream::split_with).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Raw bytes the byte-scan path accumulates before forcing a scan.
    pub threshold: usize,
    /// Emit an empty final record when input ends exactly on a delimiter.
    pub keep_trailing_empty: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SPLIT_THRESHOLD,
            keep_trailing_empty: false,
        }
    }
}

impl SplitOptions {
    #[must_use]
    pub fn threshold(mut self, bytes: usize) -> Self {
        self.threshold = bytes.max(1);
        self
    }

    #[must_use]
    pub fn keep_trailing_empty(mut self, keep: bool) -> Self {
        self.keep_trailing_empty = keep;
        self
    }
}
