//! Error type shared by every stream role.
//!
//! Items travel between roles as [`Item<T>`], so a failure anywhere in a
//! chain arrives downstream as an `Err` item and ends that stream.

use thiserror::Error;

/// Result alias carried by every stream role.
pub type Item<T> = Result<T, StreamError>;

/// Errors raised by the executor, the composition layer, the splitter and the
/// process adapter.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Executor ─────────────────────────────────────────────────────────────
    /// A per-item callback failed inside [`map_async`](crate::map_async) or a
    /// function-backed role.
    #[error("callback failed for item #{index}: {message}")]
    ItemCallback { index: usize, message: String },

    // ── Composition ──────────────────────────────────────────────────────────
    /// A transform or sink reported a failure after construction.
    #[error("{0}")]
    Composition(String),

    /// The splitter was built with a delimiter it cannot match.
    #[error("invalid delimiter: {0}")]
    InvalidDelimiter(String),

    /// A write reached a role whose input side has already ended.
    #[error("stream is closed")]
    Closed,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(String),

    // ── Process adapter ──────────────────────────────────────────────────────
    #[error("Failed to execute command `{command}`: {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process `{command}` exited with code {code}")]
    ProcessExit { command: String, code: i32 },

    #[error("Process `{command}` stderr: {message}")]
    ProcessStderr { command: String, message: String },

    #[error("Failed to write to stdin of `{command}`: {source}")]
    ProcessStdin {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    /// Wrap any displayable failure as a composition error.
    pub fn composition(err: impl std::fmt::Display) -> Self {
        Self::Composition(err.to_string())
    }

    /// True for the three process-adapter failure kinds and spawn errors.
    #[must_use]
    pub fn is_process_error(&self) -> bool {
        matches!(
            self,
            Self::ProcessSpawn { .. }
                | Self::ProcessExit { .. }
                | Self::ProcessStderr { .. }
                | Self::ProcessStdin { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_mentions_failed_execution() {
        let err = StreamError::ProcessSpawn {
            command: "nope".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("Failed to execute command"));
        assert!(err.is_process_error());
    }

    #[test]
    fn composition_wraps_display() {
        let err = StreamError::composition("Test error");
        assert_eq!(err.to_string(), "Test error");
        assert!(!err.is_process_error());
    }
}
