use std::fmt;
use thiserror::Error;

use crate::summary::Summary;

/// Errors that end a run.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The input source could not be opened or failed mid-read. Always fatal.
    #[error("Failed to read input '{source_id}': {source}")]
    Io {
        source_id: String,
        #[source]
        source: std::io::Error,
    },

    /// More malformed records than the configured threshold, detected after a full pass.
    #[error("{malformed} malformed records exceed the error threshold of {threshold}")]
    Validation {
        malformed: u64,
        threshold: u64,
        summary: Box<Summary>,
    },

    /// A pipeline thread could not be started.
    #[error("Failed to start {thread} thread: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },
}

impl BatchError {
    pub fn io(source_id: impl Into<String>, source: std::io::Error) -> Self {
        BatchError::Io {
            source_id: source_id.into(),
            source,
        }
    }

    /// The summary gathered before the run failed, when one exists.
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            BatchError::Io { .. } | BatchError::Spawn { .. } => None,
            BatchError::Validation { summary, .. } => Some(summary),
        }
    }
}

/// Why a single record failed its format check. Never fatal; counted in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    InvalidUtf8,
    TooLong { len: usize, max: usize },
    PatternMismatch,
}

impl RecordError {
    /// Stable short name used for per-kind counters and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::InvalidUtf8 => "invalid_utf8",
            RecordError::TooLong { .. } => "too_long",
            RecordError::PatternMismatch => "pattern_mismatch",
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::InvalidUtf8 => write!(f, "line is not valid UTF-8"),
            RecordError::TooLong { len, max } => {
                write!(f, "line is {} bytes, limit is {}", len, max)
            }
            RecordError::PatternMismatch => write!(f, "line does not match the required pattern"),
        }
    }
}

impl std::error::Error for RecordError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_source() {
        let err = BatchError::io(
            "missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("missing.txt"));
        assert!(msg.contains("No such file"));
        assert!(err.summary().is_none());
    }

    #[test]
    fn test_validation_error_keeps_summary() {
        let summary = Summary {
            records: 4,
            malformed: 3,
            ..Default::default()
        };
        let err = BatchError::Validation {
            malformed: 3,
            threshold: 1,
            summary: Box::new(summary),
        };
        assert_eq!(err.summary().map(|s| s.records), Some(4));
        assert!(err.to_string().contains("threshold of 1"));
    }

    #[test]
    fn test_spawn_error_names_thread() {
        let err = BatchError::Spawn {
            thread: "worker 3".to_string(),
            source: std::io::Error::other("out of threads"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to start worker 3 thread: out of threads"
        );
        assert!(err.summary().is_none());
    }

    #[test]
    fn test_record_error_kinds() {
        assert_eq!(RecordError::InvalidUtf8.kind(), "invalid_utf8");
        assert_eq!(RecordError::TooLong { len: 9, max: 4 }.kind(), "too_long");
        assert_eq!(
            RecordError::TooLong { len: 9, max: 4 }.to_string(),
            "line is 9 bytes, limit is 4"
        );
        assert_eq!(RecordError::PatternMismatch.kind(), "pattern_mismatch");
    }
}
