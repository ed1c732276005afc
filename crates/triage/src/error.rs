//! Error types for the triage workflow.

use thiserror::Error;

/// Broad classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// External command exited non-zero
    CommandFailed,
    /// External command exceeded its timeout
    Timeout,
    /// Tracker returned something that was not the expected JSON
    MalformedJson,
    /// Anything else (spawn failure, I/O)
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandFailed => "command_failed",
            Self::Timeout => "timeout",
            Self::MalformedJson => "malformed_json",
            Self::Unexpected => "unexpected",
        }
    }
}

/// Errors that can abort a workflow stage.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Command ran but reported failure
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Command was killed after its deadline
    #[error("{command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// Tracker output could not be parsed
    #[error("malformed JSON from {command}: {source}")]
    MalformedJson {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// Other error
    #[error("{0}")]
    Unexpected(String),
}

impl TriageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CommandFailed { .. } => ErrorKind::CommandFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MalformedJson { .. } => ErrorKind::MalformedJson,
            Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
