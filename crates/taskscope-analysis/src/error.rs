//! Analysis and index errors.

use thiserror::Error;

use taskscope_core::{BuildError, CommandId, ErrorCategory, Timestamp};

/// Errors from temporal index queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("time {time} lies outside the trace [0, {duration}]")]
    OutOfRangeTime { time: Timestamp, duration: Timestamp },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors from dependency expansion and critical-path computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no command ends at the trace's maximum end time {max_end}")]
    NoTerminalCommand { max_end: Timestamp },

    #[error("unknown command: {0}")]
    UnknownCommand(CommandId),
}

impl AnalysisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::NoTerminalCommand { .. } => ErrorCategory::MalformedInput,
            AnalysisError::InvalidArgument(_)
            | AnalysisError::InvalidState(_)
            | AnalysisError::UnknownCommand(_) => ErrorCategory::CallerMisuse,
        }
    }
}

impl IndexError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::CallerMisuse
    }
}

/// Errors raised while loading or querying a [`crate::TraceSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("trace failed to load: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Build(e) => e.category(),
            SessionError::Index(e) => e.category(),
            SessionError::Analysis(e) => e.category(),
        }
    }
}
