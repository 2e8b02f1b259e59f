//! Trace build errors.

use std::fmt;

use thiserror::Error;

use crate::graph::command::{CommandId, CommandKind};
use crate::graph::node::NodeId;
use crate::graph::TraceError;

/// Convenience alias for results of the trace builder.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Broad class of a failure, independent of where it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The input trace is structurally unsound; the load or query aborts.
    MalformedInput,
    /// A recoverable inconsistency; logged and skipped, never returned.
    SoftInconsistency,
    /// The caller passed an invalid argument or broke a call-order contract.
    CallerMisuse,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::MalformedInput => write!(f, "malformed input"),
            ErrorCategory::SoftInconsistency => write!(f, "soft inconsistency"),
            ErrorCategory::CallerMisuse => write!(f, "caller misuse"),
        }
    }
}

/// Why an await-push could not be paired with a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// No push accesses the same buffer region.
    NoCandidates,
    /// Pushes exist for the region, but none between the mirrored node pair.
    NoMirroredNodePair,
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedReason::NoCandidates => write!(f, "no push accesses the same buffer region"),
            UnmatchedReason::NoMirroredNodePair => {
                write!(f, "no push runs between the mirrored node pair")
            }
        }
    }
}

/// Errors that abort a trace build.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing reference time point for compute node {node}")]
    MissingReferenceTime { node: NodeId },

    #[error("{kind} command {command} has {accesses} buffer accesses, expected exactly one")]
    InvalidPushCommand {
        command: CommandId,
        kind: CommandKind,
        accesses: usize,
    },

    #[error("await-push command {command} has no matching push: {reason}")]
    UnmatchedDataDependency {
        command: CommandId,
        reason: UnmatchedReason,
    },

    #[error("reference time point {reference_time} of compute node {node} is out of range")]
    ClockOffsetOverflow { node: NodeId, reference_time: u64 },

    #[error("normalized time of command {command} overflows")]
    TimestampOverflow { command: CommandId },

    #[error("duplicate command id: {0}")]
    DuplicateCommand(CommandId),

    #[error("trace graph error: {0}")]
    Graph(#[from] TraceError),
}

impl BuildError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::MalformedInput
    }
}
