//! Trace graph model and builder for distributed task-runtime traces.
//!
//! Raw per-node [`payload`]s are merged by the [`builder`] into a single
//! [`Trace`]: commands on a common clock, linked by typed dependencies,
//! with every await-push paired to the push that produced its data.

pub mod builder;
pub mod error;
pub mod graph;
pub mod observer;
pub mod payload;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{build, BuildOptions, TraceBuilder};
pub use error::{BuildError, ErrorCategory, Result, UnmatchedReason};
pub use graph::command::{Command, CommandId, CommandKind, CommandType, TimeSpan, Timestamp};
pub use graph::dependency::{Dependency, DependencyId, DependencyKind};
pub use graph::node::NodeId;
pub use graph::{Trace, TraceError};
pub use observer::{NoopObserver, Phase, PhaseObserver, PhaseTimings};
pub use payload::RawPayload;
