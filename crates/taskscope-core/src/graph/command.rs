//! Commands: the unit of work a compute node executes.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::buffer::BufferAccess;
use super::dependency::DependencyId;
use super::geometry::ExecutionRange;
use super::node::NodeId;
use super::task::TaskId;

/// Globally unique command identifier.
pub type CommandId = u64;

/// Normalized timestamp in microseconds.
pub type Timestamp = i64;

/// The kind of a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Nop,
    Horizon,
    Task,
    Push,
    AwaitPush,
    Shutdown,
    Sync,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Nop,
        CommandKind::Horizon,
        CommandKind::Task,
        CommandKind::Push,
        CommandKind::AwaitPush,
        CommandKind::Shutdown,
        CommandKind::Sync,
    ];

    /// The single-bit mask for this kind.
    pub fn mask(self) -> CommandType {
        match self {
            CommandKind::Nop => CommandType::NOP,
            CommandKind::Horizon => CommandType::HORIZON,
            CommandKind::Task => CommandType::TASK,
            CommandKind::Push => CommandType::PUSH,
            CommandKind::AwaitPush => CommandType::AWAIT_PUSH,
            CommandKind::Shutdown => CommandType::SHUTDOWN,
            CommandKind::Sync => CommandType::SYNC,
        }
    }

    /// Whether commands of this kind name a peer compute node.
    pub fn has_peer(self) -> bool {
        matches!(
            self,
            CommandKind::Push | CommandKind::AwaitPush | CommandKind::Sync
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Nop => "nop",
            CommandKind::Horizon => "horizon",
            CommandKind::Task => "task",
            CommandKind::Push => "push",
            CommandKind::AwaitPush => "await_push",
            CommandKind::Shutdown => "shutdown",
            CommandKind::Sync => "sync",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of command kinds, used as a filter mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CommandType {
    bits: u8,
}

impl CommandType {
    pub const NONE: CommandType = CommandType { bits: 0 };
    pub const NOP: CommandType = CommandType { bits: 0x01 };
    pub const HORIZON: CommandType = CommandType { bits: 0x02 };
    pub const TASK: CommandType = CommandType { bits: 0x04 };
    pub const PUSH: CommandType = CommandType { bits: 0x08 };
    pub const AWAIT_PUSH: CommandType = CommandType { bits: 0x10 };
    pub const SHUTDOWN: CommandType = CommandType { bits: 0x20 };
    pub const SYNC: CommandType = CommandType { bits: 0x40 };
    pub const ALL: CommandType = CommandType { bits: 0x7f };

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// True when the two masks share at least one kind.
    pub fn intersects(&self, other: CommandType) -> bool {
        self.bits & other.bits != 0
    }

    /// True when every kind in `other` is also in this mask.
    pub fn contains(&self, other: CommandType) -> bool {
        self.bits & other.bits == other.bits
    }

    /// True when `kind` is part of this mask.
    pub fn matches(&self, kind: CommandKind) -> bool {
        self.intersects(kind.mask())
    }

    /// Kinds contained in this mask, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = CommandKind> + '_ {
        CommandKind::ALL.into_iter().filter(|k| self.matches(*k))
    }
}

impl From<CommandKind> for CommandType {
    fn from(kind: CommandKind) -> Self {
        kind.mask()
    }
}

impl BitOr for CommandType {
    type Output = CommandType;

    fn bitor(self, rhs: CommandType) -> CommandType {
        CommandType {
            bits: self.bits | rhs.bits,
        }
    }
}

impl BitOrAssign for CommandType {
    fn bitor_assign(&mut self, rhs: CommandType) {
        self.bits |= rhs.bits;
    }
}

impl BitAnd for CommandType {
    type Output = CommandType;

    fn bitand(self, rhs: CommandType) -> CommandType {
        CommandType {
            bits: self.bits & rhs.bits,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == CommandType::ALL {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.kinds().map(CommandKind::name).collect();
        f.write_str(&names.join("|"))
    }
}

/// Error returned when a command type mask cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown command type '{0}'")]
pub struct ParseCommandTypeError(pub String);

impl FromStr for CommandType {
    type Err = ParseCommandTypeError;

    /// Parse a `|`- or `,`-separated list of kind names, or `all` / `none`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = CommandType::NONE;
        for part in s.split(['|', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            let lowered = part.to_ascii_lowercase();
            mask |= match lowered.as_str() {
                "all" => CommandType::ALL,
                "none" => CommandType::NONE,
                "nop" => CommandType::NOP,
                "horizon" => CommandType::HORIZON,
                "task" => CommandType::TASK,
                "push" => CommandType::PUSH,
                "await_push" | "await-push" | "awaitpush" => CommandType::AWAIT_PUSH,
                "shutdown" => CommandType::SHUTDOWN,
                "sync" => CommandType::SYNC,
                _ => return Err(ParseCommandTypeError(part.to_string())),
            };
        }
        Ok(mask)
    }
}

/// A closed time interval `[start, end]` with `end >= start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan { start: 0, end: 0 };

    /// Create a span, clamping `end` up to `start` if it lies before it.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn duration(&self) -> Timestamp {
        self.end - self.start
    }

    /// Integer midpoint, rounded towards `start`.
    pub fn midpoint(&self) -> Timestamp {
        self.start + (self.end - self.start) / 2
    }
}

/// A command with its final timing.
///
/// Commands are only created by the trace builder once time normalization
/// has run, so the timing accessors are always valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Globally unique identifier.
    pub id: CommandId,
    /// The compute node that executed the command.
    pub node: NodeId,
    pub kind: CommandKind,
    /// The task this command was generated for, if any.
    pub task: Option<TaskId>,
    pub execution_range: Option<ExecutionRange>,
    /// Peer node of a push, await-push or sync.
    pub other_node: Option<NodeId>,
    pub buffer_accesses: Vec<BufferAccess>,
    pub(crate) span: TimeSpan,
    pub(crate) predecessors: Vec<DependencyId>,
    pub(crate) successors: Vec<DependencyId>,
}

impl Command {
    pub fn start_time(&self) -> Timestamp {
        self.span.start
    }

    pub fn end_time(&self) -> Timestamp {
        self.span.end
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn duration(&self) -> Timestamp {
        self.span.duration()
    }

    pub fn midpoint(&self) -> Timestamp {
        self.span.midpoint()
    }

    pub fn command_type(&self) -> CommandType {
        self.kind.mask()
    }

    /// Edges to the commands this command depends on.
    pub fn predecessors(&self) -> &[DependencyId] {
        &self.predecessors
    }

    /// Edges to the commands depending on this command.
    pub fn successors(&self) -> &[DependencyId] {
        &self.successors
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{} ({} on N{})", self.id, self.kind, self.node)
    }
}
