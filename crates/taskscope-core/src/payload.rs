//! Raw per-node payloads as captured by the runtime.
//!
//! One payload is recorded per compute node session. These structures are the
//! input contract of the [`crate::builder`]; they carry ids rather than
//! references and use each node's own clock.

use serde::{Deserialize, Serialize};

use crate::graph::buffer::{AccessMode, BufferId};
use crate::graph::command::{CommandId, CommandKind};
use crate::graph::dependency::DependencyKind;
use crate::graph::geometry::{Box3, Point3};
use crate::graph::node::NodeId;
use crate::graph::task::{ExecutionTarget, TaskId};

/// Everything one compute node recorded during one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub run_info: Option<RunInfo>,
    #[serde(default)]
    pub tasks: Vec<RawTask>,
    #[serde(default)]
    pub commands: Vec<RawCommand>,
    #[serde(default)]
    pub jobs: Vec<RawJob>,
}

impl RawPayload {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Run provenance and the clock reference of the recording node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub node_id: NodeId,
    /// Reference time point of the node's clock. Must be non-zero.
    pub reference_time_point: u64,
    #[serde(default)]
    pub executable_name: Option<String>,
    #[serde(default)]
    pub executable_args: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTask {
    pub id: TaskId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target: ExecutionTarget,
    #[serde(default)]
    pub predecessors: Vec<RawDependency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    pub id: CommandId,
    pub node_id: NodeId,
    pub kind: CommandKind,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub execution_range: Option<RawBox>,
    #[serde(default)]
    pub other_node_id: Option<NodeId>,
    #[serde(default)]
    pub buffer_accesses: Vec<RawBufferAccess>,
    #[serde(default)]
    pub predecessors: Vec<RawDependency>,
}

/// A reference to the task or command this one depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDependency {
    pub id: u64,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBufferAccess {
    pub buffer_id: BufferId,
    pub mode: AccessMode,
    pub range: RawBox,
}

/// A box given by its two corner points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBox {
    pub min: [u64; 3],
    pub max: [u64; 3],
}

impl RawBox {
    pub fn new(min: [u64; 3], max: [u64; 3]) -> Self {
        Self { min, max }
    }
}

impl From<RawBox> for Box3 {
    fn from(raw: RawBox) -> Self {
        Box3::new(Point3::from(raw.min), Point3::from(raw.max))
    }
}

/// Start and finish of a command's execution, in the recording node's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawJob {
    pub command_id: CommandId,
    pub start: i64,
    pub finish: i64,
}
