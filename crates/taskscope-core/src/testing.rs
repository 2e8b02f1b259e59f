//! Payload fixtures shared by unit and integration tests.

use crate::graph::buffer::{AccessMode, BufferId};
use crate::graph::command::{CommandId, CommandKind};
use crate::graph::dependency::DependencyKind;
use crate::graph::node::NodeId;
use crate::graph::task::{ExecutionTarget, TaskId};
use crate::payload::{
    RawBox, RawBufferAccess, RawCommand, RawDependency, RawJob, RawPayload, RawTask, RunInfo,
};

/// Fluent builder for one node's payload.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    payload: RawPayload,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload recorded by `node_id`, carrying its reference time point.
    pub fn node(node_id: NodeId, reference_time_point: u64) -> Self {
        Self::new().run_info(RunInfo {
            node_id,
            reference_time_point,
            executable_name: None,
            executable_args: None,
        })
    }

    pub fn run_info(mut self, info: RunInfo) -> Self {
        self.payload.run_info = Some(info);
        self
    }

    pub fn run_id(mut self, run_id: &str) -> Self {
        self.payload.run_id = Some(run_id.to_string());
        self
    }

    pub fn task(mut self, id: TaskId, name: &str, predecessors: &[(TaskId, DependencyKind)]) -> Self {
        self.payload.tasks.push(RawTask {
            id,
            name: name.to_string(),
            target: ExecutionTarget::Device,
            predecessors: deps(predecessors),
        });
        self
    }

    pub fn command(mut self, command: RawCommand) -> Self {
        self.payload.commands.push(command);
        self
    }

    pub fn job(mut self, command_id: CommandId, start: i64, finish: i64) -> Self {
        self.payload.jobs.push(RawJob {
            command_id,
            start,
            finish,
        });
        self
    }

    /// Add `command` together with a job covering `[start, finish]`.
    pub fn timed(self, command: RawCommand, start: i64, finish: i64) -> Self {
        let id = command.id;
        self.command(command).job(id, start, finish)
    }

    pub fn build(self) -> RawPayload {
        self.payload
    }
}

fn deps(predecessors: &[(u64, DependencyKind)]) -> Vec<RawDependency> {
    predecessors
        .iter()
        .map(|&(id, kind)| RawDependency { id, kind })
        .collect()
}

/// A bare command of `kind` on `node`.
pub fn command(id: CommandId, node: NodeId, kind: CommandKind) -> RawCommand {
    RawCommand {
        id,
        node_id: node,
        kind,
        task_id: None,
        execution_range: None,
        other_node_id: None,
        buffer_accesses: Vec::new(),
        predecessors: Vec::new(),
    }
}

/// A task command depending on `predecessors`.
pub fn task_command(
    id: CommandId,
    node: NodeId,
    predecessors: &[(CommandId, DependencyKind)],
) -> RawCommand {
    RawCommand {
        predecessors: deps(predecessors),
        ..command(id, node, CommandKind::Task)
    }
}

/// A transfer command (push or await-push) of the cube `[0, extent)^3` of
/// `buffer` between `node` and `peer`.
pub fn transfer(
    id: CommandId,
    kind: CommandKind,
    node: NodeId,
    peer: NodeId,
    buffer: BufferId,
    extent: u64,
) -> RawCommand {
    let mode = if kind == CommandKind::Push {
        AccessMode::Read
    } else {
        AccessMode::DiscardWrite
    };
    RawCommand {
        other_node_id: Some(peer),
        buffer_accesses: vec![RawBufferAccess {
            buffer_id: buffer,
            mode,
            range: RawBox::new([0, 0, 0], [extent, extent, extent]),
        }],
        ..command(id, node, kind)
    }
}

/// Three nodes with reference times 1000, 1200 and 900, one task command
/// each. Node 1's command runs at raw `[500, 700]`.
pub fn skewed_clocks() -> Vec<RawPayload> {
    vec![
        PayloadBuilder::node(0, 1000)
            .run_id("run-1")
            .timed(task_command(1, 0, &[]), 100, 400)
            .build(),
        PayloadBuilder::node(1, 1200)
            .run_id("run-1")
            .timed(task_command(2, 1, &[]), 500, 700)
            .build(),
        PayloadBuilder::node(2, 900)
            .run_id("run-1")
            .timed(task_command(3, 2, &[]), 150, 300)
            .build(),
    ]
}

/// Two pushes from node 0 to node 1 of the same region of buffer 7 (ending
/// at 1000 and 2000) and one await-push on node 1 ending at 1005.
pub fn competing_pushes() -> Vec<RawPayload> {
    vec![
        PayloadBuilder::node(0, 1000)
            .timed(transfer(10, CommandKind::Push, 0, 1, 7, 4), 900, 1000)
            .timed(transfer(11, CommandKind::Push, 0, 1, 7, 4), 1900, 2000)
            .build(),
        PayloadBuilder::node(1, 1000)
            .timed(transfer(20, CommandKind::AwaitPush, 1, 0, 7, 4), 800, 1005)
            .build(),
    ]
}

/// A chain of task commands on node 0: `3 -> 2 -> 1` (3 depends on 2, 2 on 1).
pub fn task_chain() -> Vec<RawPayload> {
    vec![PayloadBuilder::node(0, 1000)
        .timed(task_command(1, 0, &[]), 0, 10)
        .timed(task_command(2, 0, &[(1, DependencyKind::True)]), 10, 20)
        .timed(task_command(3, 0, &[(2, DependencyKind::True)]), 20, 30)
        .build()]
}
