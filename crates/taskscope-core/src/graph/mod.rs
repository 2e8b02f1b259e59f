//! The trace graph: compute nodes, tasks, commands, buffers and the typed
//! dependency edges between them.
//!
//! A [`Trace`] owns every entity reachable from it. Edges live in two edge
//! tables (one for tasks, one for commands) and each endpoint keeps the
//! indices of its incoming and outgoing edges, so the graph can be walked in
//! both directions without cloning entities.

pub mod buffer;
pub mod command;
pub mod dependency;
pub mod geometry;
pub mod node;
pub mod task;

use std::collections::BTreeMap;

use thiserror::Error;

use self::buffer::{Buffer, BufferId};
use self::command::{Command, CommandId, Timestamp};
use self::dependency::{Dependency, DependencyId, DependencyKind};
use self::node::{ComputeNode, NodeId};
use self::task::{Task, TaskId};

/// Errors raised while linking or validating a trace graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("command not found: {0}")]
    CommandNotFound(CommandId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("dependency {dependency} is not mirrored on its {endpoint} endpoint")]
    UnmirroredDependency {
        dependency: DependencyId,
        endpoint: &'static str,
    },

    #[error("dependency {0} listed by an entity that is not one of its endpoints")]
    ForeignDependency(DependencyId),
}

/// The root aggregate of a loaded trace.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub run_id: Option<String>,
    pub executable_name: Option<String>,
    pub executable_args: Option<String>,

    min_start_time: Timestamp,
    max_end_time: Timestamp,

    nodes: BTreeMap<NodeId, ComputeNode>,
    tasks: BTreeMap<TaskId, Task>,
    commands: BTreeMap<CommandId, Command>,
    buffers: BTreeMap<BufferId, Buffer>,

    task_dependencies: Vec<Dependency<TaskId>>,
    command_dependencies: Vec<Dependency<CommandId>>,
}

impl Trace {
    pub(crate) fn from_parts(
        nodes: BTreeMap<NodeId, ComputeNode>,
        tasks: BTreeMap<TaskId, Task>,
        commands: BTreeMap<CommandId, Command>,
        buffers: BTreeMap<BufferId, Buffer>,
        task_dependencies: Vec<Dependency<TaskId>>,
        command_dependencies: Vec<Dependency<CommandId>>,
    ) -> Self {
        let mut trace = Self {
            run_id: None,
            executable_name: None,
            executable_args: None,
            min_start_time: 0,
            max_end_time: 0,
            nodes,
            tasks,
            commands,
            buffers,
            task_dependencies,
            command_dependencies,
        };
        trace.compute_time_bounds();
        trace
    }

    /// Recompute the min start / max end over all commands.
    fn compute_time_bounds(&mut self) {
        self.min_start_time = self
            .commands
            .values()
            .map(Command::start_time)
            .min()
            .unwrap_or(0);
        self.max_end_time = self
            .commands
            .values()
            .map(Command::end_time)
            .max()
            .unwrap_or(0);
    }

    pub fn min_start_time(&self) -> Timestamp {
        self.min_start_time
    }

    pub fn max_end_time(&self) -> Timestamp {
        self.max_end_time
    }

    /// `max_end_time - min_start_time`.
    pub fn duration(&self) -> Timestamp {
        self.max_end_time - self.min_start_time
    }

    pub fn get_node(&self, id: NodeId) -> Option<&ComputeNode> {
        self.nodes.get(&id)
    }

    pub fn get_task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(&id)
    }

    pub fn get_buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ComputeNode> {
        self.nodes.values()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// All commands in ascending id order.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of command edges plus task edges.
    pub fn dependency_count(&self) -> usize {
        self.command_dependencies.len() + self.task_dependencies.len()
    }

    pub fn command_dependency(&self, id: DependencyId) -> Option<&Dependency<CommandId>> {
        self.command_dependencies.get(id)
    }

    pub fn task_dependency(&self, id: DependencyId) -> Option<&Dependency<TaskId>> {
        self.task_dependencies.get(id)
    }

    pub fn command_dependencies(&self) -> impl Iterator<Item = (DependencyId, &Dependency<CommandId>)> {
        self.command_dependencies.iter().enumerate()
    }

    pub fn task_dependencies(&self) -> impl Iterator<Item = (DependencyId, &Dependency<TaskId>)> {
        self.task_dependencies.iter().enumerate()
    }

    /// Edges from `id` to the commands it depends on.
    pub fn command_predecessors(
        &self,
        id: CommandId,
    ) -> impl Iterator<Item = (DependencyId, &Dependency<CommandId>)> {
        self.resolve_command_edges(id, Command::predecessors)
    }

    /// Edges from the commands depending on `id` to `id`.
    pub fn command_successors(
        &self,
        id: CommandId,
    ) -> impl Iterator<Item = (DependencyId, &Dependency<CommandId>)> {
        self.resolve_command_edges(id, Command::successors)
    }

    pub fn task_predecessors(
        &self,
        id: TaskId,
    ) -> impl Iterator<Item = (DependencyId, &Dependency<TaskId>)> {
        self.resolve_task_edges(id, Task::predecessors)
    }

    pub fn task_successors(
        &self,
        id: TaskId,
    ) -> impl Iterator<Item = (DependencyId, &Dependency<TaskId>)> {
        self.resolve_task_edges(id, Task::successors)
    }

    fn resolve_command_edges(
        &self,
        id: CommandId,
        list: fn(&Command) -> &[DependencyId],
    ) -> impl Iterator<Item = (DependencyId, &Dependency<CommandId>)> {
        self.commands
            .get(&id)
            .map(list)
            .unwrap_or(&[])
            .iter()
            .filter_map(|&dep| self.command_dependencies.get(dep).map(|d| (dep, d)))
    }

    fn resolve_task_edges(
        &self,
        id: TaskId,
        list: fn(&Task) -> &[DependencyId],
    ) -> impl Iterator<Item = (DependencyId, &Dependency<TaskId>)> {
        self.tasks
            .get(&id)
            .map(list)
            .unwrap_or(&[])
            .iter()
            .filter_map(|&dep| self.task_dependencies.get(dep).map(|d| (dep, d)))
    }

    /// Commands of every compute node, sorted ascending by start time
    /// (ties by id). Nodes without commands map to an empty list.
    pub fn commands_by_node(&self) -> BTreeMap<NodeId, Vec<&Command>> {
        let mut by_node: BTreeMap<NodeId, Vec<&Command>> =
            self.nodes.keys().map(|&id| (id, Vec::new())).collect();
        for command in self.commands.values() {
            by_node.entry(command.node).or_default().push(command);
        }
        for commands in by_node.values_mut() {
            commands.sort_by_key(|c| (c.start_time(), c.id));
        }
        by_node
    }

    /// Add a command edge: `origin` depends on `target`.
    pub(crate) fn link_commands(
        &mut self,
        origin: CommandId,
        target: CommandId,
        kind: DependencyKind,
    ) -> Result<DependencyId, TraceError> {
        if !self.commands.contains_key(&target) {
            return Err(TraceError::CommandNotFound(target));
        }
        let id = self.command_dependencies.len();
        let origin_cmd = self
            .commands
            .get_mut(&origin)
            .ok_or(TraceError::CommandNotFound(origin))?;
        origin_cmd.predecessors.push(id);
        if let Some(target_cmd) = self.commands.get_mut(&target) {
            target_cmd.successors.push(id);
        }
        self.command_dependencies
            .push(Dependency::new(origin, target, kind));
        Ok(id)
    }

    /// Check that every edge is listed on both of its endpoints and that no
    /// entity lists an edge it is not part of.
    pub fn validate_mirroring(&self) -> Result<(), Vec<TraceError>> {
        let mut errors = Vec::new();

        for (id, dep) in self.command_dependencies.iter().enumerate() {
            let in_origin = self
                .commands
                .get(&dep.origin)
                .is_some_and(|c| c.predecessors.iter().filter(|&&d| d == id).count() == 1);
            let in_target = self
                .commands
                .get(&dep.target)
                .is_some_and(|c| c.successors.iter().filter(|&&d| d == id).count() == 1);
            if !in_origin {
                errors.push(TraceError::UnmirroredDependency {
                    dependency: id,
                    endpoint: "origin",
                });
            }
            if !in_target {
                errors.push(TraceError::UnmirroredDependency {
                    dependency: id,
                    endpoint: "target",
                });
            }
        }
        for command in self.commands.values() {
            for &id in &command.predecessors {
                if self.command_dependencies.get(id).map(|d| d.origin) != Some(command.id) {
                    errors.push(TraceError::ForeignDependency(id));
                }
            }
            for &id in &command.successors {
                if self.command_dependencies.get(id).map(|d| d.target) != Some(command.id) {
                    errors.push(TraceError::ForeignDependency(id));
                }
            }
        }

        for (id, dep) in self.task_dependencies.iter().enumerate() {
            let in_origin = self
                .tasks
                .get(&dep.origin)
                .is_some_and(|t| t.predecessors.iter().filter(|&&d| d == id).count() == 1);
            let in_target = self
                .tasks
                .get(&dep.target)
                .is_some_and(|t| t.successors.iter().filter(|&&d| d == id).count() == 1);
            if !in_origin {
                errors.push(TraceError::UnmirroredDependency {
                    dependency: id,
                    endpoint: "origin",
                });
            }
            if !in_target {
                errors.push(TraceError::UnmirroredDependency {
                    dependency: id,
                    endpoint: "target",
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::command::{CommandKind, TimeSpan};

    fn command(id: CommandId, node: NodeId, start: Timestamp, end: Timestamp) -> Command {
        Command {
            id,
            node,
            kind: CommandKind::Task,
            task: None,
            execution_range: None,
            other_node: None,
            buffer_accesses: Vec::new(),
            span: TimeSpan::new(start, end),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    fn node(id: NodeId) -> (NodeId, ComputeNode) {
        (
            id,
            ComputeNode {
                id,
                reference_time: 1,
                clock_offset: 0,
            },
        )
    }

    fn trace_of(commands: Vec<Command>) -> Trace {
        let nodes = [node(0), node(1)].into_iter().collect();
        let commands = commands.into_iter().map(|c| (c.id, c)).collect();
        Trace::from_parts(
            nodes,
            BTreeMap::new(),
            commands,
            BTreeMap::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn time_bounds_cover_all_commands() {
        let trace = trace_of(vec![command(1, 0, 50, 80), command(2, 1, 20, 60)]);
        assert_eq!(trace.min_start_time(), 20);
        assert_eq!(trace.max_end_time(), 80);
        assert_eq!(trace.duration(), 60);
    }

    #[test]
    fn empty_trace_has_zero_duration() {
        let trace = Trace::default();
        assert_eq!(trace.duration(), 0);
        assert_eq!(trace.command_count(), 0);
    }

    #[test]
    fn link_mirrors_edge_on_both_endpoints() {
        let mut trace = trace_of(vec![command(1, 0, 0, 10), command(2, 0, 10, 20)]);
        let dep = trace.link_commands(2, 1, DependencyKind::True).unwrap();

        assert_eq!(trace.get_command(2).unwrap().predecessors(), &[dep]);
        assert_eq!(trace.get_command(1).unwrap().successors(), &[dep]);
        assert!(trace.validate_mirroring().is_ok());

        let preds: Vec<_> = trace.command_predecessors(2).map(|(_, d)| d.target).collect();
        assert_eq!(preds, vec![1]);
        let succs: Vec<_> = trace.command_successors(1).map(|(_, d)| d.origin).collect();
        assert_eq!(succs, vec![2]);
    }

    #[test]
    fn link_rejects_unknown_endpoints() {
        let mut trace = trace_of(vec![command(1, 0, 0, 10)]);
        assert_eq!(
            trace.link_commands(1, 9, DependencyKind::Order),
            Err(TraceError::CommandNotFound(9))
        );
        assert_eq!(
            trace.link_commands(9, 1, DependencyKind::Order),
            Err(TraceError::CommandNotFound(9))
        );
        assert_eq!(trace.dependency_count(), 0);
        assert!(trace.get_command(1).unwrap().successors().is_empty());
    }

    #[test]
    fn unmirrored_edge_detected() {
        let mut trace = trace_of(vec![command(1, 0, 0, 10), command(2, 0, 10, 20)]);
        trace.link_commands(2, 1, DependencyKind::True).unwrap();
        trace.commands.get_mut(&1).unwrap().successors.clear();

        let errors = trace.validate_mirroring().unwrap_err();
        assert_eq!(
            errors,
            vec![TraceError::UnmirroredDependency {
                dependency: 0,
                endpoint: "target",
            }]
        );
    }

    #[test]
    fn commands_by_node_sorted_by_start() {
        let trace = trace_of(vec![
            command(1, 0, 30, 40),
            command(2, 0, 10, 20),
            command(3, 0, 10, 15),
        ]);
        let by_node = trace.commands_by_node();
        let order: Vec<_> = by_node[&0].iter().map(|c| c.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(by_node[&1].is_empty());
    }
}
