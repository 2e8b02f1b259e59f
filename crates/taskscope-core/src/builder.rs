//! Four-pass conversion of raw per-node payloads into a [`Trace`].
//!
//! 1. Extract entities: run metadata, tasks, commands, compute nodes, buffers.
//! 2. Dependencies: recorded task and command predecessor edges.
//! 3. Time normalization: move every node's job timestamps onto node 0's clock.
//! 4. Data dependencies: pair each await-push with the push that fed it.
//!
//! Payload order does not affect the result except where the input itself
//! is contradictory (conflicting run ids or reference times), in which case
//! the first payload wins and the conflict is logged.
//!
//! # Example
//!
//! ```rust
//! use taskscope_core::builder::build;
//! use taskscope_core::graph::command::CommandKind;
//! use taskscope_core::payload::{RawCommand, RawJob, RawPayload, RunInfo};
//!
//! let payload = RawPayload {
//!     run_info: Some(RunInfo {
//!         node_id: 0,
//!         reference_time_point: 1_000,
//!         executable_name: Some("app".into()),
//!         executable_args: None,
//!     }),
//!     commands: vec![RawCommand {
//!         id: 1,
//!         node_id: 0,
//!         kind: CommandKind::Task,
//!         task_id: None,
//!         execution_range: None,
//!         other_node_id: None,
//!         buffer_accesses: vec![],
//!         predecessors: vec![],
//!     }],
//!     jobs: vec![RawJob { command_id: 1, start: 10, finish: 25 }],
//!     ..Default::default()
//! };
//!
//! let trace = build(&[payload]).unwrap();
//! assert_eq!(trace.command_count(), 1);
//! assert_eq!(trace.duration(), 15);
//! ```

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{BuildError, Result, UnmatchedReason};
use crate::graph::buffer::{Buffer, BufferAccess, BufferId};
use crate::graph::command::{Command, CommandId, CommandKind, TimeSpan};
use crate::graph::dependency::{Dependency, DependencyId, DependencyKind};
use crate::graph::geometry::{Box3, ExecutionRange};
use crate::graph::node::{ComputeNode, NodeId};
use crate::graph::task::{Task, TaskId};
use crate::graph::Trace;
use crate::observer::{observe_phase, NoopObserver, Phase, PhaseObserver};
use crate::payload::{RawCommand, RawPayload};

/// Options controlling how forgiving the builder is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Log dangling predecessor ids at `warn` instead of `debug`.
    pub warn_unresolved_dependencies: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            warn_unresolved_dependencies: true,
        }
    }
}

/// Build a trace from payloads with default options.
pub fn build(payloads: &[RawPayload]) -> Result<Trace> {
    TraceBuilder::new(BuildOptions::default()).build(payloads)
}

/// Converts raw payloads into a trace graph.
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    options: BuildOptions,
}

impl TraceBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn build(&self, payloads: &[RawPayload]) -> Result<Trace> {
        self.build_observed(payloads, &mut NoopObserver)
    }

    /// Build, reporting each pass to `observer`.
    pub fn build_observed(
        &self,
        payloads: &[RawPayload],
        observer: &mut dyn PhaseObserver,
    ) -> Result<Trace> {
        let mut state = observe_phase(observer, Phase::ExtractEntities, || {
            BuildState::extract_entities(payloads)
        })?;
        observe_phase(observer, Phase::Dependencies, || {
            state.link_dependencies(payloads, &self.options)
        });
        let mut trace = observe_phase(observer, Phase::TimeNormalization, || {
            state.normalize_times(payloads)
        })?;
        observe_phase(observer, Phase::DataDependencies, || {
            compute_data_dependencies(&mut trace)
        })?;

        tracing::info!(
            run_id = trace.run_id.as_deref().unwrap_or("-"),
            nodes = trace.node_count(),
            tasks = trace.task_count(),
            commands = trace.command_count(),
            dependencies = trace.dependency_count(),
            duration = trace.duration(),
            "trace built"
        );
        Ok(trace)
    }
}

/// A command whose timing has not been assigned yet.
#[derive(Debug)]
struct CommandDraft {
    id: CommandId,
    node: NodeId,
    kind: CommandKind,
    task: Option<TaskId>,
    execution_range: Option<ExecutionRange>,
    other_node: Option<NodeId>,
    buffer_accesses: Vec<BufferAccess>,
    predecessors: Vec<DependencyId>,
    successors: Vec<DependencyId>,
    span: Option<TimeSpan>,
}

impl CommandDraft {
    fn finish(self, span: TimeSpan) -> Command {
        Command {
            id: self.id,
            node: self.node,
            kind: self.kind,
            task: self.task,
            execution_range: self.execution_range,
            other_node: self.other_node,
            buffer_accesses: self.buffer_accesses,
            span,
            predecessors: self.predecessors,
            successors: self.successors,
        }
    }
}

/// Entities gathered by passes 1 and 2, before timing is known.
#[derive(Debug, Default)]
struct BuildState {
    run_id: Option<String>,
    executable_name: Option<String>,
    executable_args: Option<String>,
    nodes: BTreeSet<NodeId>,
    tasks: BTreeMap<TaskId, Task>,
    commands: BTreeMap<CommandId, CommandDraft>,
    buffers: BTreeMap<BufferId, Buffer>,
    task_dependencies: Vec<Dependency<TaskId>>,
    command_dependencies: Vec<Dependency<CommandId>>,
}

impl BuildState {
    /// Pass 1.
    fn extract_entities(payloads: &[RawPayload]) -> Result<Self> {
        let mut state = Self::default();

        for payload in payloads {
            state.merge_run_id(payload.run_id.as_deref());
            if let Some(info) = &payload.run_info {
                if info.reference_time_point == 0 {
                    return Err(BuildError::MissingReferenceTime { node: info.node_id });
                }
                state.nodes.insert(info.node_id);
                if state.executable_name.is_none() {
                    state.executable_name = info.executable_name.clone();
                }
                if state.executable_args.is_none() {
                    state.executable_args = info.executable_args.clone();
                }
            }
        }

        // Tasks first so commands can resolve tasks recorded by any payload.
        for payload in payloads {
            for raw in &payload.tasks {
                match state.tasks.entry(raw.id) {
                    Entry::Vacant(e) => {
                        e.insert(Task::new(raw.id, raw.name.clone(), raw.target));
                    }
                    Entry::Occupied(_) => {
                        tracing::debug!(task = raw.id, "task recorded by several payloads");
                    }
                }
            }
        }

        for payload in payloads {
            for raw in &payload.commands {
                state.register_command(raw)?;
            }
        }

        Ok(state)
    }

    fn merge_run_id(&mut self, run_id: Option<&str>) {
        let Some(run_id) = run_id else { return };
        match &self.run_id {
            None => self.run_id = Some(run_id.to_string()),
            Some(existing) if existing != run_id => {
                tracing::warn!(
                    run_id = existing.as_str(),
                    other = run_id,
                    "payloads disagree on run id; keeping the first"
                );
            }
            Some(_) => {}
        }
    }

    fn register_command(&mut self, raw: &RawCommand) -> Result<()> {
        if self.commands.contains_key(&raw.id) {
            return Err(BuildError::DuplicateCommand(raw.id));
        }
        self.nodes.insert(raw.node_id);

        let task = match raw.task_id {
            Some(task) if self.tasks.contains_key(&task) => Some(task),
            Some(task) => {
                tracing::warn!(command = raw.id, task, "command references unknown task");
                None
            }
            None => None,
        };

        let other_node = match raw.other_node_id {
            Some(peer) if raw.kind.has_peer() => {
                self.nodes.insert(peer);
                Some(peer)
            }
            Some(peer) => {
                tracing::debug!(
                    command = raw.id,
                    kind = %raw.kind,
                    peer,
                    "ignoring peer node on a command kind without one"
                );
                None
            }
            None => None,
        };

        let mut buffer_accesses = Vec::with_capacity(raw.buffer_accesses.len());
        for access in &raw.buffer_accesses {
            let range = Box3::from(access.range);
            self.buffers
                .entry(access.buffer_id)
                .or_insert_with(|| Buffer::new(access.buffer_id))
                .cover(&range);
            buffer_accesses.push(BufferAccess::new(access.buffer_id, access.mode, range));
        }

        self.commands.insert(
            raw.id,
            CommandDraft {
                id: raw.id,
                node: raw.node_id,
                kind: raw.kind,
                task,
                execution_range: raw.execution_range.map(Box3::from),
                other_node,
                buffer_accesses,
                predecessors: Vec::new(),
                successors: Vec::new(),
                span: None,
            },
        );
        Ok(())
    }

    /// Pass 2.
    fn link_dependencies(&mut self, payloads: &[RawPayload], options: &BuildOptions) {
        // Tasks are replicated across payloads; link each recorded edge once.
        let mut seen_task_edges: HashSet<(TaskId, TaskId, DependencyKind)> = HashSet::new();

        for payload in payloads {
            for raw in &payload.tasks {
                for pred in &raw.predecessors {
                    if !self.tasks.contains_key(&pred.id) {
                        report_unresolved(options, "task", raw.id, pred.id);
                        continue;
                    }
                    if !seen_task_edges.insert((raw.id, pred.id, pred.kind)) {
                        continue;
                    }
                    let id = self.task_dependencies.len();
                    self.task_dependencies
                        .push(Dependency::new(raw.id, pred.id, pred.kind));
                    if let Some(task) = self.tasks.get_mut(&raw.id) {
                        task.predecessors.push(id);
                    }
                    if let Some(task) = self.tasks.get_mut(&pred.id) {
                        task.successors.push(id);
                    }
                }
            }

            for raw in &payload.commands {
                for pred in &raw.predecessors {
                    if !self.commands.contains_key(&pred.id) {
                        report_unresolved(options, "command", raw.id, pred.id);
                        continue;
                    }
                    let id = self.command_dependencies.len();
                    self.command_dependencies
                        .push(Dependency::new(raw.id, pred.id, pred.kind));
                    if let Some(cmd) = self.commands.get_mut(&raw.id) {
                        cmd.predecessors.push(id);
                    }
                    if let Some(cmd) = self.commands.get_mut(&pred.id) {
                        cmd.successors.push(id);
                    }
                }
            }
        }
    }

    /// Pass 3. Consumes the state and produces the timed trace.
    fn normalize_times(mut self, payloads: &[RawPayload]) -> Result<Trace> {
        let mut reference_times: BTreeMap<NodeId, u64> = BTreeMap::new();
        for info in payloads.iter().filter_map(|p| p.run_info.as_ref()) {
            match reference_times.entry(info.node_id) {
                Entry::Vacant(e) => {
                    e.insert(info.reference_time_point);
                }
                Entry::Occupied(e) => {
                    tracing::warn!(
                        node = info.node_id,
                        kept = *e.get(),
                        ignored = info.reference_time_point,
                        "duplicate reference time point; keeping the first"
                    );
                }
            }
        }

        let mut nodes = BTreeMap::new();
        if !self.nodes.is_empty() {
            let base = *reference_times
                .get(&0)
                .ok_or(BuildError::MissingReferenceTime { node: 0 })?;
            let base = i64::try_from(base).map_err(|_| BuildError::ClockOffsetOverflow {
                node: 0,
                reference_time: base,
            })?;
            for &id in &self.nodes {
                let reference_time = *reference_times
                    .get(&id)
                    .ok_or(BuildError::MissingReferenceTime { node: id })?;
                let clock_offset = i64::try_from(reference_time)
                    .ok()
                    .and_then(|t| t.checked_sub(base))
                    .ok_or(BuildError::ClockOffsetOverflow {
                        node: id,
                        reference_time,
                    })?;
                nodes.insert(
                    id,
                    ComputeNode {
                        id,
                        reference_time,
                        clock_offset,
                    },
                );
            }
        }

        for job in payloads.iter().flat_map(|p| p.jobs.iter()) {
            let Some(draft) = self.commands.get_mut(&job.command_id) else {
                tracing::warn!(command = job.command_id, "job references unknown command");
                continue;
            };
            if draft.span.is_some() {
                tracing::warn!(command = job.command_id, "duplicate job record; keeping the first");
                continue;
            }
            if job.finish < job.start {
                tracing::warn!(
                    command = job.command_id,
                    start = job.start,
                    finish = job.finish,
                    "job finishes before it starts; clamping to zero length"
                );
            }
            let offset = nodes.get(&draft.node).map_or(0, |n: &ComputeNode| n.clock_offset);
            let shifted = job.start.checked_add(offset).zip(job.finish.checked_add(offset));
            let (start, finish) = shifted.ok_or(BuildError::TimestampOverflow {
                command: job.command_id,
            })?;
            draft.span = Some(TimeSpan::new(start, finish));
        }

        let commands: BTreeMap<CommandId, Command> = std::mem::take(&mut self.commands)
            .into_iter()
            .map(|(id, draft)| {
                let span = draft.span.unwrap_or_else(|| {
                    tracing::warn!(command = id, "command has no job record");
                    TimeSpan::ZERO
                });
                (id, draft.finish(span))
            })
            .collect();

        // Relative times are taken against the earliest start, so the whole
        // extent has to fit a timestamp.
        let min_start = commands.values().map(Command::start_time).min();
        let latest = commands.values().max_by_key(|c| c.end_time());
        if let (Some(min_start), Some(latest)) = (min_start, latest) {
            if latest.end_time().checked_sub(min_start).is_none() {
                return Err(BuildError::TimestampOverflow { command: latest.id });
            }
        }

        let mut trace = Trace::from_parts(
            nodes,
            self.tasks,
            commands,
            self.buffers,
            self.task_dependencies,
            self.command_dependencies,
        );
        trace.run_id = self.run_id;
        trace.executable_name = self.executable_name;
        trace.executable_args = self.executable_args;
        Ok(trace)
    }
}

fn report_unresolved(options: &BuildOptions, entity: &'static str, origin: u64, missing: u64) {
    if options.warn_unresolved_dependencies {
        tracing::warn!(entity, origin, missing, "skipping dependency on unknown id");
    } else {
        tracing::debug!(entity, origin, missing, "skipping dependency on unknown id");
    }
}

/// Pass 4: link every await-push to the push that produced its data.
///
/// Candidates share the await-push's buffer access (ignoring mode) and run
/// between the mirrored node pair. The candidate whose end time deviates
/// least from the await-push's wins; ties go to the lowest command id.
fn compute_data_dependencies(trace: &mut Trace) -> Result<()> {
    let mut pushes: HashMap<BufferAccess, Vec<CommandId>> = HashMap::new();
    let mut awaits: Vec<CommandId> = Vec::new();

    for command in trace.commands() {
        if !matches!(command.kind, CommandKind::Push | CommandKind::AwaitPush) {
            continue;
        }
        let [access] = command.buffer_accesses.as_slice() else {
            return Err(BuildError::InvalidPushCommand {
                command: command.id,
                kind: command.kind,
                accesses: command.buffer_accesses.len(),
            });
        };
        if command.kind == CommandKind::Push {
            pushes.entry(*access).or_default().push(command.id);
        } else {
            awaits.push(command.id);
        }
    }

    let mut links = Vec::with_capacity(awaits.len());
    for await_id in awaits {
        let Some(await_cmd) = trace.get_command(await_id) else {
            continue;
        };
        let candidates = pushes.get(&await_cmd.buffer_accesses[0]).ok_or(
            BuildError::UnmatchedDataDependency {
                command: await_id,
                reason: UnmatchedReason::NoCandidates,
            },
        )?;

        let mut best: Option<(CommandId, u64)> = None;
        for push in candidates.iter().filter_map(|&id| trace.get_command(id)) {
            let mirrored =
                Some(push.node) == await_cmd.other_node && push.other_node == Some(await_cmd.node);
            if !mirrored {
                continue;
            }
            let deviation = push.end_time().abs_diff(await_cmd.end_time());
            if best.map_or(true, |(_, d)| deviation < d) {
                best = Some((push.id, deviation));
            }
        }

        let (push_id, deviation) = best.ok_or(BuildError::UnmatchedDataDependency {
            command: await_id,
            reason: UnmatchedReason::NoMirroredNodePair,
        })?;
        tracing::trace!(await_push = await_id, push = push_id, deviation, "paired transfer");
        links.push((await_id, push_id));
    }

    for (await_id, push_id) in links {
        trace.link_commands(await_id, push_id, DependencyKind::Data)?;
    }
    Ok(())
}
