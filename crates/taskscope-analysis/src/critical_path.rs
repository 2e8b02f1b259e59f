//! Greedy backward walk for the critical path of a trace.
//!
//! Starting from the command that ends last, the walk repeatedly steps to the
//! latest-ending predecessor that itself has a predecessor. It is a recency
//! heuristic over end times, not a weighted longest path.
//!
//! Anti-dependencies are never walked. A command whose only predecessors are
//! anti-dependencies therefore ends the walk, just as a source does.

use std::collections::HashSet;

use serde::Serialize;

use taskscope_core::{Command, CommandId, DependencyId, DependencyKind, Trace};

use crate::error::AnalysisError;

/// The critical path, ordered from the terminal command back to the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CriticalPath {
    /// Traversed command edges, terminal first.
    pub dependencies: Vec<DependencyId>,
    /// Commands on the path, terminal first; one more than `dependencies`.
    pub commands: Vec<CommandId>,
}

impl CriticalPath {
    pub fn terminal(&self) -> Option<CommandId> {
        self.commands.first().copied()
    }

    pub fn source(&self) -> Option<CommandId> {
        self.commands.last().copied()
    }

    /// Commands from the source forward to the terminal.
    pub fn commands_forward(&self) -> impl Iterator<Item = CommandId> + '_ {
        self.commands.iter().rev().copied()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Predecessor edges the walk may step along.
fn path_predecessors<'t>(
    trace: &'t Trace,
    id: CommandId,
) -> impl Iterator<Item = (DependencyId, &'t Command)> + 't {
    trace
        .command_predecessors(id)
        .filter(|(_, dep)| dep.kind != DependencyKind::Anti)
        .filter_map(|(dep_id, dep)| trace.get_command(dep.target).map(|c| (dep_id, c)))
}

/// Compute the critical path of `trace`.
///
/// The terminal is the lowest-id command ending at the trace's maximum end
/// time. Among candidates with equal end times the one listed last on the
/// current command wins.
///
/// A candidate "continues" when it has any predecessor at all, anti edges
/// included.
pub fn critical_path(trace: &Trace) -> Result<CriticalPath, AnalysisError> {
    let terminal = trace
        .commands()
        .find(|c| c.end_time() == trace.max_end_time())
        .ok_or(AnalysisError::NoTerminalCommand {
            max_end: trace.max_end_time(),
        })?;

    let mut path = CriticalPath {
        dependencies: Vec::new(),
        commands: vec![terminal.id],
    };
    let mut visited = HashSet::from([terminal.id]);
    let mut current = terminal.id;

    loop {
        let mut candidates: Vec<_> = path_predecessors(trace, current).collect();
        if candidates.is_empty() {
            if trace.command_predecessors(current).next().is_some() {
                tracing::debug!(
                    command = current,
                    "only anti-dependencies remain; critical path ends here"
                );
            }
            break;
        }
        candidates.sort_by_key(|(_, c)| c.end_time());

        let (dep_id, next) = candidates
            .iter()
            .rev()
            .find(|(_, c)| trace.command_predecessors(c.id).next().is_some())
            .or_else(|| candidates.last())
            .copied()
            .ok_or(AnalysisError::NoTerminalCommand {
                max_end: trace.max_end_time(),
            })?;

        if !visited.insert(next.id) {
            tracing::warn!(command = next.id, "dependency cycle on critical path; stopping");
            break;
        }
        path.dependencies.push(dep_id);
        path.commands.push(next.id);
        current = next.id;
    }

    tracing::debug!(
        terminal = terminal.id,
        length = path.len(),
        "critical path computed"
    );
    Ok(path)
}
