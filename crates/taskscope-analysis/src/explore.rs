//! Bounded-depth dependency expansion around a single command.

use std::collections::BTreeSet;

use taskscope_core::{CommandId, CommandType, DependencyId, Trace};

use crate::error::AnalysisError;

/// Commands and edges reached from a root command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub root: CommandId,
    pub depth: u32,
    pub mask: CommandType,
    /// Reached commands, including the root.
    pub commands: BTreeSet<CommandId>,
    /// Command dependency edges traversed.
    pub dependencies: BTreeSet<DependencyId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Predecessors,
    Successors,
}

/// Expand from `root` up to `depth` edges in each direction, following only
/// edges whose far endpoint's kind is in `mask`.
///
/// Predecessors and successors are walked as two independent breadth-first
/// frontiers.
pub fn expand(
    trace: &Trace,
    root: CommandId,
    depth: u32,
    mask: CommandType,
) -> Result<Expansion, AnalysisError> {
    if depth < 1 {
        return Err(AnalysisError::InvalidArgument(
            "expansion depth must be at least 1".to_string(),
        ));
    }
    if trace.get_command(root).is_none() {
        return Err(AnalysisError::UnknownCommand(root));
    }

    let mut expansion = Expansion {
        root,
        depth,
        mask,
        commands: BTreeSet::from([root]),
        dependencies: BTreeSet::new(),
    };
    walk(trace, &mut expansion, Direction::Predecessors);
    walk(trace, &mut expansion, Direction::Successors);

    tracing::debug!(
        command = root,
        depth,
        mask = %mask,
        commands = expansion.commands.len(),
        dependencies = expansion.dependencies.len(),
        "expanded dependencies"
    );
    Ok(expansion)
}

fn walk(trace: &Trace, expansion: &mut Expansion, direction: Direction) {
    let mut frontier = vec![expansion.root];
    for _ in 0..expansion.depth {
        let mut next = Vec::new();
        for &id in &frontier {
            let edges: Vec<_> = match direction {
                Direction::Predecessors => trace
                    .command_predecessors(id)
                    .map(|(dep_id, dep)| (dep_id, dep.target))
                    .collect(),
                Direction::Successors => trace
                    .command_successors(id)
                    .map(|(dep_id, dep)| (dep_id, dep.origin))
                    .collect(),
            };
            for (dep_id, other) in edges {
                let matches = trace
                    .get_command(other)
                    .is_some_and(|c| expansion.mask.matches(c.kind));
                if !matches || !expansion.dependencies.insert(dep_id) {
                    continue;
                }
                expansion.commands.insert(other);
                next.push(other);
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
}

/// Holds at most one live expansion at a time.
///
/// A new expansion can only start once the previous one was dismissed.
#[derive(Debug, Clone, Default)]
pub struct DependencyExplorer {
    active: Option<Expansion>,
}

impl DependencyExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Expansion> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn expand(
        &mut self,
        trace: &Trace,
        root: CommandId,
        depth: u32,
        mask: CommandType,
    ) -> Result<&Expansion, AnalysisError> {
        if let Some(active) = &self.active {
            return Err(AnalysisError::InvalidState(format!(
                "expansion of command {} is still active",
                active.root
            )));
        }
        Ok(self.active.insert(expand(trace, root, depth, mask)?))
    }

    /// Drop the live expansion, returning it.
    pub fn dismiss(&mut self) -> Option<Expansion> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskscope_core::testing::{command, task_chain, task_command, PayloadBuilder};
    use taskscope_core::{build, CommandKind, DependencyKind};

    #[test]
    fn chain_depth_two_reaches_both_predecessors() {
        let trace = build(&task_chain()).unwrap();
        let expansion = expand(&trace, 3, 2, CommandType::TASK).unwrap();
        assert_eq!(expansion.commands, BTreeSet::from([1, 2, 3]));
        assert_eq!(expansion.dependencies.len(), 2);
    }

    #[test]
    fn chain_depth_one_stops_at_direct_predecessor() {
        let trace = build(&task_chain()).unwrap();
        let expansion = expand(&trace, 3, 1, CommandType::TASK).unwrap();
        assert_eq!(expansion.commands, BTreeSet::from([2, 3]));
        assert_eq!(expansion.dependencies.len(), 1);
    }

    #[test]
    fn walks_both_directions_from_the_middle() {
        let trace = build(&task_chain()).unwrap();
        let expansion = expand(&trace, 2, 1, CommandType::ALL).unwrap();
        assert_eq!(expansion.commands, BTreeSet::from([1, 2, 3]));
        assert_eq!(expansion.dependencies.len(), 2);
    }

    #[test]
    fn mask_filters_far_endpoints() {
        let payloads = vec![PayloadBuilder::node(0, 1000)
            .timed(command(1, 0, CommandKind::Horizon), 0, 5)
            .timed(task_command(2, 0, &[]), 0, 5)
            .timed(
                task_command(3, 0, &[(1, DependencyKind::Order), (2, DependencyKind::True)]),
                5,
                10,
            )
            .build()];
        let trace = build(&payloads).unwrap();

        let tasks_only = expand(&trace, 3, 3, CommandType::TASK).unwrap();
        assert_eq!(tasks_only.commands, BTreeSet::from([2, 3]));

        let horizons = expand(&trace, 3, 3, CommandType::HORIZON).unwrap();
        assert_eq!(horizons.commands, BTreeSet::from([1, 3]));
    }

    #[test]
    fn diamond_edges_counted_once() {
        let payloads = vec![PayloadBuilder::node(0, 1000)
            .timed(task_command(1, 0, &[]), 0, 1)
            .timed(task_command(2, 0, &[(1, DependencyKind::True)]), 1, 2)
            .timed(task_command(3, 0, &[(1, DependencyKind::True)]), 1, 2)
            .timed(
                task_command(4, 0, &[(2, DependencyKind::True), (3, DependencyKind::True)]),
                2,
                3,
            )
            .build()];
        let trace = build(&payloads).unwrap();
        let expansion = expand(&trace, 4, 5, CommandType::ALL).unwrap();
        assert_eq!(expansion.commands, BTreeSet::from([1, 2, 3, 4]));
        assert_eq!(expansion.dependencies.len(), 4);
    }

    #[test]
    fn invalid_arguments() {
        let trace = build(&task_chain()).unwrap();
        assert!(matches!(
            expand(&trace, 3, 0, CommandType::ALL),
            Err(AnalysisError::InvalidArgument(_))
        ));
        assert_eq!(
            expand(&trace, 99, 1, CommandType::ALL),
            Err(AnalysisError::UnknownCommand(99))
        );
    }

    #[test]
    fn explorer_rejects_reentrant_expansion() {
        let trace = build(&task_chain()).unwrap();
        let mut explorer = DependencyExplorer::new();

        explorer.expand(&trace, 3, 1, CommandType::ALL).unwrap();
        assert!(explorer.is_active());
        assert!(matches!(
            explorer.expand(&trace, 2, 1, CommandType::ALL),
            Err(AnalysisError::InvalidState(_))
        ));
        assert_eq!(explorer.active().map(|e| e.root), Some(3));

        let dismissed = explorer.dismiss().unwrap();
        assert_eq!(dismissed.root, 3);
        assert!(!explorer.is_active());
        assert!(explorer.expand(&trace, 2, 1, CommandType::ALL).is_ok());
    }

    #[test]
    fn failed_expansion_leaves_explorer_idle() {
        let trace = build(&task_chain()).unwrap();
        let mut explorer = DependencyExplorer::new();
        assert!(explorer.expand(&trace, 42, 1, CommandType::ALL).is_err());
        assert!(!explorer.is_active());
    }
}
