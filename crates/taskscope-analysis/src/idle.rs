//! Idle intervals per compute node.

use std::collections::BTreeMap;

use serde::Serialize;

use taskscope_core::{Command, CommandKind, NodeId, Timestamp, Trace};

/// An interval `[start, end)` in which a node ran nothing, relative to the
/// trace's minimum start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub node: NodeId,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Gap {
    pub fn length(&self) -> Timestamp {
        self.end - self.start
    }
}

/// Find idle gaps of at least `min_gap_length` on every node of `trace`.
///
/// With `task_only`, only task commands count as activity, so the result
/// shows when no task was running rather than when no command was.
pub fn find_gaps(trace: &Trace, min_gap_length: Timestamp, task_only: bool) -> Vec<Gap> {
    let mut by_node = trace.commands_by_node();
    if task_only {
        for commands in by_node.values_mut() {
            commands.retain(|c| c.kind == CommandKind::Task);
        }
    }
    let gaps = find_gaps_in(&by_node, trace.min_start_time(), min_gap_length);
    tracing::debug!(
        nodes = by_node.len(),
        gaps = gaps.len(),
        min_gap_length,
        task_only,
        "idle gaps computed"
    );
    gaps
}

/// Gap search over per-node command lists sorted ascending by start time.
///
/// A node without commands is logged and skipped.
pub fn find_gaps_in(
    commands_by_node: &BTreeMap<NodeId, Vec<&Command>>,
    min_start: Timestamp,
    min_gap_length: Timestamp,
) -> Vec<Gap> {
    let mut gaps = Vec::new();
    for (&node, commands) in commands_by_node {
        let Some((first, rest)) = commands.split_first() else {
            tracing::error!(node, "compute node has no commands; skipping gap search");
            continue;
        };
        let mut last_end = first.end_time();
        for command in rest {
            let start = command.start_time();
            if start > last_end && start - last_end >= min_gap_length {
                gaps.push(Gap {
                    node,
                    start: last_end - min_start,
                    end: start - min_start,
                });
            }
            last_end = last_end.max(command.end_time());
        }
    }
    gaps
}
