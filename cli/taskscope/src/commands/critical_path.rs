//! `taskscope critical-path`.

use anyhow::{Context, Result};
use serde::Serialize;

use taskscope_analysis::TraceSession;
use taskscope_core::{CommandId, CommandKind, DependencyKind, NodeId, Timestamp};

use super::print_json;

/// One command on the path, with the edge that led to it.
#[derive(Debug, Serialize)]
pub struct PathStep {
    pub command: CommandId,
    pub node: NodeId,
    pub kind: CommandKind,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Kind of the edge from the previous step, absent on the first step.
    pub via: Option<DependencyKind>,
}

/// Steps from terminal to source, or source to terminal with `reverse`.
pub fn steps(session: &TraceSession, reverse: bool) -> Result<Vec<PathStep>> {
    let path = session.critical_path().context("computing critical path")?;
    let trace = session.trace();
    let min = trace.min_start_time();

    let mut steps = Vec::with_capacity(path.commands.len());
    for (i, &id) in path.commands.iter().enumerate() {
        let command = trace
            .get_command(id)
            .with_context(|| format!("critical path names unknown command {id}"))?;
        let via = i
            .checked_sub(1)
            .and_then(|prev| path.dependencies.get(prev))
            .and_then(|&dep| trace.command_dependency(dep))
            .map(|dep| dep.kind);
        steps.push(PathStep {
            command: id,
            node: command.node,
            kind: command.kind,
            start: command.start_time() - min,
            end: command.end_time() - min,
            via,
        });
    }

    if reverse {
        // Edges belong to the later step once the order flips.
        let vias: Vec<_> = steps.iter().map(|s| s.via).collect();
        steps.reverse();
        let flipped = [None].into_iter().chain(vias.into_iter().skip(1).rev());
        for (step, via) in steps.iter_mut().zip(flipped) {
            step.via = via;
        }
    }
    Ok(steps)
}

pub fn run(session: &TraceSession, reverse: bool, json: bool) -> Result<()> {
    let steps = steps(session, reverse)?;
    if json {
        return print_json(&steps);
    }

    println!("Critical path: {} commands", steps.len());
    for step in &steps {
        let via = step.via.map(|k| format!(" [{k}]")).unwrap_or_default();
        println!(
            "  C{:<8} N{:<4} {:<10} {:>12} .. {:<12}{via}",
            step.command, step.node, step.kind.name(), step.start, step.end
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::session_from;
    use taskscope_core::testing::task_chain;

    #[test]
    fn steps_terminal_first() {
        let (_dir, _path, session) = session_from(&task_chain());
        let steps = steps(&session, false).unwrap();
        let ids: Vec<_> = steps.iter().map(|s| s.command).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(steps[0].via, None);
        assert_eq!(steps[1].via, Some(DependencyKind::True));
        assert_eq!(steps[0].end, 30);
    }

    #[test]
    fn reversed_steps_source_first() {
        let (_dir, _path, session) = session_from(&task_chain());
        let steps = steps(&session, true).unwrap();
        let ids: Vec<_> = steps.iter().map(|s| s.command).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(steps[0].via, None);
        assert_eq!(steps[2].via, Some(DependencyKind::True));
    }
}
