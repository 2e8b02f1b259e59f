//! `taskscope deps`: dependency expansion around one command.

use anyhow::{Context, Result};
use serde::Serialize;

use taskscope_analysis::TraceSession;
use taskscope_core::{CommandId, CommandType, DependencyKind};

use super::print_json;

#[derive(Debug, Serialize)]
pub struct DepsReport {
    pub root: CommandId,
    pub depth: u32,
    pub types: String,
    pub commands: Vec<CommandId>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Serialize)]
pub struct Edge {
    pub origin: CommandId,
    pub target: CommandId,
    pub kind: DependencyKind,
}

pub fn expand(
    session: &mut TraceSession,
    root: CommandId,
    depth: u32,
    types: CommandType,
) -> Result<DepsReport> {
    let expansion = session
        .expand(root, depth, types)
        .with_context(|| format!("expanding dependencies of command {root}"))?
        .clone();
    session.dismiss_expansion();

    let trace = session.trace();
    let edges = expansion
        .dependencies
        .iter()
        .filter_map(|&id| trace.command_dependency(id))
        .map(|dep| Edge {
            origin: dep.origin,
            target: dep.target,
            kind: dep.kind,
        })
        .collect();

    Ok(DepsReport {
        root,
        depth,
        types: types.to_string(),
        commands: expansion.commands.into_iter().collect(),
        edges,
    })
}

pub fn run(
    session: &mut TraceSession,
    root: CommandId,
    depth: u32,
    types: CommandType,
    json: bool,
) -> Result<()> {
    let report = expand(session, root, depth, types)?;
    if json {
        return print_json(&report);
    }

    println!(
        "C{root}: {} commands, {} edges within depth {depth} ({})",
        report.commands.len(),
        report.edges.len(),
        report.types
    );
    for edge in &report.edges {
        println!("  C{} -[{}]-> C{}", edge.origin, edge.kind, edge.target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::session_from;
    use taskscope_core::testing::task_chain;

    #[test]
    fn expansion_report_and_release() {
        let (_dir, _path, mut session) = session_from(&task_chain());
        let report = expand(&mut session, 3, 2, CommandType::TASK).unwrap();
        assert_eq!(report.commands, vec![1, 2, 3]);
        assert_eq!(report.edges.len(), 2);
        assert_eq!(report.types, "task");
        assert!(session.active_expansion().is_none());
    }

    #[test]
    fn zero_depth_rejected() {
        let (_dir, _path, mut session) = session_from(&task_chain());
        let err = expand(&mut session, 3, 0, CommandType::ALL).unwrap_err();
        assert!(format!("{err:#}").contains("depth must be at least 1"));
    }
}
