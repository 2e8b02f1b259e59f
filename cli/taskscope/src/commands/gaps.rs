//! `taskscope gaps`: idle intervals per compute node.

use anyhow::Result;

use taskscope_analysis::{Gap, TraceSession};
use taskscope_core::Timestamp;

use super::print_json;

pub fn run(session: &TraceSession, min_gap: Timestamp, task_only: bool, json: bool) -> Result<()> {
    let gaps = session.find_gaps(min_gap, task_only);
    if json {
        return print_json(&gaps);
    }

    let activity = if task_only { "task" } else { "command" };
    println!(
        "{} idle gaps of at least {min_gap} with no {activity} running",
        gaps.len()
    );
    let mut current = None;
    for Gap { node, start, end } in &gaps {
        if current != Some(*node) {
            println!("N{node}:");
            current = Some(*node);
        }
        println!("  {start:>12} .. {end:<12} ({})", end - start);
    }
    Ok(())
}
