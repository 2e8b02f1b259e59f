//! `taskscope visible`: what the temporal index shows around a time.

use anyhow::{Context, Result};
use serde::Serialize;

use taskscope_analysis::TraceSession;
use taskscope_core::{CommandId, Timestamp};

use super::print_json;

#[derive(Debug, Serialize)]
pub struct Visible {
    pub time: Timestamp,
    pub radius: Timestamp,
    pub chunks: Vec<usize>,
    pub commands: Vec<CommandId>,
}

pub fn query(session: &TraceSession, time: Timestamp, radius: Timestamp) -> Result<Visible> {
    let chunks = session
        .visible_set(time, radius)
        .with_context(|| format!("querying vicinity of {time}"))?;
    let commands = session
        .visible_commands(time, radius)?
        .iter()
        .map(|c| c.id)
        .collect();
    Ok(Visible {
        time,
        radius,
        chunks: chunks.into_iter().collect(),
        commands,
    })
}

pub fn run(session: &TraceSession, time: Timestamp, radius: Timestamp, json: bool) -> Result<()> {
    let visible = query(session, time, radius)?;
    if json {
        return print_json(&visible);
    }

    let chunks: Vec<String> = visible.chunks.iter().map(usize::to_string).collect();
    println!(
        "{} chunks visible around {time} (radius {radius}): {}",
        visible.chunks.len(),
        chunks.join(", ")
    );
    println!("{} commands", visible.commands.len());
    Ok(())
}
