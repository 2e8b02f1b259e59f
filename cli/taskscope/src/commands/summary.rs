//! `taskscope summary`: provenance, counts and load timings.

use anyhow::Result;
use serde::Serialize;

use taskscope_analysis::TraceSession;
use taskscope_core::Timestamp;

use super::print_json;

#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub run_id: Option<&'a str>,
    pub executable: Option<&'a str>,
    pub arguments: Option<&'a str>,
    pub payloads: usize,
    pub nodes: usize,
    pub tasks: usize,
    pub commands: usize,
    pub buffers: usize,
    pub dependencies: usize,
    pub min_start: Timestamp,
    pub max_end: Timestamp,
    pub duration: Timestamp,
    pub chunks: usize,
    pub bucket_width: Timestamp,
    pub phases: Vec<PhaseTiming>,
    pub load_us: u64,
}

#[derive(Debug, Serialize)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub elapsed_us: u64,
}

pub fn summarize(session: &TraceSession) -> Summary<'_> {
    let trace = session.trace();
    let report = session.report();
    Summary {
        run_id: trace.run_id.as_deref(),
        executable: trace.executable_name.as_deref(),
        arguments: trace.executable_args.as_deref(),
        payloads: report.payloads,
        nodes: report.nodes,
        tasks: report.tasks,
        commands: report.commands,
        buffers: report.buffers,
        dependencies: report.dependencies,
        min_start: trace.min_start_time(),
        max_end: trace.max_end_time(),
        duration: trace.duration(),
        chunks: report.chunks,
        bucket_width: session.index().bucket_width(),
        phases: report
            .timings
            .entries()
            .iter()
            .map(|(phase, elapsed)| PhaseTiming {
                phase: phase.name(),
                elapsed_us: elapsed.as_micros() as u64,
            })
            .collect(),
        load_us: report.elapsed.as_micros() as u64,
    }
}

pub fn run(session: &TraceSession, json: bool) -> Result<()> {
    let summary = summarize(session);
    if json {
        return print_json(&summary);
    }

    println!("Run:          {}", summary.run_id.unwrap_or("-"));
    match (summary.executable, summary.arguments) {
        (Some(exe), Some(args)) => println!("Executable:   {exe} {args}"),
        (Some(exe), None) => println!("Executable:   {exe}"),
        _ => println!("Executable:   -"),
    }
    println!("Payloads:     {}", summary.payloads);
    println!("Nodes:        {}", summary.nodes);
    println!("Tasks:        {}", summary.tasks);
    println!("Commands:     {}", summary.commands);
    println!("Buffers:      {}", summary.buffers);
    println!("Dependencies: {}", summary.dependencies);
    println!(
        "Time:         {} .. {} (duration {})",
        summary.min_start, summary.max_end, summary.duration
    );
    println!(
        "Chunks:       {} x {}",
        summary.chunks, summary.bucket_width
    );
    println!();
    println!("--- Load phases ---");
    for timing in &summary.phases {
        println!("  {:<20} {:>10} us", timing.phase, timing.elapsed_us);
    }
    println!("  {:<20} {:>10} us", "total", summary.load_us);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::session_from;
    use taskscope_core::testing::skewed_clocks;

    #[test]
    fn summary_reflects_trace() {
        let (_dir, _path, session) = session_from(&skewed_clocks());
        let summary = summarize(&session);
        assert_eq!(summary.run_id, Some("run-1"));
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.commands, 3);
        assert_eq!(summary.min_start, 50);
        assert_eq!(summary.duration, 850);
        assert_eq!(summary.phases.len(), 5);
        assert_eq!(summary.phases[0].phase, "extract_entities");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["max_end"], 900);
    }
}
