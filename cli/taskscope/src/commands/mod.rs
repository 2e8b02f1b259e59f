//! CLI command implementations.

pub mod critical_path;
pub mod deps;
pub mod gaps;
pub mod summary;
pub mod visible;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use taskscope_analysis::{SessionConfig, TraceSession};
use taskscope_core::PhaseObserver;

/// Read the capture file at `trace` and load it into a session.
pub fn load_session(
    trace: &Path,
    config: &SessionConfig,
    observer: &mut dyn PhaseObserver,
) -> Result<TraceSession> {
    let payloads = taskscope_capture::read_file(trace)
        .with_context(|| format!("reading capture {}", trace.display()))?;
    TraceSession::load(&payloads, config, observer)
        .with_context(|| format!("loading {}", trace.display()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{out}");
    Ok(())
}
