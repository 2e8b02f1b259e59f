//! Coarse progress reporting around the phases of a trace load.

use std::fmt;
use std::time::{Duration, Instant};

/// A discrete, timed phase of loading a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    ExtractEntities,
    Dependencies,
    TimeNormalization,
    DataDependencies,
    TemporalIndex,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::ExtractEntities,
        Phase::Dependencies,
        Phase::TimeNormalization,
        Phase::DataDependencies,
        Phase::TemporalIndex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::ExtractEntities => "extract_entities",
            Phase::Dependencies => "dependencies",
            Phase::TimeNormalization => "time_normalization",
            Phase::DataDependencies => "data_dependencies",
            Phase::TemporalIndex => "temporal_index",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives notifications around each load phase.
///
/// Observers only measure; they cannot change ordering or results.
pub trait PhaseObserver {
    fn phase_started(&mut self, _phase: Phase) {}

    fn phase_finished(&mut self, _phase: Phase, _elapsed: Duration) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {}

/// Observer recording the wall-clock duration of each finished phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    entries: Vec<(Phase, Duration)>,
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, phase: Phase) -> Option<Duration> {
        self.entries
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, d)| *d)
    }

    /// Finished phases in completion order.
    pub fn entries(&self) -> &[(Phase, Duration)] {
        &self.entries
    }

    pub fn total(&self) -> Duration {
        self.entries.iter().map(|(_, d)| *d).sum()
    }
}

impl PhaseObserver for PhaseTimings {
    fn phase_finished(&mut self, phase: Phase, elapsed: Duration) {
        self.entries.push((phase, elapsed));
    }
}

/// Run `f` as `phase`, notifying `observer` before and after.
pub fn observe_phase<T>(
    observer: &mut dyn PhaseObserver,
    phase: Phase,
    f: impl FnOnce() -> T,
) -> T {
    let _span = tracing::info_span!("phase", name = phase.name()).entered();
    observer.phase_started(phase);
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    tracing::debug!(phase = phase.name(), elapsed_us = elapsed.as_micros() as u64, "phase finished");
    observer.phase_finished(phase, elapsed);
    out
}
