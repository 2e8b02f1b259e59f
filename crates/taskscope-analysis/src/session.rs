//! A loaded trace together with everything derived from it.
//!
//! A [`TraceSession`] is built once per trace load. It owns the trace, its
//! temporal index, the memoized critical path and the dependency explorer.
//! Loading another trace means building another session; nothing derived
//! from the old trace survives the swap.

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use taskscope_core::observer::observe_phase;
use taskscope_core::{
    BuildOptions, Command, CommandId, CommandType, Phase, PhaseObserver, PhaseTimings, RawPayload,
    Timestamp, Trace, TraceBuilder,
};

use crate::critical_path::{critical_path, CriticalPath};
use crate::error::SessionError;
use crate::explore::{DependencyExplorer, Expansion};
use crate::idle::{find_gaps, Gap};
use crate::index::{IndexConfig, TemporalIndex};

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub index: IndexConfig,
    pub build: BuildOptions,
}

impl SessionConfig {
    pub fn with_bucket_width(mut self, bucket_width: Timestamp) -> Self {
        self.index.bucket_width = bucket_width;
        self
    }

    pub fn with_build_options(mut self, build: BuildOptions) -> Self {
        self.build = build;
        self
    }
}

/// Summary of a session load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub payloads: usize,
    pub nodes: usize,
    pub tasks: usize,
    pub commands: usize,
    pub buffers: usize,
    pub dependencies: usize,
    pub chunks: usize,
    pub timings: PhaseTimings,
    pub elapsed: Duration,
}

/// Forwards to the caller's observer while recording timings for the report.
struct Recording<'a> {
    inner: &'a mut dyn PhaseObserver,
    timings: PhaseTimings,
}

impl PhaseObserver for Recording<'_> {
    fn phase_started(&mut self, phase: Phase) {
        self.inner.phase_started(phase);
    }

    fn phase_finished(&mut self, phase: Phase, elapsed: Duration) {
        self.timings.phase_finished(phase, elapsed);
        self.inner.phase_finished(phase, elapsed);
    }
}

#[derive(Debug)]
pub struct TraceSession {
    trace: Trace,
    index: TemporalIndex,
    critical_path: OnceCell<CriticalPath>,
    explorer: DependencyExplorer,
    report: LoadReport,
}

impl TraceSession {
    /// Build the trace from `payloads` and index it.
    pub fn load(
        payloads: &[RawPayload],
        config: &SessionConfig,
        observer: &mut dyn PhaseObserver,
    ) -> Result<Self> {
        let started = Instant::now();
        let _span = tracing::info_span!("load", payloads = payloads.len()).entered();

        let mut recording = Recording {
            inner: observer,
            timings: PhaseTimings::new(),
        };
        let trace = TraceBuilder::new(config.build).build_observed(payloads, &mut recording)?;
        let index = observe_phase(&mut recording, Phase::TemporalIndex, || {
            TemporalIndex::from_trace(&trace, &config.index)
        })?;

        let report = LoadReport {
            payloads: payloads.len(),
            nodes: trace.node_count(),
            tasks: trace.task_count(),
            commands: trace.command_count(),
            buffers: trace.buffer_count(),
            dependencies: trace.dependency_count(),
            chunks: index.len(),
            timings: recording.timings,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            commands = report.commands,
            chunks = report.chunks,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "session loaded"
        );

        Ok(Self {
            trace,
            index,
            critical_path: OnceCell::new(),
            explorer: DependencyExplorer::new(),
            report,
        })
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn index(&self) -> &TemporalIndex {
        &self.index
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Start a dependency expansion around `root`.
    ///
    /// Fails with an invalid-state error while a previous expansion has not
    /// been dismissed.
    pub fn expand(&mut self, root: CommandId, depth: u32, mask: CommandType) -> Result<&Expansion> {
        Ok(self.explorer.expand(&self.trace, root, depth, mask)?)
    }

    pub fn dismiss_expansion(&mut self) -> Option<Expansion> {
        self.explorer.dismiss()
    }

    pub fn active_expansion(&self) -> Option<&Expansion> {
        self.explorer.active()
    }

    /// The critical path, computed on first use.
    pub fn critical_path(&self) -> Result<&CriticalPath> {
        if let Some(path) = self.critical_path.get() {
            return Ok(path);
        }
        let path = critical_path(&self.trace)?;
        Ok(self.critical_path.get_or_init(|| path))
    }

    pub fn find_gaps(&self, min_gap_length: Timestamp, task_only: bool) -> Vec<Gap> {
        find_gaps(&self.trace, min_gap_length, task_only)
    }

    /// Chunk indices visible around `center` (relative to the trace start).
    pub fn visible_set(&self, center: Timestamp, radius: Timestamp) -> Result<BTreeSet<usize>> {
        Ok(self.index.visible_set(center, radius)?)
    }

    pub fn visible_commands(&self, center: Timestamp, radius: Timestamp) -> Result<Vec<&Command>> {
        let ids = self.index.visible_commands(center, radius)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.trace.get_command(id))
            .collect())
    }
}
