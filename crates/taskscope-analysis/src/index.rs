//! Temporal index: fixed-width buckets over the normalized time axis.
//!
//! Every command lives in exactly one bucket, the one holding its midpoint
//! (its *home*). Every bucket its span touches records a back-reference to
//! that home, so a query for a time window also finds commands that reach
//! into the window from elsewhere.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use taskscope_core::{Command, CommandId, Timestamp, Trace};

use crate::error::IndexError;

/// Default bucket width in trace time units.
pub const DEFAULT_BUCKET_WIDTH: Timestamp = 500_000;

type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub bucket_width: Timestamp,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bucket_width: DEFAULT_BUCKET_WIDTH,
        }
    }
}

/// One bucket of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    start: Timestamp,
    end: Timestamp,
    commands: Vec<CommandId>,
    overlapping: BTreeSet<usize>,
}

impl Chunk {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start of the bucket, relative to the trace's minimum start time.
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Exclusive end of the bucket, relative to the trace's minimum start time.
    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Commands whose midpoint falls in this bucket, in assignment order.
    pub fn commands(&self) -> &[CommandId] {
        &self.commands
    }

    /// Home buckets of every command whose span touches this bucket.
    pub fn overlapping(&self) -> &BTreeSet<usize> {
        &self.overlapping
    }
}

#[derive(Debug, Clone)]
pub struct TemporalIndex {
    duration: Timestamp,
    min_start: Timestamp,
    bucket_width: Timestamp,
    chunks: Vec<Chunk>,
}

impl TemporalIndex {
    /// Create an empty index covering `[0, duration]`.
    ///
    /// There are `ceil(duration / bucket_width)` buckets, and never fewer
    /// than one.
    pub fn new(duration: Timestamp, min_start: Timestamp, bucket_width: Timestamp) -> Result<Self> {
        if bucket_width <= 0 {
            return Err(IndexError::InvalidArgument(format!(
                "bucket width must be positive, got {bucket_width}"
            )));
        }
        if duration < 0 {
            return Err(IndexError::InvalidArgument(format!(
                "duration must not be negative, got {duration}"
            )));
        }

        // Both operands are non-negative here.
        let count = (duration as u64).div_ceil(bucket_width as u64).max(1);
        let count = usize::try_from(count).map_err(|_| {
            IndexError::InvalidArgument(format!(
                "bucket width {bucket_width} yields too many buckets for duration {duration}"
            ))
        })?;
        let chunks = (0..count)
            .map(|index| {
                let start = index as Timestamp * bucket_width;
                Chunk {
                    index,
                    start,
                    end: start.saturating_add(bucket_width),
                    commands: Vec::new(),
                    overlapping: BTreeSet::new(),
                }
            })
            .collect();

        Ok(Self {
            duration,
            min_start,
            bucket_width,
            chunks,
        })
    }

    /// Build an index over `trace` and assign every command to it.
    pub fn from_trace(trace: &Trace, config: &IndexConfig) -> Result<Self> {
        let mut index = Self::new(trace.duration(), trace.min_start_time(), config.bucket_width)?;
        for command in trace.commands() {
            index.assign(command)?;
        }
        tracing::debug!(
            buckets = index.len(),
            bucket_width = index.bucket_width,
            commands = trace.command_count(),
            "temporal index built"
        );
        Ok(index)
    }

    pub fn duration(&self) -> Timestamp {
        self.duration
    }

    pub fn min_start(&self) -> Timestamp {
        self.min_start
    }

    pub fn bucket_width(&self) -> Timestamp {
        self.bucket_width
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn all_chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Bucket holding relative time `t`.
    ///
    /// `t == duration` maps to the last bucket, so the end of the trace is
    /// always addressable.
    pub fn bucket_index_for_time(&self, t: Timestamp) -> Result<usize> {
        if t < 0 || t > self.duration {
            return Err(IndexError::OutOfRangeTime {
                time: t,
                duration: self.duration,
            });
        }
        Ok(((t / self.bucket_width) as usize).min(self.chunks.len() - 1))
    }

    /// Place `command` in its home bucket and register the home on every
    /// bucket its span touches.
    pub fn assign(&mut self, command: &Command) -> Result<()> {
        let home = self.bucket_index_for_time(command.midpoint() - self.min_start)?;
        let first = self.bucket_index_for_time(command.start_time() - self.min_start)?;
        let last = self.bucket_index_for_time(command.end_time() - self.min_start)?;

        self.chunks[home].commands.push(command.id);
        for chunk in &mut self.chunks[first..=last] {
            chunk.overlapping.insert(home);
        }
        Ok(())
    }

    /// Buckets relevant to the window `[center - radius, center + radius]`.
    ///
    /// The result holds the buckets the window covers plus every bucket
    /// those reference as the home of a command reaching into them.
    pub fn visible_set(&self, center: Timestamp, radius: Timestamp) -> Result<BTreeSet<usize>> {
        if radius < 0 {
            return Err(IndexError::InvalidArgument(format!(
                "radius must not be negative, got {radius}"
            )));
        }
        self.bucket_index_for_time(center)?;

        let first = self.bucket_index_for_time(center.saturating_sub(radius).max(0))?;
        let last = self.bucket_index_for_time(center.saturating_add(radius).min(self.duration))?;

        let mut visible = BTreeSet::new();
        for chunk in &self.chunks[first..=last] {
            visible.insert(chunk.index);
            visible.extend(chunk.overlapping.iter().copied());
        }
        Ok(visible)
    }

    /// Commands homed in the buckets of [`TemporalIndex::visible_set`], in
    /// bucket order.
    pub fn visible_commands(&self, center: Timestamp, radius: Timestamp) -> Result<Vec<CommandId>> {
        let visible = self.visible_set(center, radius)?;
        Ok(visible
            .into_iter()
            .filter_map(|i| self.chunks.get(i))
            .flat_map(|chunk| chunk.commands.iter().copied())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskscope_core::build;
    use taskscope_core::testing::{task_command, PayloadBuilder};

    /// Trace with task commands on node 0 at the given raw spans.
    fn trace_with(spans: &[(i64, i64)]) -> Trace {
        let mut payload = PayloadBuilder::node(0, 1000);
        for (i, &(start, end)) in spans.iter().enumerate() {
            payload = payload.timed(task_command(i as u64 + 1, 0, &[]), start, end);
        }
        build(&[payload.build()]).unwrap()
    }

    fn config(bucket_width: Timestamp) -> IndexConfig {
        IndexConfig { bucket_width }
    }

    #[test]
    fn bucket_count_rounds_up() {
        assert_eq!(TemporalIndex::new(1000, 0, 100).unwrap().len(), 10);
        assert_eq!(TemporalIndex::new(1001, 0, 100).unwrap().len(), 11);
        assert_eq!(TemporalIndex::new(0, 0, 100).unwrap().len(), 1);
    }

    #[test]
    fn huge_bucket_width_is_a_single_bucket() {
        let index = TemporalIndex::new(1000, 0, Timestamp::MAX).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.chunk(0).unwrap().end(), Timestamp::MAX);
        assert_eq!(index.bucket_index_for_time(1000).unwrap(), 0);

        let index = TemporalIndex::new(Timestamp::MAX, 0, Timestamp::MAX - 1).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.chunk(1).unwrap().end(), Timestamp::MAX);
    }

    #[test]
    fn invalid_width_rejected() {
        assert!(matches!(
            TemporalIndex::new(1000, 0, 0),
            Err(IndexError::InvalidArgument(_))
        ));
        assert!(matches!(
            TemporalIndex::new(1000, 0, -5),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn bucket_index_bounds() {
        let index = TemporalIndex::new(1000, 0, 100).unwrap();
        assert_eq!(index.bucket_index_for_time(0).unwrap(), 0);
        assert_eq!(index.bucket_index_for_time(99).unwrap(), 0);
        assert_eq!(index.bucket_index_for_time(100).unwrap(), 1);
        assert_eq!(index.bucket_index_for_time(1000).unwrap(), 9);
        assert_eq!(
            index.bucket_index_for_time(1001),
            Err(IndexError::OutOfRangeTime {
                time: 1001,
                duration: 1000
            })
        );
        assert!(index.bucket_index_for_time(-1).is_err());
    }

    #[test]
    fn long_command_is_referenced_from_every_bucket_it_spans() {
        // Command 1 spans 0..1000 (home bucket 5); command 2 pins the end.
        let trace = trace_with(&[(0, 1000), (950, 1000)]);
        let index = TemporalIndex::from_trace(&trace, &config(100)).unwrap();

        assert_eq!(index.chunk(5).unwrap().commands(), &[1]);
        assert_eq!(index.chunk(9).unwrap().commands(), &[2]);
        for chunk in index.all_chunks() {
            assert!(chunk.overlapping().contains(&5), "bucket {}", chunk.index());
        }
        assert!(index.chunk(9).unwrap().overlapping().contains(&9));
        assert!(!index.chunk(0).unwrap().overlapping().contains(&9));
    }

    #[test]
    fn times_are_relative_to_min_start() {
        let trace = trace_with(&[(5000, 5100), (5900, 6000)]);
        let index = TemporalIndex::from_trace(&trace, &config(100)).unwrap();
        assert_eq!(index.min_start(), 5000);
        assert_eq!(index.len(), 10);
        assert_eq!(index.chunk(0).unwrap().commands(), &[1]);
        assert_eq!(index.chunk(9).unwrap().commands(), &[2]);
    }

    #[test]
    fn visible_set_includes_overlap_homes() {
        let trace = trace_with(&[(0, 1000), (100, 150), (800, 850)]);
        let index = TemporalIndex::from_trace(&trace, &config(100)).unwrap();

        let visible = index.visible_set(120, 10).unwrap();
        assert_eq!(visible, BTreeSet::from([1, 5]));

        let commands = index.visible_commands(120, 10).unwrap();
        assert_eq!(commands, vec![2, 1]);
    }

    #[test]
    fn visible_set_clamps_window() {
        let trace = trace_with(&[(0, 50), (950, 1000)]);
        let index = TemporalIndex::from_trace(&trace, &config(100)).unwrap();
        let visible = index.visible_set(0, 5_000).unwrap();
        assert_eq!(visible.len(), index.len());
        assert_eq!(index.visible_set(1000, 0).unwrap(), BTreeSet::from([9]));
    }

    #[test]
    fn visible_set_rejects_bad_arguments() {
        let index = TemporalIndex::new(1000, 0, 100).unwrap();
        assert!(matches!(
            index.visible_set(10, -1),
            Err(IndexError::InvalidArgument(_))
        ));
        assert!(matches!(
            index.visible_set(2000, 10),
            Err(IndexError::OutOfRangeTime { .. })
        ));
    }

    #[test]
    fn empty_trace_has_one_bucket() {
        let index = TemporalIndex::from_trace(&Trace::default(), &IndexConfig::default()).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.chunk(0).unwrap().commands().is_empty());
        assert_eq!(index.bucket_width(), DEFAULT_BUCKET_WIDTH);
    }
}
