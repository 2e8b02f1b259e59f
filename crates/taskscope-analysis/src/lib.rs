//! Analyses over a built trace: temporal bucketing, dependency expansion,
//! critical path and idle gaps, tied together by [`TraceSession`].

pub mod critical_path;
pub mod error;
pub mod explore;
pub mod idle;
pub mod index;
pub mod session;

pub use critical_path::{critical_path, CriticalPath};
pub use error::{AnalysisError, IndexError, SessionError};
pub use explore::{expand, DependencyExplorer, Expansion};
pub use idle::{find_gaps, find_gaps_in, Gap};
pub use index::{Chunk, IndexConfig, TemporalIndex, DEFAULT_BUCKET_WIDTH};
pub use session::{LoadReport, SessionConfig, TraceSession};
