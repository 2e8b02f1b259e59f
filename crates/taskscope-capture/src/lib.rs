//! Capture files: the on-disk form of the per-node payloads a run recorded.
//!
//! ## File Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ length: u32 (little-endian)  │  4 bytes
//! │ JSON payload                 │  `length` bytes
//! ├──────────────────────────────┤
//! │ length: u32 (little-endian)  │
//! │ JSON payload                 │
//! ├──────────────────────────────┤
//! │ ...                          │
//! └──────────────────────────────┘
//! ```
//!
//! One record per compute node session. A file may end only at a record
//! boundary.

mod format;

pub use format::{
    read_file, read_payloads, write_file, write_payloads, CaptureError, PayloadReader,
    MAX_RECORD_LEN,
};
