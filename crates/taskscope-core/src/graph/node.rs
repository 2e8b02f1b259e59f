//! Compute nodes of the distributed runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::Timestamp;

/// Dense compute node identifier, starting at 0.
pub type NodeId = u32;

/// A compute node, with the clock correction applied to its timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNode {
    pub id: NodeId,
    /// The node's reference time point as captured by the runtime.
    pub reference_time: u64,
    /// Offset added to the node's raw job timestamps to move them onto
    /// node 0's clock.
    pub clock_offset: Timestamp,
}

impl fmt::Display for ComputeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.id)
    }
}
