//! Typed dependency edges between tasks or between commands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of an edge in its trace's edge table.
pub type DependencyId = usize;

/// The reason one task or command depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Write-after-read.
    Anti,
    /// Ordering only, no data flows.
    Order,
    /// Read-after-write.
    True,
    /// A push feeding an await-push; inferred, never recorded.
    Data,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Anti => write!(f, "anti-dep"),
            DependencyKind::Order => write!(f, "order-dep"),
            DependencyKind::True => write!(f, "true-dep"),
            DependencyKind::Data => write!(f, "data-dep"),
        }
    }
}

/// A directed dependency: `origin` depends on `target`.
///
/// The origin is the dependent side and, except for data dependencies, is
/// chronologically at or after the target. Every edge is listed in the
/// origin's predecessors and in the target's successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency<I> {
    pub origin: I,
    pub target: I,
    pub kind: DependencyKind,
}

impl<I: Copy + PartialEq> Dependency<I> {
    pub fn new(origin: I, target: I, kind: DependencyKind) -> Self {
        Self {
            origin,
            target,
            kind,
        }
    }

    /// The endpoint opposite `id`, or `None` if `id` is not an endpoint.
    pub fn other(&self, id: I) -> Option<I> {
        if self.origin == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.origin)
        } else {
            None
        }
    }
}

impl<I: fmt::Display> fmt::Display for Dependency<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.origin, self.kind, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_endpoint() {
        let dep = Dependency::new(3u64, 1u64, DependencyKind::True);
        assert_eq!(dep.other(3), Some(1));
        assert_eq!(dep.other(1), Some(3));
        assert_eq!(dep.other(2), None);
    }

    #[test]
    fn display() {
        let dep = Dependency::new(3u64, 1u64, DependencyKind::Data);
        assert_eq!(dep.to_string(), "3 -[data-dep]-> 1");
    }
}
