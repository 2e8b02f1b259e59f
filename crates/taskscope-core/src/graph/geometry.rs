//! Three-dimensional integer points and half-open boxes.
//!
//! Execution ranges and buffer access regions are both expressed as boxes
//! over a 3D index space.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point (or extent) in a 3D index space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point3 {
    pub x: u64,
    pub y: u64,
    pub z: u64,
}

impl Point3 {
    /// The origin.
    pub const ZERO: Point3 = Point3 { x: 0, y: 0, z: 0 };

    pub fn new(x: u64, y: u64, z: u64) -> Self {
        Self { x, y, z }
    }

    /// Per-axis maximum of two points.
    pub fn max(self, other: Point3) -> Point3 {
        Point3 {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }
}

impl From<[u64; 3]> for Point3 {
    fn from(v: [u64; 3]) -> Self {
        Point3::new(v[0], v[1], v[2])
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// A half-open box `[min, max)` in a 3D index space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Box3 {
    pub min: Point3,
    pub max: Point3,
}

impl Box3 {
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }
}

impl fmt::Display for Box3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

/// The index space a command executes over.
pub type ExecutionRange = Box3;
