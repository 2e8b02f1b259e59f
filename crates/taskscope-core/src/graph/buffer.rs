//! Buffers and the accesses commands make to them.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::geometry::{Box3, Point3};

/// Buffer identifier.
pub type BufferId = u64;

/// How a command touches a buffer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    DiscardWrite,
    DiscardReadWrite,
    Atomic,
}

/// A buffer, sized to cover every region any access has referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    /// Per-axis maximum end corner over all accesses.
    pub size: Point3,
}

impl Buffer {
    pub fn new(id: BufferId) -> Self {
        Self {
            id,
            size: Point3::ZERO,
        }
    }

    /// Grow the size so it covers `range`. Never shrinks.
    pub fn cover(&mut self, range: &Box3) {
        self.size = self.size.max(range.max);
    }
}

/// An access by a command to a region of a buffer.
///
/// Equality and hashing consider only the buffer and the region: two
/// accesses to the same region with different modes are the same key. This
/// is what pairs a push with its await-push.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferAccess {
    pub buffer: BufferId,
    pub mode: AccessMode,
    pub range: Box3,
}

impl BufferAccess {
    pub fn new(buffer: BufferId, mode: AccessMode, range: Box3) -> Self {
        Self {
            buffer,
            mode,
            range,
        }
    }
}

impl PartialEq for BufferAccess {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer && self.range == other.range
    }
}

impl Eq for BufferAccess {}

impl Hash for BufferAccess {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.buffer.hash(state);
        self.range.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn region(end: u64) -> Box3 {
        Box3::new(Point3::ZERO, Point3::new(end, end, end))
    }

    #[test]
    fn access_identity_ignores_mode() {
        let write = BufferAccess::new(7, AccessMode::Write, region(4));
        let read = BufferAccess::new(7, AccessMode::Read, region(4));
        assert_eq!(write, read);

        let mut keys = HashSet::new();
        keys.insert(write);
        assert!(keys.contains(&read));
    }

    #[test]
    fn access_identity_respects_buffer_and_range() {
        let a = BufferAccess::new(7, AccessMode::Write, region(4));
        assert_ne!(a, BufferAccess::new(8, AccessMode::Write, region(4)));
        assert_ne!(a, BufferAccess::new(7, AccessMode::Write, region(5)));
    }

    #[test]
    fn buffer_grows_monotonically() {
        let mut buffer = Buffer::new(1);
        buffer.cover(&Box3::new(Point3::ZERO, Point3::new(8, 1, 1)));
        buffer.cover(&Box3::new(Point3::new(2, 0, 0), Point3::new(4, 6, 1)));
        assert_eq!(buffer.size, Point3::new(8, 6, 1));
    }
}
