//! Identifiers for filesystem entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Index of a descriptor (inode) in the descriptor table
///
/// Ids are assigned first-free by ascending index, so creation order is
/// deterministic for a given sequence of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DescriptorId(usize);

impl DescriptorId {
    /// Creates a descriptor id from a table index
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the table index
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle into the open-file table
///
/// Distinct from [`DescriptorId`]: several handles may name one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fd(usize);

impl Fd {
    /// Creates a handle from a table slot
    pub const fn new(slot: usize) -> Self {
        Self(slot)
    }

    /// Returns the table slot
    pub const fn slot(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd={}", self.0)
    }
}

/// Unique identifier for a filesystem instance
///
/// Used as the source of structured log entries so that events from several
/// instances living in one process can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsInstanceId(Uuid);

impl FsInstanceId {
    /// Creates a new random instance ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an instance ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FsInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FsInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fs({})", self.0)
    }
}
