//! Descriptor (inode) records

use crate::error::StorageError;
use block_store::BlockIndex;
use fs_types::{DescriptorId, DescriptorKind};

/// Metadata for one filesystem object
///
/// The block map is the only record of which blocks hold this object's
/// bytes: `block_map[i]` holds logical bytes `[i * block_size, (i + 1) * block_size)`.
/// Size and block map change together, through [`crate::file_io::resize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    id: DescriptorId,
    kind: DescriptorKind,
    link_count: u32,
    size: usize,
    offset: usize,
    pub(crate) block_map: Vec<BlockIndex>,
    parent: DescriptorId,
}

impl Descriptor {
    /// Creates an empty descriptor with no links and no blocks
    pub fn new(id: DescriptorId, kind: DescriptorKind, parent: DescriptorId) -> Self {
        Self {
            id,
            kind,
            link_count: 0,
            size: 0,
            offset: 0,
            block_map: Vec::new(),
            parent,
        }
    }

    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn link_count(&self) -> u32 {
        self.link_count
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn block_map(&self) -> &[BlockIndex] {
        &self.block_map
    }

    /// Id of the containing directory; the root is its own parent
    pub fn parent(&self) -> DescriptorId {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent == self.id
    }

    /// Points the descriptor at another containing directory
    pub fn set_parent(&mut self, parent: DescriptorId) {
        self.parent = parent;
    }

    /// Moves the seek position
    ///
    /// Positions past the end are rejected and leave the offset unchanged.
    pub fn set_offset(&mut self, offset: usize) -> Result<(), StorageError> {
        if offset > self.size {
            return Err(StorageError::OffsetOutOfBounds {
                offset,
                size: self.size,
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
        if self.offset > size {
            self.offset = 0;
        }
    }

    pub fn increment_links(&mut self) -> u32 {
        self.link_count += 1;
        self.link_count
    }

    /// Drops one link and returns how many remain
    pub fn decrement_links(&mut self) -> u32 {
        self.link_count = self.link_count.saturating_sub(1);
        self.link_count
    }
}
