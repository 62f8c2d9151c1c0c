//! A block store paired with its descriptor table

use crate::descriptor::Descriptor;
use crate::descriptor_table::DescriptorTable;
use crate::error::StorageError;
use crate::file_io::{self, Resize};
use block_store::{BlockIndex, BlockStore};
use fs_types::{DescriptorId, FsConfig};
use std::collections::BTreeMap;

/// Storage for one filesystem instance
///
/// Owns every block and every descriptor. All byte-level access goes through
/// descriptor ids so callers never hold a descriptor and the store at once.
#[derive(Debug, Clone)]
pub struct Volume {
    blocks: BlockStore,
    descriptors: DescriptorTable,
}

impl Volume {
    /// Creates an empty volume sized by `config`
    pub fn new(config: &FsConfig) -> Self {
        Self {
            blocks: BlockStore::new(config.max_blocks, config.block_size),
            descriptors: DescriptorTable::new(config.max_descriptors),
        }
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn descriptor(&self, id: DescriptorId) -> Result<&Descriptor, StorageError> {
        self.descriptors.get(id)
    }

    pub fn descriptor_mut(&mut self, id: DescriptorId) -> Result<&mut Descriptor, StorageError> {
        self.descriptors.get_mut(id)
    }

    /// Lowest free descriptor slot
    pub fn next_free_id(&self) -> Result<DescriptorId, StorageError> {
        self.descriptors
            .first_free()
            .ok_or(StorageError::DescriptorTableFull)
    }

    /// Installs a new descriptor
    pub fn install(&mut self, descriptor: Descriptor) -> Result<DescriptorId, StorageError> {
        self.descriptors.insert(descriptor)
    }

    /// Frees every block of a descriptor and clears its slot
    pub fn release(&mut self, id: DescriptorId) -> Result<Descriptor, StorageError> {
        let descriptor = self.descriptors.get_mut(id)?;
        let owned = descriptor.block_map().len();
        file_io::free_blocks(&mut self.blocks, descriptor, owned);
        self.descriptors
            .remove(id)
            .ok_or(StorageError::NoSuchDescriptor(id))
    }

    /// Reads from the descriptor's offset without moving it
    pub fn read(&self, id: DescriptorId, len: usize) -> Result<Vec<u8>, StorageError> {
        let descriptor = self.descriptors.get(id)?;
        Ok(file_io::read(&self.blocks, descriptor, len))
    }

    /// Reads from an explicit position
    pub fn read_at(&self, id: DescriptorId, pos: usize, len: usize) -> Result<Vec<u8>, StorageError> {
        let descriptor = self.descriptors.get(id)?;
        Ok(file_io::read_at(&self.blocks, descriptor, pos, len))
    }

    /// Writes at the descriptor's offset
    pub fn write(&mut self, id: DescriptorId, data: &[u8]) -> Result<usize, StorageError> {
        let descriptor = self.descriptors.get_mut(id)?;
        file_io::write(&mut self.blocks, descriptor, data)
    }

    /// Zero-fills from the descriptor's offset to its end
    pub fn fill_with_zeroes(&mut self, id: DescriptorId) -> Result<usize, StorageError> {
        let descriptor = self.descriptors.get(id)?;
        Ok(file_io::fill_with_zeroes(&mut self.blocks, descriptor))
    }

    pub fn seek(&mut self, id: DescriptorId, offset: usize) -> Result<(), StorageError> {
        self.descriptors.get_mut(id)?.set_offset(offset)
    }

    pub fn resize(&mut self, id: DescriptorId, size: usize) -> Result<Resize, StorageError> {
        let descriptor = self.descriptors.get_mut(id)?;
        file_io::resize(&mut self.blocks, descriptor, size)
    }

    /// Verifies the block allocation invariants
    ///
    /// Every live descriptor must own exactly the blocks its size implies,
    /// every owned block must be allocated in the store, no block may be
    /// owned twice, and no allocated block may be unowned.
    pub fn check_invariants(&self) -> Result<(), String> {
        let block_size = self.blocks.block_size();
        let mut owners: BTreeMap<BlockIndex, DescriptorId> = BTreeMap::new();

        for descriptor in self.descriptors.iter() {
            let expected = file_io::blocks_needed(descriptor.size(), block_size);
            if descriptor.block_map().len() != expected {
                return Err(format!(
                    "descriptor {} has {} blocks, size {} needs {}",
                    descriptor.id(),
                    descriptor.block_map().len(),
                    descriptor.size(),
                    expected
                ));
            }
            if descriptor.offset() > descriptor.size() {
                return Err(format!("descriptor {} offset past end", descriptor.id()));
            }
            for &block in descriptor.block_map() {
                if !self.blocks.is_allocated(block) {
                    return Err(format!(
                        "descriptor {} owns free block {}",
                        descriptor.id(),
                        block
                    ));
                }
                if let Some(other) = owners.insert(block, descriptor.id()) {
                    return Err(format!(
                        "block {} owned by descriptors {} and {}",
                        block,
                        other,
                        descriptor.id()
                    ));
                }
            }
        }

        let allocated = self.blocks.capacity() - self.blocks.free_count();
        if allocated != owners.len() {
            return Err(format!(
                "{} blocks allocated but {} owned",
                allocated,
                owners.len()
            ));
        }

        Ok(())
    }
}
