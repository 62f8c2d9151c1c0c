//! Block-level file I/O
//!
//! Translates a descriptor's logical byte range into block-store accesses.
//! Nothing here cares whether the descriptor is a file, a directory or a
//! symlink: all three are byte content addressed by offset.

use crate::descriptor::Descriptor;
use crate::error::StorageError;
use block_store::BlockStore;

/// Result of a [`resize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resize {
    /// New size equals old size; nothing was touched
    Unchanged,
    /// Size decreased; `freed` blocks were returned to the store
    Shrunk { freed: usize },
    /// Size increased; `allocated` blocks were taken from the store
    Grown { allocated: usize },
}

/// Number of blocks needed to hold `size` bytes
pub fn blocks_needed(size: usize, block_size: usize) -> usize {
    size.div_ceil(block_size)
}

fn byte_at(store: &BlockStore, descriptor: &Descriptor, pos: usize) -> u8 {
    let block_size = store.block_size();
    match descriptor.block_map.get(pos / block_size) {
        Some(&block) => store.read_byte(block, pos % block_size),
        None => 0,
    }
}

fn put_byte(store: &mut BlockStore, descriptor: &Descriptor, pos: usize, value: u8) {
    let block_size = store.block_size();
    if let Some(&block) = descriptor.block_map.get(pos / block_size) {
        store.write_byte(block, pos % block_size, value);
    }
}

/// Reads up to `len` bytes from the descriptor's offset
///
/// The read stops at the end of the file and does not move the offset.
pub fn read(store: &BlockStore, descriptor: &Descriptor, len: usize) -> Vec<u8> {
    read_at(store, descriptor, descriptor.offset(), len)
}

/// Reads up to `len` bytes starting at `pos`, clamped to the file size
pub fn read_at(store: &BlockStore, descriptor: &Descriptor, pos: usize, len: usize) -> Vec<u8> {
    let end = pos.saturating_add(len).min(descriptor.size());
    (pos..end)
        .map(|i| byte_at(store, descriptor, i))
        .collect()
}

/// Writes `data` at the descriptor's offset and advances the offset
///
/// Files never grow on write: if the data does not fit before the end of the
/// file nothing is written and `OutOfSpace` is returned.
pub fn write(
    store: &mut BlockStore,
    descriptor: &mut Descriptor,
    data: &[u8],
) -> Result<usize, StorageError> {
    let from = descriptor.offset();
    let to = from + data.len();
    if to > descriptor.size() {
        return Err(StorageError::OutOfSpace(format!(
            "{} bytes at offset {} exceed size {}",
            data.len(),
            from,
            descriptor.size()
        )));
    }

    for (i, &byte) in data.iter().enumerate() {
        put_byte(store, descriptor, from + i, byte);
    }
    descriptor.set_offset(to)?;
    Ok(data.len())
}

/// Zero-fills `[offset, size)`
///
/// Returns the number of bytes cleared.
pub fn fill_with_zeroes(store: &mut BlockStore, descriptor: &Descriptor) -> usize {
    let (from, to) = (descriptor.offset(), descriptor.size());
    for pos in from..to {
        put_byte(store, descriptor, pos, 0);
    }
    to.saturating_sub(from)
}

/// Appends up to `count` blocks to the descriptor's block map
pub fn allocate_blocks(store: &mut BlockStore, descriptor: &mut Descriptor, count: usize) -> usize {
    store.allocate(count, &mut descriptor.block_map)
}

/// Releases the last `count` blocks of the descriptor's block map
pub fn free_blocks(store: &mut BlockStore, descriptor: &mut Descriptor, count: usize) -> usize {
    store.free(&mut descriptor.block_map, count)
}

/// Changes the logical size, keeping the block map in step
///
/// Shrinking frees surplus blocks and resets the offset to 0. Growing
/// allocates the missing blocks and zero-fills the newly exposed bytes,
/// leaving the offset where it was. A grow the store cannot satisfy in full
/// is rolled back.
pub fn resize(
    store: &mut BlockStore,
    descriptor: &mut Descriptor,
    new_size: usize,
) -> Result<Resize, StorageError> {
    let old_size = descriptor.size();
    if new_size == old_size {
        return Ok(Resize::Unchanged);
    }

    let current_blocks = descriptor.block_map.len();
    let needed_blocks = blocks_needed(new_size, store.block_size());

    if new_size < old_size {
        let freed = free_blocks(store, descriptor, current_blocks.saturating_sub(needed_blocks));
        descriptor.set_size(new_size);
        descriptor.set_offset(0)?;
        return Ok(Resize::Shrunk { freed });
    }

    let missing = needed_blocks.saturating_sub(current_blocks);
    let allocated = allocate_blocks(store, descriptor, missing);
    if allocated < missing {
        free_blocks(store, descriptor, allocated);
        return Err(StorageError::OutOfSpace(format!(
            "needed {} blocks, only {} free",
            missing, allocated
        )));
    }

    descriptor.set_size(new_size);

    // Bytes past the old end may still hold data from before a shrink.
    let offset = descriptor.offset();
    descriptor.set_offset(old_size)?;
    fill_with_zeroes(store, descriptor);
    descriptor.set_offset(offset)?;

    Ok(Resize::Grown { allocated })
}
