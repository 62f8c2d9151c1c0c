//! # Block Store
//!
//! A fixed array of fixed-size byte blocks held entirely in memory.
//!
//! ## Design
//!
//! - Each slot is either free (`None`) or holds one zero-initialized [`Block`]
//! - Allocation scans slots by ascending index, so the same sequence of
//!   requests always yields the same indices
//! - The store never remembers who owns a block; callers keep the ordered
//!   list of indices (a descriptor's block map) and hand it back when freeing
//! - Byte access outside a block, or to a free slot, is a silent no-op

/// Index of a block slot
pub type BlockIndex = usize;

/// One fixed-size unit of storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Creates a zero-filled block
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Reads one byte; offsets past the end read as zero
    pub fn read(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    /// Writes one byte; offsets past the end are ignored
    pub fn write(&mut self, offset: usize, value: u8) {
        if let Some(byte) = self.data.get_mut(offset) {
            *byte = value;
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory block store
#[derive(Debug, Clone)]
pub struct BlockStore {
    block_size: usize,
    slots: Vec<Option<Block>>,
}

impl BlockStore {
    /// Creates a store with `block_count` free slots of `block_size` bytes
    pub fn new(block_count: usize, block_size: usize) -> Self {
        Self {
            block_size,
            slots: vec![None; block_count],
        }
    }

    /// Size of every block in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of free slots
    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// Whether the slot at `index` currently holds a block
    pub fn is_allocated(&self, index: BlockIndex) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Allocates up to `count` blocks, appending their indices to `block_map`
    ///
    /// Returns how many blocks were actually allocated. A result smaller than
    /// `count` means the store ran out of free slots; whatever was allocated
    /// stays appended to `block_map`.
    pub fn allocate(&mut self, count: usize, block_map: &mut Vec<BlockIndex>) -> usize {
        let mut allocated = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if allocated == count {
                break;
            }
            if slot.is_none() {
                *slot = Some(Block::new(self.block_size));
                block_map.push(index);
                allocated += 1;
            }
        }
        allocated
    }

    /// Frees the last `count` blocks of `block_map`, removing them from the map
    ///
    /// Returns how many blocks were freed (at most `block_map.len()`).
    pub fn free(&mut self, block_map: &mut Vec<BlockIndex>, count: usize) -> usize {
        let mut freed = 0;
        while freed < count {
            let Some(index) = block_map.pop() else {
                break;
            };
            if let Some(slot) = self.slots.get_mut(index) {
                *slot = None;
            }
            freed += 1;
        }
        freed
    }

    /// Reads one byte from a block
    ///
    /// Free slots and out-of-range positions read as zero.
    pub fn read_byte(&self, index: BlockIndex, offset: usize) -> u8 {
        match self.slots.get(index) {
            Some(Some(block)) => block.read(offset),
            _ => 0,
        }
    }

    /// Writes one byte into a block
    ///
    /// Free slots and out-of-range positions are ignored.
    pub fn write_byte(&mut self, index: BlockIndex, offset: usize, value: u8) {
        if let Some(Some(block)) = self.slots.get_mut(index) {
            block.write(offset, value);
        }
    }
}
