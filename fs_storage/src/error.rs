//! Storage-layer errors

use fs_types::DescriptorId;
use thiserror::Error;

/// Errors raised by the descriptor table and block-level file I/O
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A write does not fit in the file, or the block store is exhausted
    #[error("Out of space: {0}")]
    OutOfSpace(String),

    /// Every descriptor slot is in use
    #[error("Descriptor table is full")]
    DescriptorTableFull,

    /// Seek position past the end of the file
    #[error("Offset {offset} out of bounds (size {size})")]
    OffsetOutOfBounds { offset: usize, size: usize },

    /// The descriptor slot is empty
    #[error("No such descriptor: {0}")]
    NoSuchDescriptor(DescriptorId),
}
