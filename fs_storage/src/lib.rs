//! # Storage Layer
//!
//! Descriptors (inodes) and the byte-level I/O that maps them onto blocks.
//!
//! ## Design
//!
//! - [`Descriptor`]: type, link count, size, offset, parent, block map
//! - [`DescriptorTable`]: fixed slots, lowest free slot wins
//! - [`file_io`]: logical byte ranges to block reads, writes and zero-fill
//! - [`Volume`]: the block store and descriptor table owned together
//!
//! Names do not exist at this layer. Everything is addressed by
//! [`fs_types::DescriptorId`] and byte offset.

pub mod descriptor;
pub mod descriptor_table;
pub mod error;
pub mod file_io;
pub mod volume;

pub use descriptor::Descriptor;
pub use descriptor_table::DescriptorTable;
pub use error::StorageError;
pub use file_io::Resize;
pub use volume::Volume;
