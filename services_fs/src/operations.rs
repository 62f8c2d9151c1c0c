//! Filesystem operations
//!
//! This module defines the operations provided by the filesystem service and
//! the error and result types they share.

use fs_namespace::{DirectoryError, PathError};
use fs_storage::StorageError;
use fs_types::{ConfigError, DescriptorId, DescriptorKind, Fd};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during filesystem operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FsError {
    /// A path component or entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A directory was required
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The object is the wrong kind for this operation
    #[error("Wrong type: {0}")]
    WrongType(String),

    /// Symlink expansion bound exceeded
    #[error("Too many symbolic links: {0}")]
    TooManySymlinks(String),

    /// Blocks, descriptors or directory capacity exhausted
    #[error("Out of space: {0}")]
    OutOfSpace(String),

    /// No open file behind this handle
    #[error("Invalid handle: {0}")]
    InvalidHandle(Fd),

    /// Seek past the end of the file
    #[error("Offset {offset} out of bounds (size {size})")]
    OffsetOutOfBounds { offset: usize, size: usize },

    /// Malformed path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Name cannot be used for a new entry
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Name already taken in the target directory
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Directory still has entries besides "." and ".."
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Target is in use (root or the current directory)
    #[error("Busy: {0}")]
    Busy(String),

    /// Every slot of the open-file table is taken
    #[error("No free file handles")]
    NoFreeHandles,

    /// Symlink target longer than the limit
    #[error("Symlink target is {len} bytes, limit is {max}")]
    SymlinkTooLong { len: usize, max: usize },

    /// Internal state contradicts itself
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    /// Configuration rejected at construction
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StorageError> for FsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OutOfSpace(msg) => FsError::OutOfSpace(msg),
            StorageError::DescriptorTableFull => {
                FsError::OutOfSpace("descriptor table is full".to_string())
            }
            StorageError::OffsetOutOfBounds { offset, size } => {
                FsError::OffsetOutOfBounds { offset, size }
            }
            StorageError::NoSuchDescriptor(id) => {
                FsError::Inconsistent(format!("reference to free descriptor {}", id))
            }
        }
    }
}

impl From<DirectoryError> for FsError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Storage(e) => e.into(),
            DirectoryError::InvalidName(name) => FsError::InvalidName(name),
            DirectoryError::NotADirectory(id) => {
                FsError::NotADirectory(format!("descriptor {}", id))
            }
            DirectoryError::WrongType(msg) => FsError::WrongType(msg),
            DirectoryError::NotFound(name) => FsError::NotFound(name),
            DirectoryError::Inconsistent(msg) => FsError::Inconsistent(msg),
        }
    }
}

impl From<PathError> for FsError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::InvalidPath(msg) => FsError::InvalidPath(msg),
            PathError::NotFound(name) => FsError::NotFound(name),
            PathError::NotADirectory(name) => FsError::NotADirectory(name),
            PathError::TooManySymlinks(path) => FsError::TooManySymlinks(path),
            PathError::Directory(e) => e.into(),
        }
    }
}

/// Metadata information about a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatInfo {
    /// Object kind
    pub kind: DescriptorKind,
    /// Logical size in bytes
    pub size: usize,
    /// Current seek position
    pub offset: usize,
    /// Block store indices, in file order
    pub blocks: Vec<usize>,
    /// Number of directory entries naming this descriptor
    pub link_count: u32,
    /// Descriptor id
    pub id: DescriptorId,
    /// Containing directory
    pub parent: DescriptorId,
}

impl fmt::Display for StatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type:   {}", self.kind)?;
        writeln!(f, "size:   {}", self.size)?;
        writeln!(f, "offset: {}", self.offset)?;
        writeln!(f, "blocks: {:?}", self.blocks)?;
        writeln!(f, "links:  {}", self.link_count)?;
        writeln!(f, "id:     {}", self.id)?;
        write!(f, "parent: {}", self.parent)
    }
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub name: String,
    pub id: DescriptorId,
    pub kind: DescriptorKind,
}

/// What an unlink did to the descriptor behind the name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// Last link gone; blocks and descriptor slot reclaimed
    Removed,
    /// Other names still refer to the descriptor
    StillLinked(u32),
}

/// Filesystem operations trait
///
/// Paths are resolved against the current directory unless they start with
/// "/". Queries take `&self`; anything that changes state takes `&mut self`.
pub trait FileSystemOperations {
    /// Create an empty regular file
    fn create(&mut self, path: &str) -> Result<DescriptorId, FsError>;

    /// Create a directory with "." and ".." already in place
    fn mkdir(&mut self, path: &str) -> Result<DescriptorId, FsError>;

    /// Remove an empty directory
    fn rmdir(&mut self, path: &str) -> Result<(), FsError>;

    /// Change the current directory
    fn cd(&mut self, path: &str) -> Result<(), FsError>;

    /// Create a symbolic link at `path` whose content is `target`
    fn symlink(&mut self, target: &str, path: &str) -> Result<DescriptorId, FsError>;

    /// Add another name for an existing non-directory
    ///
    /// Returns the new link count.
    fn link(&mut self, existing: &str, new_path: &str) -> Result<u32, FsError>;

    /// Remove a name; the object goes away with its last name
    fn unlink(&mut self, path: &str) -> Result<UnlinkOutcome, FsError>;

    /// Set a file's size, allocating or freeing blocks
    fn truncate(&mut self, path: &str, size: usize) -> Result<(), FsError>;

    /// Metadata of the object a path names, following a final symlink
    fn stat(&self, path: &str) -> Result<StatInfo, FsError>;

    /// Metadata of the object a path names, without following a final symlink
    fn lstat(&self, path: &str) -> Result<StatInfo, FsError>;

    /// Open a regular file
    fn open(&mut self, path: &str) -> Result<Fd, FsError>;

    /// Release a handle
    fn close(&mut self, fd: Fd) -> Result<(), FsError>;

    /// Move the file's seek position
    fn seek(&mut self, fd: Fd, offset: usize) -> Result<(), FsError>;

    /// Read up to `len` bytes at the seek position, without moving it
    fn read(&self, fd: Fd, len: usize) -> Result<Vec<u8>, FsError>;

    /// Write at the seek position; the file must already be large enough
    fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize, FsError>;

    /// List directory contents
    fn ls(&self, path: &str) -> Result<Vec<ListEntry>, FsError>;

    /// Absolute path of the current directory
    fn pwd(&self) -> Result<String, FsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_info_display() {
        let stat = StatInfo {
            kind: DescriptorKind::File,
            size: 100,
            offset: 4,
            blocks: vec![2, 3],
            link_count: 1,
            id: DescriptorId::new(5),
            parent: DescriptorId::new(0),
        };

        let lines: Vec<String> = stat.to_string().lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "type:   file");
        assert_eq!(lines[3], "blocks: [2, 3]");
        assert_eq!(lines[6], "parent: 0");
    }

    #[test]
    fn test_storage_errors_flatten() {
        assert_eq!(
            FsError::from(StorageError::DescriptorTableFull),
            FsError::OutOfSpace("descriptor table is full".to_string())
        );
        assert_eq!(
            FsError::from(StorageError::OffsetOutOfBounds { offset: 9, size: 3 }),
            FsError::OffsetOutOfBounds { offset: 9, size: 3 }
        );
    }

    #[test]
    fn test_nested_errors_flatten() {
        let err = PathError::Directory(DirectoryError::Storage(StorageError::OutOfSpace(
            "full".to_string(),
        )));
        assert_eq!(FsError::from(err), FsError::OutOfSpace("full".to_string()));

        let err = PathError::TooManySymlinks("a".to_string());
        assert_eq!(FsError::from(err), FsError::TooManySymlinks("a".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = FsError::SymlinkTooLong { len: 40, max: 32 };
        assert_eq!(err.to_string(), "Symlink target is 40 bytes, limit is 32");
        assert_eq!(
            FsError::InvalidHandle(Fd::new(3)).to_string(),
            "Invalid handle: fd=3"
        );
    }
}
