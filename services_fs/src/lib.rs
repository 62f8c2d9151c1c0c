//! # Filesystem Service
//!
//! This service provides file, directory and link operations over an
//! in-memory block store.
//!
//! ## Philosophy
//!
//! - Names live in directories; objects live in descriptors
//! - An object exists as long as some directory entry names it
//! - Every operation checks what it can before it changes anything
//! - Failures are typed and scoped to the operation that hit them
//!
//! ## Operations
//!
//! - `create(path)` / `mkdir(path)` / `symlink(target, path)`: new objects
//! - `link(existing, path)` / `unlink(path)` / `rmdir(path)`: names
//! - `open(path)` / `close(fd)` / `seek` / `read` / `write`: file content
//! - `truncate(path, size)`: file size
//! - `stat(path)` / `lstat(path)` / `ls(path)`: inspection
//! - `cd(path)` / `pwd()`: current directory

pub mod open_files;
pub mod operations;
pub mod service;
pub mod shared;

pub use open_files::OpenFileTable;
pub use operations::{FileSystemOperations, FsError, ListEntry, StatInfo, UnlinkOutcome};
pub use service::FileSystem;
pub use shared::SharedFileSystem;
