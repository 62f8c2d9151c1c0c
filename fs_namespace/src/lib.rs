//! # Namespace
//!
//! Names on top of descriptors: directory content encoding and path walking.
//!
//! ## Design
//!
//! - A directory is an ordinary descriptor whose bytes list `name@id/` records
//! - Every directory holds "." and "..", so relative navigation is plain lookup
//! - Path resolution walks directories one component at a time and expands
//!   symbolic links a bounded number of times
//! - Nothing here allocates descriptors; that is the caller's job

pub mod directory;
pub mod path;

pub use directory::{DirEntry, DirectoryError};
pub use path::{DirectoryTree, FinalLink, PathError, PathResolver, PathTarget};
