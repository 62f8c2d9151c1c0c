//! # Core Types
//!
//! This crate defines the fundamental types shared by every SimFS crate.
//!
//! ## Philosophy
//!
//! - **Indices, not pointers**: descriptors, handles and blocks are named by
//!   integer ids into fixed tables. Nothing owns anything through a reference.
//! - **Type safety first**: a descriptor id cannot be confused with a handle.
//! - **Capacities are configuration**: table sizes come from [`FsConfig`].
//!
//! ## Key Types
//!
//! - [`DescriptorId`]: index into the descriptor table
//! - [`Fd`]: index into the open-file table
//! - [`FsInstanceId`]: unique identity of one filesystem instance
//! - [`DescriptorKind`]: file, directory or symlink
//! - [`FsConfig`]: capacity and logging configuration

pub mod config;
pub mod ids;
pub mod kind;

pub use config::{ConfigError, FsConfig, LogLevel};
pub use ids::{DescriptorId, Fd, FsInstanceId};
pub use kind::DescriptorKind;

/// Id of the root directory. Always present, always its own parent.
pub const ROOT_ID: DescriptorId = DescriptorId::new(0);

/// Longest symlink target accepted, in bytes.
pub const SYMLINK_MAX_LEN: usize = 32;

/// Number of symlink expansions a single path resolution may perform.
pub const SYMLINK_MAX_DEPTH: usize = 2;
