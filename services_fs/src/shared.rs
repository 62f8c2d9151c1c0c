//! Shared access to one filesystem instance

use crate::service::FileSystem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to a [`FileSystem`] behind a single lock
///
/// Every operation runs with the lock held, so operations from different
/// threads never interleave.
#[derive(Debug, Clone)]
pub struct SharedFileSystem {
    inner: Arc<Mutex<FileSystem>>,
}

impl SharedFileSystem {
    pub fn new(fs: FileSystem) -> Self {
        Self {
            inner: Arc::new(Mutex::new(fs)),
        }
    }

    /// Runs `f` with exclusive access to the filesystem
    pub fn with<R>(&self, f: impl FnOnce(&mut FileSystem) -> R) -> R {
        f(&mut self.lock())
    }

    /// Locks the filesystem, recovering from a poisoned lock
    pub fn lock(&self) -> MutexGuard<'_, FileSystem> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<FileSystem> for SharedFileSystem {
    fn from(fs: FileSystem) -> Self {
        Self::new(fs)
    }
}
