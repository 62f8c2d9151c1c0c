//! Filesystem Service implementation
//!
//! This module provides the actual service that implements filesystem operations.

use crate::open_files::OpenFileTable;
use crate::operations::{FileSystemOperations, FsError, ListEntry, StatInfo, UnlinkOutcome};
use fs_logger::{EventLog, LogEntry, LogLevel};
use fs_namespace::{directory, FinalLink, PathResolver, PathTarget};
use fs_storage::file_io::blocks_needed;
use fs_storage::{Descriptor, Volume};
use fs_types::{
    DescriptorId, DescriptorKind, Fd, FsConfig, FsInstanceId, ROOT_ID, SYMLINK_MAX_LEN,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Initial content of a newly created descriptor
enum Content<'a> {
    Empty,
    Directory,
    Target(&'a str),
}

/// The Filesystem Service
///
/// Owns the volume, the open-file table and the current directory of one
/// in-memory filesystem instance.
#[derive(Debug, Clone)]
pub struct FileSystem {
    id: FsInstanceId,
    config: FsConfig,
    volume: Volume,
    open_files: OpenFileTable,
    cwd: DescriptorId,
    resolver: PathResolver,
    events: EventLog,
}

impl FileSystem {
    /// Creates a filesystem holding only the root directory
    pub fn new(config: FsConfig) -> Result<Self, FsError> {
        config.validate()?;

        let mut volume = Volume::new(&config);
        let mut root = Descriptor::new(ROOT_ID, DescriptorKind::Directory, ROOT_ID);
        root.increment_links();
        volume.install(root)?;
        volume.resize(ROOT_ID, config.dir_default_size)?;
        directory::seed(&mut volume, ROOT_ID, ROOT_ID)?;

        let mut fs = Self {
            id: FsInstanceId::new(),
            open_files: OpenFileTable::new(config.max_open_files),
            events: EventLog::new(config.log_capacity, config.min_log_level),
            resolver: PathResolver::new(),
            cwd: ROOT_ID,
            volume,
            config,
        };

        let entry = LogEntry::new(LogLevel::Info, "mounted")
            .with_field("block_size", fs.config.block_size)
            .with_field("max_blocks", fs.config.max_blocks)
            .with_field("max_descriptors", fs.config.max_descriptors);
        fs.record(entry);

        Ok(fs)
    }

    /// Creates a filesystem with the default capacities
    pub fn with_defaults() -> Result<Self, FsError> {
        Self::new(FsConfig::default())
    }

    /// Creates a filesystem from a JSON config file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, FsError> {
        Self::new(FsConfig::load(path)?)
    }

    pub fn instance_id(&self) -> FsInstanceId {
        self.id
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Current working directory
    pub fn cwd(&self) -> DescriptorId {
        self.cwd
    }

    /// Structured events recorded by this instance
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn free_blocks(&self) -> usize {
        self.volume.blocks().free_count()
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.open_files.len()
    }

    /// Verifies the whole-filesystem invariants
    ///
    /// Covers block ownership, the root descriptor, parent links, link counts
    /// against directory contents, open handles and the current directory.
    pub fn check_invariants(&self) -> Result<(), FsError> {
        self.volume
            .check_invariants()
            .map_err(FsError::Inconsistent)?;

        let root = self.volume.descriptor(ROOT_ID)?;
        if !root.kind().is_directory() || root.parent() != ROOT_ID {
            return Err(FsError::Inconsistent("root is not a self-parented directory".to_string()));
        }

        // Root has no parent entry; its single link is implicit.
        let mut names: BTreeMap<DescriptorId, u32> = BTreeMap::new();
        names.insert(ROOT_ID, 1);
        for descriptor in self.volume.descriptors().iter() {
            if !descriptor.kind().is_directory() {
                continue;
            }
            for entry in directory::entries(&self.volume, descriptor.id())? {
                if entry.is_dot() {
                    continue;
                }
                if !self.volume.descriptors().contains(entry.id) {
                    return Err(FsError::Inconsistent(format!(
                        "entry {:?} in directory {} names free descriptor {}",
                        entry.name,
                        descriptor.id(),
                        entry.id
                    )));
                }
                *names.entry(entry.id).or_insert(0) += 1;
            }
        }
        for descriptor in self.volume.descriptors().iter() {
            let parent = descriptor.parent();
            let parent_is_dir = matches!(
                self.volume.descriptors().get(parent),
                Ok(p) if p.kind().is_directory()
            );
            if !parent_is_dir {
                return Err(FsError::Inconsistent(format!(
                    "descriptor {} has parent {} which is not a live directory",
                    descriptor.id(),
                    parent
                )));
            }
            if !descriptor.is_root() && !directory::lists(&self.volume, parent, descriptor.id())? {
                return Err(FsError::Inconsistent(format!(
                    "descriptor {} is not listed in its parent {}",
                    descriptor.id(),
                    parent
                )));
            }

            let expected = names.get(&descriptor.id()).copied().unwrap_or(0);
            if descriptor.link_count() != expected {
                return Err(FsError::Inconsistent(format!(
                    "descriptor {} has link count {} but {} names",
                    descriptor.id(),
                    descriptor.link_count(),
                    expected
                )));
            }
        }

        for (fd, id) in self.open_files.iter() {
            if !self.volume.descriptor(id)?.kind().is_file() {
                return Err(FsError::Inconsistent(format!("{} names non-file {}", fd, id)));
            }
        }

        if !self.volume.descriptor(self.cwd)?.kind().is_directory() {
            return Err(FsError::Inconsistent("cwd is not a directory".to_string()));
        }

        Ok(())
    }

    fn record(&mut self, entry: LogEntry) {
        self.events.record(entry.with_source(self.id));
    }

    /// Logs the outcome of an operation and passes the result through
    fn finish<T>(
        &mut self,
        op: &'static str,
        subject: &str,
        level: LogLevel,
        result: Result<T, FsError>,
    ) -> Result<T, FsError> {
        let entry = match &result {
            Ok(_) => LogEntry::new(level, op).with_field("target", subject),
            Err(err) => LogEntry::new(LogLevel::Warn, op)
                .with_field("target", subject)
                .with_field("error", err),
        };
        self.record(entry);
        result
    }

    fn resolve(&self, path: &str, final_link: FinalLink) -> Result<PathTarget, FsError> {
        Ok(self
            .resolver
            .resolve(&self.volume, self.cwd, path, final_link)?)
    }

    fn resolve_existing(&self, path: &str, final_link: FinalLink) -> Result<DescriptorId, FsError> {
        Ok(self
            .resolver
            .resolve_existing(&self.volume, self.cwd, path, final_link)?)
    }

    fn kind_of(&self, id: DescriptorId) -> Result<DescriptorKind, FsError> {
        Ok(self.volume.descriptor(id)?.kind())
    }

    fn handle(&self, fd: Fd) -> Result<DescriptorId, FsError> {
        self.open_files.get(fd).ok_or(FsError::InvalidHandle(fd))
    }

    fn stat_of(&self, id: DescriptorId) -> Result<StatInfo, FsError> {
        let descriptor = self.volume.descriptor(id)?;
        Ok(StatInfo {
            kind: descriptor.kind(),
            size: descriptor.size(),
            offset: descriptor.offset(),
            blocks: descriptor.block_map().to_vec(),
            link_count: descriptor.link_count(),
            id,
            parent: descriptor.parent(),
        })
    }

    /// Splits a target into a parent and a name that is valid and unused
    fn free_name(&self, target: PathTarget) -> Result<(DescriptorId, String), FsError> {
        let (parent, name) = match target {
            PathTarget::Root => return Err(FsError::AlreadyExists("/".to_string())),
            PathTarget::Entry { parent, name } => (parent, name),
        };
        if !PathResolver::is_valid_name(&name) {
            return Err(FsError::InvalidName(name));
        }
        if directory::find_id(&self.volume, parent, &name)?.is_some() {
            return Err(FsError::AlreadyExists(name));
        }
        Ok((parent, name))
    }

    fn ensure_room(&self, parent: DescriptorId, name: &str, id: DescriptorId) -> Result<(), FsError> {
        if !directory::has_room(&self.volume, parent, name, id)? {
            return Err(FsError::OutOfSpace(format!(
                "directory {} has no room for {:?}",
                parent, name
            )));
        }
        Ok(())
    }

    fn ensure_blocks(&self, bytes: usize) -> Result<(), FsError> {
        let needed = blocks_needed(bytes, self.volume.blocks().block_size());
        let free = self.free_blocks();
        if needed > free {
            return Err(FsError::OutOfSpace(format!(
                "needed {} blocks, only {} free",
                needed, free
            )));
        }
        Ok(())
    }

    /// Allocates a descriptor, fills it and links it under `path`
    ///
    /// Every capacity is checked first; if filling still fails the
    /// descriptor is released again.
    fn create_object(
        &mut self,
        path: &str,
        kind: DescriptorKind,
        content: Content<'_>,
    ) -> Result<DescriptorId, FsError> {
        let (parent, name) = self.free_name(self.resolve(path, FinalLink::NoFollow)?)?;
        let id = self.volume.next_free_id()?;
        self.ensure_room(parent, &name, id)?;

        let bytes = match content {
            Content::Empty => 0,
            Content::Directory => self.config.dir_default_size,
            Content::Target(target) => target.len(),
        };
        self.ensure_blocks(bytes)?;

        let mut descriptor = Descriptor::new(id, kind, parent);
        descriptor.increment_links();
        self.volume.install(descriptor)?;

        if let Err(err) = self.populate(id, parent, &name, content, bytes) {
            self.volume.release(id)?;
            return Err(err);
        }
        Ok(id)
    }

    fn populate(
        &mut self,
        id: DescriptorId,
        parent: DescriptorId,
        name: &str,
        content: Content<'_>,
        bytes: usize,
    ) -> Result<(), FsError> {
        self.volume.resize(id, bytes)?;
        match content {
            Content::Empty => {}
            Content::Directory => directory::seed(&mut self.volume, id, parent)?,
            Content::Target(target) => {
                self.volume.write(id, target.as_bytes())?;
                self.volume.seek(id, 0)?;
            }
        }
        directory::add_entry(&mut self.volume, parent, name, id)?;
        Ok(())
    }

    fn remove_directory(&mut self, path: &str) -> Result<(), FsError> {
        let (parent, name) = match self.resolve(path, FinalLink::NoFollow)? {
            PathTarget::Root => return Err(FsError::Busy("/".to_string())),
            PathTarget::Entry { parent, name } => (parent, name),
        };
        if name == "." || name == ".." {
            return Err(FsError::InvalidName(name));
        }

        let id = directory::find_id(&self.volume, parent, &name)?
            .ok_or_else(|| FsError::NotFound(name.clone()))?;
        if !self.kind_of(id)?.is_directory() {
            return Err(FsError::NotADirectory(name));
        }
        if id == self.cwd {
            return Err(FsError::Busy(name));
        }
        if !directory::is_empty(&self.volume, id)? {
            return Err(FsError::DirectoryNotEmpty(name));
        }

        directory::delete_entry(&mut self.volume, parent, &name)?;
        if self.volume.descriptor_mut(id)?.decrement_links() == 0 {
            self.volume.release(id)?;
        }
        Ok(())
    }

    fn add_link(&mut self, existing: &str, new_path: &str) -> Result<u32, FsError> {
        let id = self.resolve_existing(existing, FinalLink::Follow)?;
        if self.kind_of(id)?.is_directory() {
            return Err(FsError::WrongType(format!(
                "{} is a directory and cannot be hard-linked",
                existing
            )));
        }

        let (parent, name) = self.free_name(self.resolve(new_path, FinalLink::NoFollow)?)?;
        self.ensure_room(parent, &name, id)?;

        directory::add_entry(&mut self.volume, parent, &name, id)?;
        Ok(self.volume.descriptor_mut(id)?.increment_links())
    }

    fn remove_link(&mut self, path: &str) -> Result<UnlinkOutcome, FsError> {
        let (parent, name) = match self.resolve(path, FinalLink::NoFollow)? {
            PathTarget::Root => return Err(FsError::WrongType("/ is a directory".to_string())),
            PathTarget::Entry { parent, name } => (parent, name),
        };

        let id = directory::find_id(&self.volume, parent, &name)?
            .ok_or_else(|| FsError::NotFound(name.clone()))?;
        if self.kind_of(id)?.is_directory() {
            return Err(FsError::WrongType(format!("{} is a directory", name)));
        }

        directory::delete_entry(&mut self.volume, parent, &name)?;
        let remaining = self.volume.descriptor_mut(id)?.decrement_links();
        if remaining > 0 {
            self.repoint_parent(id)?;
            return Ok(UnlinkOutcome::StillLinked(remaining));
        }

        self.volume.release(id)?;
        let closed = self.open_files.release_descriptor(id);
        if !closed.is_empty() {
            let entry = LogEntry::new(LogLevel::Debug, "handles invalidated")
                .with_field("descriptor", id)
                .with_field("count", closed.len());
            self.record(entry);
        }
        Ok(UnlinkOutcome::Removed)
    }

    /// Moves `parent` to a directory that still lists `id`
    ///
    /// No-op while the recorded parent still holds a name for `id`.
    fn repoint_parent(&mut self, id: DescriptorId) -> Result<(), FsError> {
        let parent = self.volume.descriptor(id)?.parent();
        if directory::lists(&self.volume, parent, id)? {
            return Ok(());
        }
        let holder = directory::containing_directory(&self.volume, id)?.ok_or_else(|| {
            FsError::Inconsistent(format!("descriptor {} is linked but listed nowhere", id))
        })?;
        self.volume.descriptor_mut(id)?.set_parent(holder);

        let entry = LogEntry::new(LogLevel::Debug, "parent moved")
            .with_field("descriptor", id)
            .with_field("from", parent)
            .with_field("to", holder);
        self.record(entry);
        Ok(())
    }

    fn resize_file(&mut self, path: &str, size: usize) -> Result<(), FsError> {
        let id = self.resolve_existing(path, FinalLink::Follow)?;
        let kind = self.kind_of(id)?;
        if !kind.is_file() {
            return Err(FsError::WrongType(format!("{} is a {}", path, kind)));
        }
        self.volume.resize(id, size)?;
        Ok(())
    }

    fn open_file(&mut self, path: &str) -> Result<Fd, FsError> {
        let id = self.resolve_existing(path, FinalLink::Follow)?;
        let kind = self.kind_of(id)?;
        if !kind.is_file() {
            return Err(FsError::WrongType(format!("{} is a {}", path, kind)));
        }
        self.open_files.open(id).ok_or(FsError::NoFreeHandles)
    }

    fn change_directory(&mut self, path: &str) -> Result<(), FsError> {
        let id = self.resolve_existing(path, FinalLink::Follow)?;
        if !self.kind_of(id)?.is_directory() {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        self.cwd = id;
        Ok(())
    }
}

impl FileSystemOperations for FileSystem {
    fn create(&mut self, path: &str) -> Result<DescriptorId, FsError> {
        let result = self.create_object(path, DescriptorKind::File, Content::Empty);
        self.finish("create", path, LogLevel::Info, result)
    }

    fn mkdir(&mut self, path: &str) -> Result<DescriptorId, FsError> {
        let result = self.create_object(path, DescriptorKind::Directory, Content::Directory);
        self.finish("mkdir", path, LogLevel::Info, result)
    }

    fn rmdir(&mut self, path: &str) -> Result<(), FsError> {
        let result = self.remove_directory(path);
        self.finish("rmdir", path, LogLevel::Info, result)
    }

    fn cd(&mut self, path: &str) -> Result<(), FsError> {
        let result = self.change_directory(path);
        self.finish("cd", path, LogLevel::Debug, result)
    }

    fn symlink(&mut self, target: &str, path: &str) -> Result<DescriptorId, FsError> {
        let result = if target.is_empty() {
            Err(FsError::InvalidPath("empty symlink target".to_string()))
        } else if target.len() > SYMLINK_MAX_LEN {
            Err(FsError::SymlinkTooLong {
                len: target.len(),
                max: SYMLINK_MAX_LEN,
            })
        } else {
            self.create_object(path, DescriptorKind::Symlink, Content::Target(target))
        };
        self.finish("symlink", path, LogLevel::Info, result)
    }

    fn link(&mut self, existing: &str, new_path: &str) -> Result<u32, FsError> {
        let result = self.add_link(existing, new_path);
        self.finish("link", new_path, LogLevel::Info, result)
    }

    fn unlink(&mut self, path: &str) -> Result<UnlinkOutcome, FsError> {
        let result = self.remove_link(path);
        self.finish("unlink", path, LogLevel::Info, result)
    }

    fn truncate(&mut self, path: &str, size: usize) -> Result<(), FsError> {
        let result = self.resize_file(path, size);
        self.finish("truncate", path, LogLevel::Info, result)
    }

    fn stat(&self, path: &str) -> Result<StatInfo, FsError> {
        self.stat_of(self.resolve_existing(path, FinalLink::Follow)?)
    }

    fn lstat(&self, path: &str) -> Result<StatInfo, FsError> {
        self.stat_of(self.resolve_existing(path, FinalLink::NoFollow)?)
    }

    fn open(&mut self, path: &str) -> Result<Fd, FsError> {
        let result = self.open_file(path);
        self.finish("open", path, LogLevel::Debug, result)
    }

    fn close(&mut self, fd: Fd) -> Result<(), FsError> {
        let result = self
            .open_files
            .close(fd)
            .map(|_| ())
            .ok_or(FsError::InvalidHandle(fd));
        self.finish("close", &fd.to_string(), LogLevel::Debug, result)
    }

    fn seek(&mut self, fd: Fd, offset: usize) -> Result<(), FsError> {
        let result = self
            .handle(fd)
            .and_then(|id| Ok(self.volume.seek(id, offset)?));
        self.finish("seek", &fd.to_string(), LogLevel::Debug, result)
    }

    fn read(&self, fd: Fd, len: usize) -> Result<Vec<u8>, FsError> {
        let id = self.handle(fd)?;
        Ok(self.volume.read(id, len)?)
    }

    fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize, FsError> {
        let result = self
            .handle(fd)
            .and_then(|id| Ok(self.volume.write(id, data)?));
        self.finish("write", &fd.to_string(), LogLevel::Debug, result)
    }

    fn ls(&self, path: &str) -> Result<Vec<ListEntry>, FsError> {
        let id = self.resolve_existing(path, FinalLink::Follow)?;
        if !self.kind_of(id)?.is_directory() {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        directory::entries(&self.volume, id)?
            .into_iter()
            .map(|entry| -> Result<ListEntry, FsError> {
                Ok(ListEntry {
                    kind: self.kind_of(entry.id)?,
                    name: entry.name,
                    id: entry.id,
                })
            })
            .collect()
    }

    fn pwd(&self) -> Result<String, FsError> {
        let mut names = Vec::new();
        let mut current = self.cwd;

        while current != ROOT_ID {
            if names.len() >= self.volume.descriptors().capacity() {
                return Err(FsError::Inconsistent("parent chain does not reach root".to_string()));
            }
            names.push(directory::dir_name(&self.volume, current)?);
            current = self.volume.descriptor(current)?.parent();
        }

        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}
