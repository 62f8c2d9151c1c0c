//! Path resolution logic
//!
//! Turns a textual path into the directory that holds its final component,
//! expanding symbolic links along the way.
//!
//! "." and ".." need no special handling here: every directory carries
//! records for both, so they are looked up like any other name.

use crate::directory::{self, DirectoryError};
use fs_storage::{StorageError, Volume};
use fs_types::{DescriptorId, DescriptorKind, ROOT_ID, SYMLINK_MAX_DEPTH};
use thiserror::Error;

const SEPARATOR: char = '/';

/// Errors that can occur during path resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Path is empty or has an empty interior component
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path component not found during traversal
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempted to traverse through a non-directory object
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Symlink expansion bound exceeded
    #[error("Too many levels of symbolic links: {0}")]
    TooManySymlinks(String),

    /// Directory content could not be read
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl From<StorageError> for PathError {
    fn from(err: StorageError) -> Self {
        PathError::Directory(DirectoryError::Storage(err))
    }
}

/// Read-only view of the directory tree needed to walk a path
pub trait DirectoryTree {
    /// Kind of an existing descriptor
    fn kind_of(&self, id: DescriptorId) -> Result<DescriptorKind, PathError>;

    /// Looks up `name` in directory `dir`
    fn lookup(&self, dir: DescriptorId, name: &str) -> Result<Option<DescriptorId>, PathError>;

    /// Target text of a symlink
    fn link_target(&self, id: DescriptorId) -> Result<String, PathError>;
}

impl DirectoryTree for Volume {
    fn kind_of(&self, id: DescriptorId) -> Result<DescriptorKind, PathError> {
        Ok(self.descriptor(id)?.kind())
    }

    fn lookup(&self, dir: DescriptorId, name: &str) -> Result<Option<DescriptorId>, PathError> {
        Ok(directory::find_id(self, dir, name)?)
    }

    fn link_target(&self, id: DescriptorId) -> Result<String, PathError> {
        let size = self.descriptor(id)?.size();
        let bytes = self.read_at(id, 0, size)?;
        String::from_utf8(bytes).map_err(|_| {
            PathError::Directory(DirectoryError::Inconsistent(format!(
                "symlink {} target is not UTF-8",
                id
            )))
        })
    }
}

/// Where a path ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// The path was "/"
    Root,
    /// Final component `name` inside directory `parent`; the name may not exist
    Entry { parent: DescriptorId, name: String },
}

/// Whether a symlink in the final component is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalLink {
    /// Resolve through the link to what it points at
    Follow,
    /// Stop at the link itself
    NoFollow,
}

/// Evolving state of one resolution
struct Resolution {
    path: String,
    expansions: usize,
}

enum Step {
    Done(PathTarget),
    Expand(String),
}

/// Path resolver
///
/// Splits paths into components and walks them against a [`DirectoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathResolver {
    max_symlink_depth: usize,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    /// Creates a resolver with the standard expansion bound
    pub fn new() -> Self {
        Self::with_max_depth(SYMLINK_MAX_DEPTH)
    }

    pub fn with_max_depth(max_symlink_depth: usize) -> Self {
        Self { max_symlink_depth }
    }

    pub fn max_symlink_depth(&self) -> usize {
        self.max_symlink_depth
    }

    /// Splits a path into an absolute flag and its components
    ///
    /// # Examples
    ///
    /// ```
    /// use fs_namespace::PathResolver;
    ///
    /// let (absolute, components) = PathResolver::split_path("/docs/notes/").unwrap();
    /// assert!(absolute);
    /// assert_eq!(components, vec!["docs", "notes"]);
    ///
    /// let (absolute, components) = PathResolver::split_path("../todo.txt").unwrap();
    /// assert!(!absolute);
    /// assert_eq!(components, vec!["..", "todo.txt"]);
    /// ```
    pub fn split_path(path: &str) -> Result<(bool, Vec<&str>), PathError> {
        if path.is_empty() {
            return Err(PathError::InvalidPath("Empty path".to_string()));
        }

        let absolute = path.starts_with(SEPARATOR);
        let body = path
            .strip_prefix(SEPARATOR)
            .unwrap_or(path)
            .trim_end_matches(SEPARATOR);

        if body.is_empty() {
            return Ok((absolute, Vec::new()));
        }

        let components: Vec<&str> = body.split(SEPARATOR).collect();
        if components.iter().any(|component| component.is_empty()) {
            return Err(PathError::InvalidPath(format!(
                "{}: path contains empty component",
                path
            )));
        }

        Ok((absolute, components))
    }

    /// Validates a name for a new directory entry
    pub fn is_valid_name(name: &str) -> bool {
        directory::is_encodable(name) && name != "." && name != ".."
    }

    /// Resolves `path` to the directory holding its final component
    ///
    /// Relative paths start at `cwd`. Intermediate symlinks are always
    /// expanded; the final one only with [`FinalLink::Follow`].
    pub fn resolve<T: DirectoryTree + ?Sized>(
        &self,
        tree: &T,
        cwd: DescriptorId,
        path: &str,
        final_link: FinalLink,
    ) -> Result<PathTarget, PathError> {
        let mut resolution = Resolution {
            path: path.to_string(),
            expansions: 0,
        };

        loop {
            match self.walk(tree, cwd, &resolution.path, final_link)? {
                Step::Done(target) => return Ok(target),
                Step::Expand(rewritten) => {
                    resolution.expansions += 1;
                    if resolution.expansions > self.max_symlink_depth {
                        return Err(PathError::TooManySymlinks(path.to_string()));
                    }
                    resolution.path = rewritten;
                }
            }
        }
    }

    /// Resolves `path` and requires the final component to exist
    pub fn resolve_existing<T: DirectoryTree + ?Sized>(
        &self,
        tree: &T,
        cwd: DescriptorId,
        path: &str,
        final_link: FinalLink,
    ) -> Result<DescriptorId, PathError> {
        match self.resolve(tree, cwd, path, final_link)? {
            PathTarget::Root => Ok(ROOT_ID),
            PathTarget::Entry { parent, name } => tree
                .lookup(parent, &name)?
                .ok_or(PathError::NotFound(name)),
        }
    }

    /// One pass over the components; stops at the first symlink to expand
    fn walk<T: DirectoryTree + ?Sized>(
        &self,
        tree: &T,
        cwd: DescriptorId,
        path: &str,
        final_link: FinalLink,
    ) -> Result<Step, PathError> {
        let (absolute, components) = Self::split_path(path)?;
        let Some((last, intermediates)) = components.split_last() else {
            return Ok(Step::Done(PathTarget::Root));
        };

        let mut dir = if absolute { ROOT_ID } else { cwd };

        for (i, name) in intermediates.iter().enumerate() {
            let id = tree
                .lookup(dir, name)?
                .ok_or_else(|| PathError::NotFound(name.to_string()))?;

            match tree.kind_of(id)? {
                DescriptorKind::Directory => dir = id,
                DescriptorKind::Symlink => {
                    let target = tree.link_target(id)?;
                    return Ok(Step::Expand(splice(
                        absolute,
                        &components[..i],
                        &target,
                        &components[i + 1..],
                    )));
                }
                DescriptorKind::File => return Err(PathError::NotADirectory(name.to_string())),
            }
        }

        if final_link == FinalLink::Follow {
            if let Some(id) = tree.lookup(dir, last)? {
                if tree.kind_of(id)?.is_symlink() {
                    let target = tree.link_target(id)?;
                    return Ok(Step::Expand(splice(
                        absolute,
                        intermediates,
                        &target,
                        &[],
                    )));
                }
            }
        }

        Ok(Step::Done(PathTarget::Entry {
            parent: dir,
            name: last.to_string(),
        }))
    }
}

/// Rewrites a path with one symlink component replaced by its target
///
/// An absolute target discards everything before the link; a relative one is
/// resolved from the directory that holds the link.
fn splice(absolute: bool, before: &[&str], target: &str, after: &[&str]) -> String {
    let target_absolute = target.starts_with(SEPARATOR);
    let mut parts: Vec<&str> = Vec::new();

    if !target_absolute {
        parts.extend_from_slice(before);
    }
    parts.extend(target.split(SEPARATOR).filter(|part| !part.is_empty()));
    parts.extend_from_slice(after);

    let joined = parts.join("/");
    if target_absolute || absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
