//! Directory encoding
//!
//! A directory is an ordinary descriptor whose bytes are a list of records:
//!
//! ```text
//! .@3/..@0/notes@5/
//! ```
//!
//! Each record is `name '@' id '/'`. The directory's offset is its append
//! cursor, so the live content is always bytes `[0, offset)`; anything past the
//! cursor is zeroed preallocated capacity. Names must not contain either
//! delimiter.

use fs_storage::{StorageError, Volume};
use fs_types::DescriptorId;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Separates an entry's name from its descriptor id
pub const NAME_ID_SEPARATOR: char = '@';

/// Terminates one record
pub const RECORD_TERMINATOR: char = '/';

/// Errors that can occur while reading or editing a directory
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Underlying storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Name contains a reserved delimiter or is empty
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Descriptor is not a directory
    #[error("Not a directory: descriptor {0}")]
    NotADirectory(DescriptorId),

    /// Operation needs a different descriptor kind
    #[error("Wrong type: {0}")]
    WrongType(String),

    /// No entry with the given name
    #[error("Not found: {0}")]
    NotFound(String),

    /// Content does not parse, or the tree contradicts itself
    #[error("Directory inconsistent: {0}")]
    Inconsistent(String),
}

/// A single entry in a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Name of this entry
    pub name: String,
    /// Descriptor the name refers to
    pub id: DescriptorId,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, id: DescriptorId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Whether this is one of the "." / ".." entries every directory carries
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Serializes one record
pub fn encode(name: &str, id: DescriptorId) -> String {
    format!("{}{}{}{}", name, NAME_ID_SEPARATOR, id, RECORD_TERMINATOR)
}

/// Whether `name` can be stored in a record
pub fn is_encodable(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(NAME_ID_SEPARATOR)
        && !name.contains(RECORD_TERMINATOR)
        && !name.contains('\0')
}

fn require_directory(volume: &Volume, dir: DescriptorId) -> Result<(), DirectoryError> {
    if !volume.descriptor(dir)?.kind().is_directory() {
        return Err(DirectoryError::NotADirectory(dir));
    }
    Ok(())
}

/// Whether one more record for `name`/`id` fits in the directory's capacity
pub fn has_room(
    volume: &Volume,
    dir: DescriptorId,
    name: &str,
    id: DescriptorId,
) -> Result<bool, DirectoryError> {
    require_directory(volume, dir)?;
    let descriptor = volume.descriptor(dir)?;
    Ok(descriptor.offset() + encode(name, id).len() <= descriptor.size())
}

/// Appends a record at the directory's cursor
///
/// Fails with `OutOfSpace` once the preallocated capacity is used up; the
/// directory is never grown implicitly.
pub fn add_entry(
    volume: &mut Volume,
    dir: DescriptorId,
    name: &str,
    id: DescriptorId,
) -> Result<(), DirectoryError> {
    require_directory(volume, dir)?;
    if !is_encodable(name) {
        return Err(DirectoryError::InvalidName(name.to_string()));
    }
    volume.write(dir, encode(name, id).as_bytes())?;
    Ok(())
}

/// Returns the serialized content, `[0, cursor)`
pub fn read_all(volume: &Volume, dir: DescriptorId) -> Result<String, DirectoryError> {
    require_directory(volume, dir)?;
    let cursor = volume.descriptor(dir)?.offset();
    let bytes = volume.read_at(dir, 0, cursor)?;
    String::from_utf8(bytes)
        .map_err(|_| DirectoryError::Inconsistent(format!("directory {} is not UTF-8", dir)))
}

/// Parses content into entries along with the byte span of each record
fn parse(content: &str) -> Result<Vec<(Range<usize>, DirEntry)>, DirectoryError> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < content.len() {
        let rest = &content[pos..];
        let len = rest.find(RECORD_TERMINATOR).ok_or_else(|| {
            DirectoryError::Inconsistent(format!("unterminated record at byte {}", pos))
        })?;
        let record = &rest[..len];
        let (name, id) = record
            .split_once(NAME_ID_SEPARATOR)
            .ok_or_else(|| DirectoryError::Inconsistent(format!("malformed record {:?}", record)))?;
        let id: usize = id
            .parse()
            .map_err(|_| DirectoryError::Inconsistent(format!("bad id in record {:?}", record)))?;

        records.push((pos..pos + len + 1, DirEntry::new(name, DescriptorId::new(id))));
        pos += len + 1;
    }

    Ok(records)
}

/// Lists every entry in record order
pub fn entries(volume: &Volume, dir: DescriptorId) -> Result<Vec<DirEntry>, DirectoryError> {
    let content = read_all(volume, dir)?;
    Ok(parse(&content)?.into_iter().map(|(_, entry)| entry).collect())
}

/// Looks up a name; the first matching record wins
pub fn find_id(
    volume: &Volume,
    dir: DescriptorId,
    name: &str,
) -> Result<Option<DescriptorId>, DirectoryError> {
    Ok(entries(volume, dir)?
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.id))
}

/// Whether the directory holds anything besides "." and ".."
pub fn is_empty(volume: &Volume, dir: DescriptorId) -> Result<bool, DirectoryError> {
    Ok(entries(volume, dir)?.iter().all(DirEntry::is_dot))
}

/// Whether `dir` holds a record for `id` other than "." and ".."
pub fn lists(
    volume: &Volume,
    dir: DescriptorId,
    id: DescriptorId,
) -> Result<bool, DirectoryError> {
    Ok(entries(volume, dir)?
        .iter()
        .any(|entry| entry.id == id && !entry.is_dot()))
}

/// Finds the lowest-numbered directory that lists `id`
pub fn containing_directory(
    volume: &Volume,
    id: DescriptorId,
) -> Result<Option<DescriptorId>, DirectoryError> {
    for descriptor in volume.descriptors().iter() {
        if descriptor.kind().is_directory() && lists(volume, descriptor.id(), id)? {
            return Ok(Some(descriptor.id()));
        }
    }
    Ok(None)
}

/// Removes the first record named `name` and returns the id it held
///
/// The remaining records are rewritten from offset 0 and the freed tail is
/// zeroed, so the cursor ends at the new end of content.
pub fn delete_entry(
    volume: &mut Volume,
    dir: DescriptorId,
    name: &str,
) -> Result<DescriptorId, DirectoryError> {
    let content = read_all(volume, dir)?;
    let (span, entry) = parse(&content)?
        .into_iter()
        .find(|(_, entry)| entry.name == name)
        .ok_or_else(|| DirectoryError::NotFound(name.to_string()))?;

    let mut updated = String::with_capacity(content.len() - span.len());
    updated.push_str(&content[..span.start]);
    updated.push_str(&content[span.end..]);

    volume.seek(dir, 0)?;
    volume.write(dir, updated.as_bytes())?;
    volume.fill_with_zeroes(dir)?;

    Ok(entry.id)
}

/// Writes the "." and ".." entries of a freshly created directory
pub fn seed(
    volume: &mut Volume,
    dir: DescriptorId,
    parent: DescriptorId,
) -> Result<(), DirectoryError> {
    add_entry(volume, dir, ".", dir)?;
    add_entry(volume, dir, "..", parent)
}

/// Finds the name a directory is listed under in its parent
///
/// The root has no parent entry and is named "/".
pub fn dir_name(volume: &Volume, id: DescriptorId) -> Result<String, DirectoryError> {
    let descriptor = volume.descriptor(id)?;
    if !descriptor.kind().is_directory() {
        return Err(DirectoryError::WrongType(format!(
            "descriptor {} is a {}, not a directory",
            id,
            descriptor.kind()
        )));
    }
    if descriptor.is_root() {
        return Ok(RECORD_TERMINATOR.to_string());
    }

    let parent = descriptor.parent();
    entries(volume, parent)?
        .into_iter()
        .find(|entry| entry.id == id && !entry.is_dot())
        .map(|entry| entry.name)
        .ok_or_else(|| {
            DirectoryError::Inconsistent(format!(
                "directory {} is not listed in its parent {}",
                id, parent
            ))
        })
}
