//! Fixed-capacity descriptor table

use crate::descriptor::Descriptor;
use crate::error::StorageError;
use fs_types::DescriptorId;

/// Slot table of descriptors
///
/// A free slot is `None`. New descriptors take the lowest free slot, and a
/// slot only becomes free again through [`DescriptorTable::remove`].
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    slots: Vec<Option<Descriptor>>,
}

impl DescriptorTable {
    /// Creates a table with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowest free slot, without reserving it
    pub fn first_free(&self) -> Option<DescriptorId> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(DescriptorId::new)
    }

    /// Places a descriptor in the slot named by its id
    pub fn insert(&mut self, descriptor: Descriptor) -> Result<DescriptorId, StorageError> {
        let id = descriptor.id();
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or(StorageError::DescriptorTableFull)?;
        if slot.is_some() {
            return Err(StorageError::DescriptorTableFull);
        }
        *slot = Some(descriptor);
        Ok(id)
    }

    pub fn get(&self, id: DescriptorId) -> Result<&Descriptor, StorageError> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(StorageError::NoSuchDescriptor(id))
    }

    pub fn get_mut(&mut self, id: DescriptorId) -> Result<&mut Descriptor, StorageError> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(StorageError::NoSuchDescriptor(id))
    }

    pub fn contains(&self, id: DescriptorId) -> bool {
        self.get(id).is_ok()
    }

    /// Clears a slot and returns what it held
    pub fn remove(&mut self, id: DescriptorId) -> Option<Descriptor> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    /// Iterates over occupied slots in id order
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_types::DescriptorKind;

    fn descriptor(id: usize) -> Descriptor {
        Descriptor::new(DescriptorId::new(id), DescriptorKind::File, DescriptorId::new(0))
    }

    #[test]
    fn test_empty_table() {
        let table = DescriptorTable::new(4);
        assert_eq!(table.capacity(), 4);
        assert!(table.is_empty());
        assert_eq!(table.first_free(), Some(DescriptorId::new(0)));
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = DescriptorTable::new(4);
        let id = table.insert(descriptor(0)).unwrap();

        assert_eq!(id, DescriptorId::new(0));
        assert_eq!(table.get(id).unwrap().id(), id);
        assert_eq!(table.len(), 1);
        assert_eq!(table.first_free(), Some(DescriptorId::new(1)));
    }

    #[test]
    fn test_insert_into_occupied_slot() {
        let mut table = DescriptorTable::new(4);
        table.insert(descriptor(1)).unwrap();
        assert_eq!(
            table.insert(descriptor(1)),
            Err(StorageError::DescriptorTableFull)
        );
    }

    #[test]
    fn test_insert_past_capacity() {
        let mut table = DescriptorTable::new(2);
        assert_eq!(
            table.insert(descriptor(2)),
            Err(StorageError::DescriptorTableFull)
        );
    }

    #[test]
    fn test_remove_frees_lowest_slot() {
        let mut table = DescriptorTable::new(4);
        for i in 0..3 {
            table.insert(descriptor(i)).unwrap();
        }

        assert!(table.remove(DescriptorId::new(1)).is_some());
        assert!(!table.contains(DescriptorId::new(1)));
        assert_eq!(table.first_free(), Some(DescriptorId::new(1)));
        assert!(table.remove(DescriptorId::new(1)).is_none());
    }

    #[test]
    fn test_full_table_has_no_free_slot() {
        let mut table = DescriptorTable::new(2);
        table.insert(descriptor(0)).unwrap();
        table.insert(descriptor(1)).unwrap();
        assert_eq!(table.first_free(), None);
    }

    #[test]
    fn test_missing_descriptor() {
        let table = DescriptorTable::new(2);
        assert_eq!(
            table.get(DescriptorId::new(1)).unwrap_err(),
            StorageError::NoSuchDescriptor(DescriptorId::new(1))
        );
    }
}
