//! Open-file table

use fs_types::{DescriptorId, Fd};

/// Fixed-capacity map from handles to descriptors
///
/// Handles are allocated lowest-free-slot first. Several handles may name the
/// same descriptor; they share its seek position.
#[derive(Debug, Clone)]
pub struct OpenFileTable {
    slots: Vec<Option<DescriptorId>>,
}

impl OpenFileTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of handles in use
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the lowest free handle; `None` when the table is full
    pub fn open(&mut self, id: DescriptorId) -> Option<Fd> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(id);
        Some(Fd::new(slot))
    }

    /// Frees a handle and returns the descriptor it named
    pub fn close(&mut self, fd: Fd) -> Option<DescriptorId> {
        self.slots.get_mut(fd.slot()).and_then(Option::take)
    }

    pub fn get(&self, fd: Fd) -> Option<DescriptorId> {
        self.slots.get(fd.slot()).copied().flatten()
    }

    /// Closes every handle naming `id`
    pub fn release_descriptor(&mut self, id: DescriptorId) -> Vec<Fd> {
        let mut closed = Vec::new();
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if *entry == Some(id) {
                *entry = None;
                closed.push(Fd::new(slot));
            }
        }
        closed
    }

    /// Open handles in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Fd, DescriptorId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.map(|id| (Fd::new(slot), id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_allocation() {
        let mut table = OpenFileTable::new(4);
        let a = DescriptorId::new(3);

        assert_eq!(table.open(a), Some(Fd::new(0)));
        assert_eq!(table.open(a), Some(Fd::new(1)));
        assert_eq!(table.close(Fd::new(0)), Some(a));
        assert_eq!(table.open(DescriptorId::new(7)), Some(Fd::new(0)));
    }

    #[test]
    fn test_exhaustion() {
        let mut table = OpenFileTable::new(1);
        assert!(table.open(DescriptorId::new(1)).is_some());
        assert_eq!(table.open(DescriptorId::new(2)), None);
    }

    #[test]
    fn test_close_unknown_handle() {
        let mut table = OpenFileTable::new(2);
        assert_eq!(table.close(Fd::new(1)), None);
        assert_eq!(table.close(Fd::new(99)), None);
        assert_eq!(table.get(Fd::new(99)), None);
    }

    #[test]
    fn test_release_descriptor_closes_all_handles() {
        let mut table = OpenFileTable::new(4);
        let a = DescriptorId::new(1);
        let b = DescriptorId::new(2);
        table.open(a);
        table.open(b);
        table.open(a);

        assert_eq!(table.release_descriptor(a), vec![Fd::new(0), Fd::new(2)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![(Fd::new(1), b)]);
    }
}
