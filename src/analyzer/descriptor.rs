/// A record stored in a [`DescriptorTable`], keyed by its host-assigned type.
pub trait Descriptor: Default {
    /// Host-assigned numeric type; zero marks an unset slot.
    fn type_id(&self) -> u32;

    fn name(&self) -> &str;
}

/// Descriptors indexed directly by their numeric analyzer type.
///
/// The host hands out type ids in its own numbering, so the table grows on
/// demand and keeps default (unset) slots for ids that belong to analyzers
/// we don't own.
#[derive(Debug, Clone)]
pub struct DescriptorTable<D> {
    slots: Vec<D>,
}

impl<D: Descriptor> DescriptorTable<D> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Stores `descriptor` at its type id, growing the table if needed.
    pub fn insert(&mut self, descriptor: D) {
        let index = descriptor.type_id() as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, D::default);
        }
        self.slots[index] = descriptor;
    }

    /// Returns the descriptor for `type_id` if the slot exists and is set.
    pub fn get(&self, type_id: u32) -> Option<&D> {
        self.slots
            .get(type_id as usize)
            .filter(|d| d.type_id() != 0)
    }

    /// Number of slots, set or not.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.slots.iter().filter(|d| d.type_id() != 0)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut D> {
        self.slots.iter_mut().filter(|d| d.type_id() != 0)
    }
}

impl<D: Descriptor> Default for DescriptorTable<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Entry {
        type_id: u32,
        name: String,
    }

    impl Descriptor for Entry {
        fn type_id(&self) -> u32 {
            self.type_id
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn entry(type_id: u32, name: &str) -> Entry {
        Entry { type_id, name: name.to_string() }
    }

    #[test]
    fn test_growth_preserves_existing_slots() {
        let mut table = DescriptorTable::new();
        table.insert(entry(2, "A"));
        table.insert(entry(5, "B"));

        assert_eq!(table.capacity(), 6);
        assert_eq!(table.get(2).map(|e| e.name()), Some("A"));
        assert_eq!(table.get(5).map(|e| e.name()), Some("B"));
        assert!(table.get(3).is_none());
        assert!(table.get(0).is_none());
    }

    #[test]
    fn test_lower_id_does_not_shrink() {
        let mut table = DescriptorTable::new();
        table.insert(entry(7, "HIGH"));
        table.insert(entry(1, "LOW"));

        assert_eq!(table.capacity(), 8);
        assert_eq!(table.iter().count(), 2);
        assert_eq!(table.get(7).map(|e| e.name()), Some("HIGH"));
    }

    #[test]
    fn test_out_of_range_lookup() {
        let mut table = DescriptorTable::new();
        assert!(table.is_empty());
        table.insert(entry(1, "A"));
        assert!(table.get(1000).is_none());
        assert!(!table.is_empty());
    }
}
