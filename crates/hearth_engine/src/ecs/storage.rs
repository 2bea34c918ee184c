//! Sparse-set component storage
//!
//! Components of one type live densely packed in a `Vec`; a hash index maps
//! entities to their slot. Removal swaps the last element into the hole, so
//! iteration order is insertion order until the first removal.

use super::Entity;
use std::collections::HashMap;

/// Dense storage for all components of type `T`
#[derive(Debug)]
pub struct ComponentStorage<T> {
    dense: Vec<(Entity, T)>,
    indices: HashMap<Entity, usize>,
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentStorage<T> {
    /// Create an empty storage
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            indices: HashMap::new(),
        }
    }

    /// Insert or replace the component for `entity`, returning the old value
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        if let Some(&index) = self.indices.get(&entity) {
            return Some(std::mem::replace(&mut self.dense[index].1, value));
        }
        self.indices.insert(entity, self.dense.len());
        self.dense.push((entity, value));
        None
    }

    /// Remove the component for `entity`
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let index = self.indices.remove(&entity)?;
        let (_, value) = self.dense.swap_remove(index);
        if let Some((moved, _)) = self.dense.get(index) {
            self.indices.insert(*moved, index);
        }
        Some(value)
    }

    /// Get the component for `entity`
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.indices.get(&entity).map(|&index| &self.dense[index].1)
    }

    /// Get the component for `entity` mutably
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        match self.indices.get(&entity) {
            Some(&index) => Some(&mut self.dense[index].1),
            None => None,
        }
    }

    /// Whether `entity` has this component
    pub fn contains(&self, entity: Entity) -> bool {
        self.indices.contains_key(&entity)
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Iterate over `(entity, component)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.dense.iter().map(|(entity, value)| (*entity, value))
    }

    /// Iterate mutably over `(entity, component)` pairs
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.dense.iter_mut().map(|(entity, value)| (*entity, value))
    }

    /// Snapshot of every entity owning this component
    pub fn entities(&self) -> Vec<Entity> {
        self.dense.iter().map(|(entity, _)| *entity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_existing() {
        let mut storage = ComponentStorage::new();
        let entity = Entity::from_raw(1);

        assert_eq!(storage.insert(entity, 10), None);
        assert_eq!(storage.insert(entity, 20), Some(10));
        assert_eq!(storage.get(entity), Some(&20));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut storage = ComponentStorage::new();
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let c = Entity::from_raw(3);
        storage.insert(a, 'a');
        storage.insert(b, 'b');
        storage.insert(c, 'c');

        assert_eq!(storage.remove(a), Some('a'));

        assert_eq!(storage.get(c), Some(&'c'));
        assert_eq!(storage.get(b), Some(&'b'));
        assert!(!storage.contains(a));
        assert_eq!(storage.remove(a), None);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_iter_mut_updates_values() {
        let mut storage = ComponentStorage::new();
        storage.insert(Entity::from_raw(1), 1);
        storage.insert(Entity::from_raw(2), 2);

        for (_, value) in storage.iter_mut() {
            *value *= 10;
        }

        let total: i32 = storage.iter().map(|(_, v)| *v).sum();
        assert_eq!(total, 30);
    }
}
