use crate::core::Entity;
use im::Vector;

/// What an `upsert` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertEffect {
    Inserted,
    Replaced,
    /// The stored value was already identical.
    Unchanged,
}

impl UpsertEffect {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// In-memory, id-keyed collection of one entity kind.
///
/// Records are kept in insertion order; replacing a record keeps its
/// position. There is at most one record per id at any time and no operation
/// can fail: removing an unknown id is a no-op.
#[derive(Debug, Clone)]
pub struct EntityStore<E: Entity> {
    entries: Vector<E>,
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        Self {
            entries: Vector::new(),
        }
    }

    pub fn from_entities(entities: impl IntoIterator<Item = E>) -> Self {
        let mut store = Self::new();
        store.replace_all(entities);
        store
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    /// Inserts `entity`, or replaces the record with the same id in place.
    pub fn upsert(&mut self, entity: E) -> UpsertEffect {
        match self.position(entity.id()) {
            Some(index) => {
                if self.entries[index] == entity {
                    return UpsertEffect::Unchanged;
                }
                self.entries.set(index, entity);
                UpsertEffect::Replaced
            }
            None => {
                self.entries.push_back(entity);
                UpsertEffect::Inserted
            }
        }
    }

    /// Inserts `entity` only when its id is not present yet.
    pub fn insert_if_absent(&mut self, entity: E) -> bool {
        if self.contains(entity.id()) {
            return false;
        }
        self.entries.push_back(entity);
        true
    }

    /// Removes the record with `id`, returning its former position and value.
    pub fn remove(&mut self, id: &str) -> Option<(usize, E)> {
        let index = self.position(id)?;
        Some((index, self.entries.remove(index)))
    }

    /// Puts a previously removed record back at (or near) its old position.
    ///
    /// If the id reappeared in the meantime this behaves like `upsert`.
    pub fn restore_at(&mut self, position: usize, entity: E) -> UpsertEffect {
        if self.contains(entity.id()) {
            return self.upsert(entity);
        }
        let index = position.min(self.entries.len());
        self.entries.insert(index, entity);
        UpsertEffect::Inserted
    }

    /// Overwrites the whole collection (full reload).
    ///
    /// When `entities` repeats an id, the later record wins.
    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = E>) {
        self.entries = Vector::new();
        for entity in entities {
            self.upsert(entity);
        }
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.id().to_string()).collect()
    }

    /// Read-only view for rendering. Cheap: the snapshot shares structure
    /// with the store and is unaffected by later writes.
    pub fn snapshot(&self) -> StoreSnapshot<E> {
        StoreSnapshot {
            entries: self.entries.clone(),
        }
    }
}

/// Immutable, ordered view of an `EntityStore` at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot<E: Entity> {
    entries: Vector<E>,
}

impl<E: Entity> StoreSnapshot<E> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> im::vector::Iter<'_, E> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.id().to_string()).collect()
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.entries.iter().cloned().collect()
    }
}

impl<'a, E: Entity> IntoIterator for &'a StoreSnapshot<E> {
    type Item = &'a E;
    type IntoIter = im::vector::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
