use crate::entities::creature::EntityId;
use crate::world::grid::{CellCoord, CellKey};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Unchanged,
    Placed,
    Moved { from: CellKey },
}

impl Placement {
    pub fn changed(self) -> bool {
        !matches!(self, Placement::Unchanged)
    }
}

/// Which entities occupy which cell, and the reverse lookup.
///
/// An id lives in at most one bucket. Buckets are dropped as soon as they
/// empty out, so `bucket_count` tracks occupied cells only.
#[derive(Debug, Default)]
pub struct CellIndex {
    buckets: HashMap<CellKey, Vec<EntityId>>,
    entity_cell: HashMap<EntityId, CellKey>,
}

impl CellIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_of(&self, id: EntityId) -> Option<CellKey> {
        self.entity_cell.get(&id).copied()
    }

    pub fn bucket(&self, key: CellKey) -> &[EntityId] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn place(&mut self, id: EntityId, key: CellKey) -> Placement {
        let previous = self.entity_cell.get(&id).copied();
        if previous == Some(key) {
            return Placement::Unchanged;
        }
        if let Some(old) = previous {
            self.remove_from_bucket(id, old);
        }
        self.buckets.entry(key).or_default().push(id);
        self.entity_cell.insert(id, key);
        match previous {
            Some(from) => Placement::Moved { from },
            None => Placement::Placed,
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<CellKey> {
        let key = self.entity_cell.remove(&id)?;
        self.remove_from_bucket(id, key);
        Some(key)
    }

    fn remove_from_bucket(&mut self, id: EntityId, key: CellKey) {
        if let Some(ids) = self.buckets.get_mut(&key) {
            if let Some(index) = ids.iter().position(|entry| *entry == id) {
                ids.swap_remove(index);
            }
            if ids.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    /// Every placed entity in the 27 cells around `center`.
    pub fn occupants_near(&self, center: CellCoord) -> impl Iterator<Item = EntityId> + '_ {
        center
            .neighborhood()
            .flat_map(move |cell| self.bucket(cell.key()).iter().copied())
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, CellKey)> + '_ {
        self.entity_cell.iter().map(|(id, key)| (*id, *key))
    }

    /// Checks that every recorded cell matches exactly one bucket membership.
    pub fn is_consistent(&self) -> bool {
        let memberships: usize = self.buckets.values().map(Vec::len).sum();
        if memberships != self.entity_cell.len() {
            return false;
        }
        if self.buckets.values().any(Vec::is_empty) {
            return false;
        }
        self.entity_cell.iter().all(|(id, key)| {
            self.buckets
                .get(key)
                .map_or(false, |ids| ids.iter().filter(|entry| *entry == id).count() == 1)
        })
    }
}
