use indexmap::IndexMap;
use interest_common::EntityId;

/// Liveness marker of one snapshot entry during a write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liveness {
    /// Sent (or carried forward) in the latest pass.
    Created,
    /// Still visible this round; survives the removal pass.
    Confirmed,
}

/// What was last communicated to one owner.
///
/// The protocol diffs the next query result against this set, then swaps in a
/// freshly built snapshot; an installed snapshot is never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerSnapshot {
    entries: IndexMap<EntityId, Liveness>,
}

impl OwnerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn liveness(&self, id: EntityId) -> Option<Liveness> {
        self.entries.get(&id).copied()
    }

    pub fn insert(&mut self, id: EntityId, liveness: Liveness) {
        self.entries.insert(id, liveness);
    }

    /// Mark an existing entry as confirmed. Returns whether it existed.
    pub fn confirm(&mut self, id: EntityId) -> bool {
        match self.entries.get_mut(&id) {
            Some(liveness) => {
                *liveness = Liveness::Confirmed;
                true
            }
            None => false,
        }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, Liveness)> + '_ {
        self.entries.iter().map(|(id, liveness)| (*id, *liveness))
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_only_touches_existing_entries() {
        let mut snapshot = OwnerSnapshot::new();
        snapshot.insert(EntityId(1), Liveness::Created);

        assert!(snapshot.confirm(EntityId(1)));
        assert!(!snapshot.confirm(EntityId(2)));
        assert_eq!(snapshot.liveness(EntityId(1)), Some(Liveness::Confirmed));
        assert_eq!(snapshot.liveness(EntityId(2)), None);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut snapshot = OwnerSnapshot::new();
        for id in [5, 3, 9] {
            snapshot.insert(EntityId(id), Liveness::Created);
        }
        let ids: Vec<u64> = snapshot.ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }
}
